//! JSON encoding of a [`WindowState`], shared by the cache and window files.

use crate::core::window::WindowState;
use crate::error::CodecError;

/// Extension used for finished window files.
pub const FILE_EXTENSION: &str = "json";

/// Encode a window as compact JSON.
pub fn encode(state: &WindowState) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(state).map_err(CodecError::Encode)
}

/// Decode a window, rejecting anything that is not a consistent window.
pub fn decode(bytes: &[u8]) -> Result<WindowState, CodecError> {
    let state: WindowState = serde_json::from_slice(bytes).map_err(CodecError::Malformed)?;

    let sum = state.frequency_sum().unwrap_or(u64::MAX);
    if sum != state.total() {
        return Err(CodecError::Inconsistent {
            total: state.total(),
            sum,
        });
    }

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_empty_open_window_round_trips() {
        let state = WindowState::new();
        let decoded = decode(&encode(&state).unwrap()).unwrap();
        assert_eq!(decoded, state);
        assert!(decoded.is_open());
        assert!(decoded.frequencies().is_empty());
    }

    #[test]
    fn test_finalized_window_round_trips() {
        let mut state = WindowState::starting_at(Utc.timestamp_opt(1000, 250).unwrap());
        state.record("a");
        state.record("b");
        state.record("a");
        let finalized = state.finalize(Utc.timestamp_opt(2000, 0).unwrap());

        let decoded = decode(&encode(finalized.state()).unwrap()).unwrap();
        assert_eq!(&decoded, finalized.state());
        assert_eq!(decoded.end_time(), Some(finalized.end_time()));
    }

    #[test]
    fn test_unset_end_is_null() {
        let bytes = encode(&WindowState::new()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(value["end_ts"].is_null());
        assert_eq!(value["total"], 0);
        assert!(value["frequencies"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode(b""), Err(CodecError::Malformed(_))));
        assert!(matches!(decode(b"not json"), Err(CodecError::Malformed(_))));
        assert!(matches!(decode(b"[]"), Err(CodecError::Malformed(_))));
        assert!(matches!(
            decode(br#"{"total": 1, "frequencies": {"a": 1}}"#),
            Err(CodecError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_rejects_inconsistent_total() {
        let json = br#"{"start_ts": "2024-05-01T10:00:00Z", "end_ts": null, "total": 5, "frequencies": {"a": 2}}"#;
        assert!(matches!(
            decode(json),
            Err(CodecError::Inconsistent { total: 5, sum: 2 })
        ));
    }
}

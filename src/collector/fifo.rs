//! Named pipe binding for the event channel.
//!
//! The pipe is created if missing, given the configured mode and group, and
//! opened for reading. An extra write-only handle is held open for the
//! lifetime of the reader so the read side never sees end-of-file when a
//! producer disconnects.

use crate::collector::source::TokenSource;
use crate::error::FatalError;
use crate::persistence::Ownership;
use nix::fcntl::OFlag;
use nix::libc::mode_t;
use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::os::unix::fs::{FileTypeExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

/// An opened named pipe together with its keep-alive writer.
#[derive(Debug)]
pub struct FifoChannel {
    path: PathBuf,
    reader: File,
    aux_writer: File,
}

impl FifoChannel {
    /// Create (if needed) and open the named pipe at `path`.
    pub fn bind(path: impl Into<PathBuf>, ownership: &Ownership) -> Result<Self, FatalError> {
        let path = path.into();

        ensure_fifo(&path, ownership.mode())?;
        ownership.apply(&path)?;

        // A blocking read-only open waits for a writer, and a write-only
        // open fails without a reader. Open a non-blocking reader first so
        // the writer can attach, then reopen the reader in blocking mode.
        let probe = OpenOptions::new()
            .read(true)
            .custom_flags(OFlag::O_NONBLOCK.bits())
            .open(&path)
            .map_err(|e| bind_error(&path, e.to_string()))?;

        let aux_writer = OpenOptions::new()
            .write(true)
            .open(&path)
            .map_err(|source| FatalError::AuxiliaryWriter {
                path: path.clone(),
                source,
            })?;

        let reader = File::open(&path).map_err(|e| bind_error(&path, e.to_string()))?;
        drop(probe);

        tracing::info!(path = %path.display(), "Bound to event channel");

        Ok(Self {
            path,
            reader,
            aux_writer,
        })
    }

    /// Path of the named pipe.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Start reading tokens. The auxiliary writer lives as long as the
    /// reader thread.
    pub fn into_source(self, capacity: usize) -> TokenSource {
        TokenSource::spawn_holding(self.reader, self.aux_writer, capacity)
    }
}

fn ensure_fifo(path: &Path, mode: u32) -> Result<(), FatalError> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_fifo() => Ok(()),
        Ok(_) => Err(bind_error(
            path,
            "file already exists at fifo path and is not a fifo".to_string(),
        )),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            mkfifo(path, Mode::from_bits_truncate(mode as mode_t))
                .map_err(|errno| bind_error(path, format!("failed to create fifo: {errno}")))?;
            tracing::debug!(path = %path.display(), mode = %format_args!("{mode:o}"), "Created fifo");
            Ok(())
        }
        Err(e) => Err(bind_error(path, e.to_string())),
    }
}

fn bind_error(path: &Path, reason: String) -> FatalError {
    FatalError::ChannelBind {
        path: path.to_path_buf(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_bind_creates_fifo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.sock");

        let channel = FifoChannel::bind(&path, &Ownership::new(0o620)).unwrap();
        assert_eq!(channel.path(), path.as_path());
        assert!(fs::symlink_metadata(&path).unwrap().file_type().is_fifo());
    }

    #[test]
    fn test_bind_rejects_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.sock");
        fs::write(&path, b"").unwrap();

        let err = FifoChannel::bind(&path, &Ownership::new(0o620)).unwrap_err();
        assert!(matches!(err, FatalError::ChannelBind { .. }));
    }

    #[test]
    fn test_writer_disconnect_does_not_end_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.sock");

        let source = FifoChannel::bind(&path, &Ownership::new(0o620))
            .unwrap()
            .into_source(16);

        {
            let mut writer = OpenOptions::new().write(true).open(&path).unwrap();
            writer.write_all(b"KeyA\nKeyB\n").unwrap();
        }
        {
            let mut writer = OpenOptions::new().write(true).open(&path).unwrap();
            writer.write_all(b"KeyC\n").unwrap();
        }

        let receiver = source.receiver();
        let timeout = Duration::from_secs(5);
        assert_eq!(receiver.recv_timeout(timeout).unwrap(), "KeyA");
        assert_eq!(receiver.recv_timeout(timeout).unwrap(), "KeyB");
        assert_eq!(receiver.recv_timeout(timeout).unwrap(), "KeyC");

        // Both producers are gone, yet the channel stays open.
        assert!(matches!(
            receiver.recv_timeout(Duration::from_millis(100)),
            Err(crossbeam_channel::RecvTimeoutError::Timeout)
        ));
    }
}

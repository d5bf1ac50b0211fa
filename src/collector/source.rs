//! Line reader that feeds tokens into a bounded hand-off queue.

use crossbeam_channel::{bounded, Receiver, Sender};
use std::io::{BufRead, BufReader, Read};
use std::thread::{self, JoinHandle};

/// One input event, e.g. the name of a pressed key.
pub type Token = String;

/// Longest accepted line, terminator excluded. A longer line ends the stream.
pub const MAX_TOKEN_LEN: usize = 64 * 1024;

/// Producer side of the ingestion pipeline.
///
/// A background thread reads one token per line and pushes it into the
/// queue in arrival order. The sequence ends when the stream ends, a read
/// fails, a line exceeds [`MAX_TOKEN_LEN`], or the receiver is dropped.
pub struct TokenSource {
    receiver: Receiver<Token>,
    thread_handle: Option<JoinHandle<()>>,
}

impl TokenSource {
    /// Start reading `reader` on a background thread.
    pub fn spawn<R>(reader: R, capacity: usize) -> Self
    where
        R: Read + Send + 'static,
    {
        Self::spawn_holding(reader, (), capacity)
    }

    /// Like [`TokenSource::spawn`], but keeps `guard` alive for as long as
    /// the reader thread runs.
    pub fn spawn_holding<R, G>(reader: R, guard: G, capacity: usize) -> Self
    where
        R: Read + Send + 'static,
        G: Send + 'static,
    {
        let (sender, receiver) = bounded(capacity);

        let handle = thread::spawn(move || {
            let _guard = guard;
            read_tokens(BufReader::new(reader), sender);
        });

        Self {
            receiver,
            thread_handle: Some(handle),
        }
    }

    /// Get the receiver for tokens.
    pub fn receiver(&self) -> &Receiver<Token> {
        &self.receiver
    }

    /// Detach the reader thread and hand out the receiver.
    pub fn into_receiver(mut self) -> Receiver<Token> {
        self.thread_handle.take();
        self.receiver
    }

    /// Wait for the reader thread to finish.
    pub fn join(mut self) {
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

fn read_tokens<R: BufRead>(mut reader: R, sender: Sender<Token>) {
    let mut line = Vec::new();

    loop {
        line.clear();
        // One byte past the limit is enough to tell an overlong line apart.
        let limit = (MAX_TOKEN_LEN + 1) as u64;
        match reader.by_ref().take(limit).read_until(b'\n', &mut line) {
            Ok(0) => {
                tracing::warn!("Event stream reached end of input");
                return;
            }
            Ok(_) if line.len() > MAX_TOKEN_LEN && !line.ends_with(b"\n") => {
                tracing::error!(
                    max = MAX_TOKEN_LEN,
                    "Event stream line too long; stopping reader"
                );
                return;
            }
            Ok(_) => {
                if sender.send(decode_line(&line)).is_err() {
                    tracing::debug!("Token receiver dropped; stopping reader");
                    return;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read from event stream");
                return;
            }
        }
    }
}

/// Strip the line terminator (`\n` or `\r\n`) and decode leniently.
fn decode_line(line: &[u8]) -> Token {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}

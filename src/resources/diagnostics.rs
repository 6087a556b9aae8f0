//! # Bounded capture of a child's diagnostic output.
//!
//! Relay and decoder processes report everything useful on stderr. [`DiagnosticsBuffer`]
//! keeps the most recent lines so a failed start or a reaped crash can show why it died,
//! without letting a chatty process grow memory without bound.

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::{Mutex, watch};

/// A pipe that keeps failing this many times in a row is given up on.
const MAX_CONSECUTIVE_READ_ERRORS: u32 = 16;

/// Ring buffer of the last `max_lines` lines written by a child process.
pub struct DiagnosticsBuffer {
    lines: Mutex<VecDeque<String>>,
    max_lines: usize,
    max_chars: usize,
    drained_tx: watch::Sender<bool>,
}

impl DiagnosticsBuffer {
    /// Creates a buffer that keeps `max_lines` lines and renders at most `max_chars`.
    pub fn new(max_lines: usize, max_chars: usize) -> Self {
        let (drained_tx, _) = watch::channel(false);
        Self {
            lines: Mutex::new(VecDeque::new()),
            max_lines: max_lines.max(1),
            max_chars: max_chars.max(1),
            drained_tx,
        }
    }

    /// Appends one line, evicting the oldest when full.
    pub async fn push_line(&self, line: String) {
        let mut lines = self.lines.lock().await;
        lines.push_back(line);
        while lines.len() > self.max_lines {
            lines.pop_front();
        }
    }

    /// Reads `reader` line by line into the buffer until EOF, then marks it drained.
    ///
    /// Bytes that are not UTF-8 are replaced, never treated as the end of input: the pipe
    /// must stay open for as long as the child writes to it, or the child dies of SIGPIPE.
    pub async fn drain_from<R>(&self, reader: R)
    where
        R: AsyncRead + Unpin,
    {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::with_capacity(256);
        let mut errors = 0u32;
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    errors = 0;
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end();
                    if !line.trim().is_empty() {
                        self.push_line(line.to_string()).await;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    errors += 1;
                    tracing::debug!(error = %e, errors, "stderr read failed");
                    if errors >= MAX_CONSECUTIVE_READ_ERRORS {
                        break;
                    }
                }
            }
        }
        self.drained_tx.send_replace(true);
    }

    /// Waits up to `limit` for the writer side to reach EOF.
    ///
    /// A process that just exited may still have output in the pipe; giving the reader a
    /// moment makes the rendered tail include the actual failure line.
    pub async fn wait_drained(&self, limit: Duration) {
        let mut rx = self.drained_tx.subscribe();
        let _ = tokio::time::timeout(limit, rx.wait_for(|drained| *drained)).await;
    }

    /// Renders the retained lines, keeping the last `max_chars` characters.
    pub async fn render(&self) -> String {
        let joined = {
            let lines = self.lines.lock().await;
            lines.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
        };
        tail_chars(&joined, self.max_chars).to_string()
    }
}

/// Returns the suffix of `text` holding at most `max` characters.
fn tail_chars(text: &str, max: usize) -> &str {
    let count = text.chars().count();
    if count <= max {
        return text;
    }
    let skip = count - max;
    match text.char_indices().nth(skip) {
        Some((idx, _)) => &text[idx..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn keeps_only_the_latest_lines() {
        let buf = DiagnosticsBuffer::new(2, 1024);
        for line in ["one", "two", "three"] {
            buf.push_line(line.to_string()).await;
        }
        assert_eq!(buf.render().await, "two\nthree");
    }

    #[tokio::test]
    async fn render_keeps_the_tail_of_long_output() {
        let buf = DiagnosticsBuffer::new(8, 10);
        buf.push_line("rtsp://cam: Connection refused".to_string())
            .await;
        assert_eq!(buf.render().await, "on refused");
    }

    #[tokio::test]
    async fn drain_skips_blank_lines_and_marks_eof() {
        let buf = DiagnosticsBuffer::new(8, 1024);
        let input: &[u8] = b"first\n\n  \nInput/output error\n";
        buf.drain_from(input).await;
        buf.wait_drained(Duration::from_millis(1)).await;
        assert_eq!(buf.render().await, "first\nInput/output error");
    }

    #[tokio::test]
    async fn drain_replaces_invalid_utf8_and_keeps_reading() {
        let buf = DiagnosticsBuffer::new(8, 1024);
        let input: &[u8] = b"bad \xff byte\r\nstill running\n";
        buf.drain_from(input).await;
        assert_eq!(buf.render().await, "bad \u{FFFD} byte\nstill running");
    }

    #[test]
    fn tail_respects_char_boundaries() {
        assert_eq!(tail_chars("cámara", 5), "ámara");
        assert_eq!(tail_chars("abc", 10), "abc");
    }
}

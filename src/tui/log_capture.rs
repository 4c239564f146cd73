//! Log capture for TUI mode
//!
//! While the TUI owns the terminal, tracing output cannot go to stdout
//! without tearing the alternate screen. This ring buffer implements
//! `MakeWriter` so the fmt layer writes here instead; the log overlay
//! drains it for display.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::MakeWriter;

/// A thread-safe ring buffer of log lines.
///
/// Clone shares the underlying buffer; `MakeWriter` needs that to hand
/// out writers per event.
#[derive(Clone)]
pub struct LogBuffer {
    inner: Arc<Mutex<VecDeque<String>>>,
    cap: usize,
}

impl LogBuffer {
    /// Create a buffer that keeps at most `cap` undrained lines.
    pub fn new(cap: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(cap))),
            cap,
        }
    }

    /// Push one line, dropping the oldest when full. Recovers a poisoned
    /// mutex; logging must not cascade another thread's panic.
    pub fn push(&self, line: String) {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if guard.len() >= self.cap {
            guard.pop_front();
        }
        guard.push_back(line);
    }

    /// Take all accumulated lines, oldest first.
    pub fn drain(&self) -> Vec<String> {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard.drain(..).collect()
    }
}

/// Writer that splits incoming bytes into lines for a [`LogBuffer`].
pub struct LineWriter {
    buffer: LogBuffer,
    pending: Vec<u8>,
}

impl LineWriter {
    fn new(buffer: LogBuffer) -> Self {
        Self {
            buffer,
            pending: Vec::new(),
        }
    }

    fn push_complete_lines(&mut self) {
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..line.len() - 1]).into_owned();
            self.buffer.push(text);
        }
    }
}

impl Write for LineWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.pending.extend_from_slice(buf);
        self.push_complete_lines();
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if !self.pending.is_empty() {
            let text = String::from_utf8_lossy(&self.pending).into_owned();
            self.buffer.push(text);
            self.pending.clear();
        }
        Ok(())
    }
}

impl Drop for LineWriter {
    fn drop(&mut self) {
        let _ = Write::flush(self);
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LineWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LineWriter::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_push_and_drain_in_order() {
        let buf = LogBuffer::new(16);
        buf.push("first".to_string());
        buf.push("second".to_string());

        assert_eq!(buf.drain(), vec!["first", "second"]);
        assert!(buf.drain().is_empty());
    }

    #[test]
    fn test_oldest_lines_drop_at_capacity() {
        let buf = LogBuffer::new(3);
        for i in 0..5 {
            buf.push(format!("line {}", i));
        }

        assert_eq!(buf.drain(), vec!["line 2", "line 3", "line 4"]);
    }

    #[test]
    fn test_writer_splits_lines() {
        let buf = LogBuffer::new(16);
        let mut writer = LineWriter::new(buf.clone());

        write!(writer, "one\ntwo\npar").unwrap();
        assert_eq!(buf.drain(), vec!["one", "two"]);

        // The partial line lands on drop.
        drop(writer);
        assert_eq!(buf.drain(), vec!["par"]);
    }
}

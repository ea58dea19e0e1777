//! In-memory serial port for tests.
//!
//! Reads hand out queued chunks one at a time and report `TimedOut` when the
//! queue is empty, the way a `serialport` handle does, optionally after
//! blocking for a read timeout. Once closed, an empty queue reads as EOF.
//! Writes are captured, and every completed line can trigger a scripted reply.

use std::collections::{HashMap, VecDeque};
use std::io::{self, ErrorKind, Read, Write};
use std::time::Duration;

#[derive(Default)]
pub struct MockPort {
    incoming: VecDeque<Vec<u8>>,
    outgoing: Vec<u8>,
    replies: HashMap<String, Vec<String>>,
    fail_read: Option<ErrorKind>,
    read_timeout: Duration,
    closed: bool,
}

impl MockPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_chunk(&mut self, bytes: &[u8]) {
        self.incoming.push_back(bytes.to_vec());
    }

    /// Queues `lines` (CRLF-terminated) as one chunk of unsolicited output.
    pub fn push_lines(&mut self, lines: &[&str]) {
        let mut chunk = String::new();
        for line in lines {
            chunk.push_str(line);
            chunk.push_str("\r\n");
        }
        self.push_chunk(chunk.as_bytes());
    }

    /// Queues `lines` every time `command` is written.
    pub fn reply(mut self, command: &str, lines: &[&str]) -> Self {
        self.replies.insert(
            command.to_string(),
            lines.iter().map(|l| l.to_string()).collect(),
        );
        self
    }

    pub fn fail_next_read(&mut self, kind: ErrorKind) {
        self.fail_read = Some(kind);
    }

    pub fn set_read_timeout(&mut self, timeout: Duration) {
        self.read_timeout = timeout;
    }

    /// The far end hangs up: reads past the queued data return `Ok(0)`.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn raw_written(&self) -> &[u8] {
        &self.outgoing
    }

    /// Lines written so far, without terminators.
    pub fn written(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.outgoing)
            .split("\r\n")
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl Read for MockPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(kind) = self.fail_read.take() {
            return Err(io::Error::new(kind, "mock failure"));
        }
        let Some(mut chunk) = self.incoming.pop_front() else {
            if self.closed {
                return Ok(0);
            }
            std::thread::sleep(self.read_timeout);
            return Err(io::Error::new(ErrorKind::TimedOut, "Operation timed out"));
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            self.incoming.push_front(chunk.split_off(n));
        }
        Ok(n)
    }
}

impl Write for MockPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let before = self.outgoing.len();
        self.outgoing.extend_from_slice(buf);
        let text = String::from_utf8_lossy(&self.outgoing[before..]).to_string();
        for command in text.split("\r\n").filter(|l| !l.is_empty()) {
            if let Some(lines) = self.replies.get(command).cloned() {
                let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
                self.push_lines(&refs);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

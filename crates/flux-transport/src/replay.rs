use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::error::Result;
use crate::traits::Connection;

#[derive(Debug)]
enum ReplayEvent {
    Data(Vec<u8>),
    Idle,
    Fail(ErrorKind),
}

/// A scripted connection that plays back captured bytes.
///
/// Used to replay a recorded serial capture through a session and as the
/// connection double in tests. Reads follow the script: data chunks, idle
/// reads (reported as `TimedOut` after waiting out the read timeout, like a
/// quiet serial line), and injected I/O failures. Once the
/// script is exhausted every read returns EOF. Bytes written by the session
/// (acknowledgments) are collected in a shared buffer.
#[derive(Debug)]
pub struct ReplayStream {
    name: String,
    script: VecDeque<ReplayEvent>,
    max_read: usize,
    written: Arc<Mutex<Vec<u8>>>,
    fail_writes: bool,
    stalled_writes: usize,
    read_timeout: Duration,
}

impl ReplayStream {
    /// Create an empty script.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: VecDeque::new(),
            max_read: usize::MAX,
            written: Arc::new(Mutex::new(Vec::new())),
            fail_writes: false,
            stalled_writes: 0,
            read_timeout: Duration::ZERO,
        }
    }

    /// Create a script that yields `bytes` and then EOF.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(name).data(bytes)
    }

    /// Append a chunk of incoming bytes.
    pub fn data(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.script.push_back(ReplayEvent::Data(bytes.into()));
        self
    }

    /// Append `count` reads that time out without data.
    pub fn idle(mut self, count: usize) -> Self {
        for _ in 0..count {
            self.script.push_back(ReplayEvent::Idle);
        }
        self
    }

    /// Append a read that fails with `kind`.
    pub fn fail(mut self, kind: ErrorKind) -> Self {
        self.script.push_back(ReplayEvent::Fail(kind));
        self
    }

    /// Limit how many bytes a single read may return.
    pub fn max_read(mut self, max_read: usize) -> Self {
        self.max_read = max_read.max(1);
        self
    }

    /// Make every write fail with `BrokenPipe`.
    pub fn fail_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Make the next `count` writes time out, like a full transmit buffer.
    pub fn stall_writes(mut self, count: usize) -> Self {
        self.stalled_writes = count;
        self
    }

    /// Shared handle to the bytes written so far.
    pub fn written(&self) -> Arc<Mutex<Vec<u8>>> {
        Arc::clone(&self.written)
    }
}

impl Read for ReplayStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        match self.script.pop_front() {
            None => Ok(0),
            Some(ReplayEvent::Idle) => {
                if !self.read_timeout.is_zero() {
                    thread::sleep(self.read_timeout);
                }
                Err(std::io::Error::from(ErrorKind::TimedOut))
            }
            Some(ReplayEvent::Fail(kind)) => Err(std::io::Error::from(kind)),
            Some(ReplayEvent::Data(mut bytes)) => {
                let n = bytes.len().min(buf.len()).min(self.max_read);
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    let rest = bytes.split_off(n);
                    self.script.push_front(ReplayEvent::Data(rest));
                }
                Ok(n)
            }
        }
    }
}

impl Write for ReplayStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.fail_writes {
            return Err(std::io::Error::from(ErrorKind::BrokenPipe));
        }
        if self.stalled_writes > 0 {
            self.stalled_writes -= 1;
            return Err(std::io::Error::from(ErrorKind::TimedOut));
        }
        let mut written = self
            .written
            .lock()
            .map_err(|_| std::io::Error::other("replay write buffer poisoned"))?;
        written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Connection for ReplayStream {
    fn describe(&self) -> String {
        self.name.clone()
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.read_timeout = timeout;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plays_script_in_order() {
        let mut stream = ReplayStream::new("script")
            .data(b"ab".to_vec())
            .idle(1)
            .fail(ErrorKind::BrokenPipe);
        let mut buf = [0u8; 8];

        assert_eq!(stream.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ab");
        assert_eq!(
            stream.read(&mut buf).unwrap_err().kind(),
            ErrorKind::TimedOut
        );
        assert_eq!(
            stream.read(&mut buf).unwrap_err().kind(),
            ErrorKind::BrokenPipe
        );
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn max_read_splits_chunks() {
        let mut stream = ReplayStream::from_bytes("chunks", b"hello".to_vec()).max_read(2);
        let mut buf = [0u8; 8];
        let mut out = Vec::new();
        loop {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            assert!(n <= 2);
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, b"hello");
    }

    #[test]
    fn writes_are_captured_or_fail() {
        let mut stream = ReplayStream::new("w");
        let written = stream.written();
        stream.write_all(b"ack").unwrap();
        assert_eq!(written.lock().unwrap().as_slice(), b"ack");

        let mut broken = ReplayStream::new("w").fail_writes();
        assert_eq!(
            broken.write(b"x").unwrap_err().kind(),
            ErrorKind::BrokenPipe
        );
    }

    #[test]
    fn stalled_writes_time_out_then_succeed() {
        let mut stream = ReplayStream::new("w").stall_writes(1);
        let written = stream.written();
        assert_eq!(stream.write(b"x").unwrap_err().kind(), ErrorKind::TimedOut);
        assert_eq!(stream.write(b"x").unwrap(), 1);
        assert_eq!(written.lock().unwrap().as_slice(), b"x");
    }

    #[test]
    fn idle_reads_wait_out_the_timeout() {
        let mut stream = ReplayStream::new("quiet").idle(2);
        stream.set_read_timeout(Duration::from_millis(5)).unwrap();
        let mut buf = [0u8; 1];

        let started = std::time::Instant::now();
        for _ in 0..2 {
            assert_eq!(stream.read(&mut buf).unwrap_err().kind(), ErrorKind::TimedOut);
        }
        assert!(started.elapsed() >= Duration::from_millis(10));
    }
}

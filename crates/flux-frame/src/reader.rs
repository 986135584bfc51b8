use std::io::{ErrorKind, Read};

use flux_transport::is_idle_read;

use crate::codec::{Frame, FrameConfig, FrameDecoder};
use crate::error::{FrameError, Result};

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete frames.
pub struct FrameReader<T> {
    inner: T,
    decoder: FrameDecoder,
    chunk: Vec<u8>,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        let chunk = vec![0u8; config.read_chunk_size.max(1)];
        Self {
            inner,
            decoder: FrameDecoder::with_config(config),
            chunk,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached and
    /// `Err(FrameError::Oversized)` once per oversized frame; the reader stays
    /// usable after the latter.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.decoder.decode()? {
                return Ok(frame);
            }

            match self.fill() {
                Ok(()) => {}
                Err(FrameError::Io(err)) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }

    /// Return a buffered frame or perform at most one read.
    ///
    /// `Ok(None)` means no complete frame is available yet: either the read
    /// timed out, it would block, or the bytes read did not finish a frame.
    pub fn poll_frame(&mut self) -> Result<Option<Frame>> {
        if let Some(frame) = self.decoder.decode()? {
            return Ok(Some(frame));
        }

        loop {
            match self.fill() {
                Ok(()) => return self.decoder.decode(),
                Err(FrameError::Io(err)) if err.kind() == ErrorKind::Interrupted => continue,
                Err(FrameError::Io(err)) if is_idle_read(err.kind()) => return Ok(None),
                Err(err) => return Err(err),
            }
        }
    }

    fn fill(&mut self) -> Result<()> {
        let read = self.inner.read(&mut self.chunk)?;
        if read == 0 {
            return Err(FrameError::ConnectionClosed {
                pending: self.decoder.buffered(),
            });
        }
        self.decoder.extend(&self.chunk[..read]);
        Ok(())
    }

    /// Bytes received but not yet returned as a frame.
    pub fn buffered(&self) -> usize {
        self.decoder.buffered()
    }

    /// Drop buffered bytes (used when a session is torn down).
    pub fn clear(&mut self) {
        self.decoder.reset();
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        self.decoder.config()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn read_single_frame() {
        let mut reader = FrameReader::new(Cursor::new(b"OFF\n\n\0".to_vec()));
        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.payload.as_ref(), b"OFF\n\n");
    }

    #[test]
    fn read_multiple_frames() {
        let mut reader = FrameReader::new(Cursor::new(b"one\0two\0three\0".to_vec()));

        assert_eq!(reader.read_frame().unwrap().payload.as_ref(), b"one");
        assert_eq!(reader.read_frame().unwrap().payload.as_ref(), b"two");
        assert_eq!(reader.read_frame().unwrap().payload.as_ref(), b"three");
        assert!(matches!(
            reader.read_frame().unwrap_err(),
            FrameError::ConnectionClosed { pending: 0 }
        ));
    }

    #[test]
    fn partial_read_handling() {
        let byte_reader = ByteByByteReader {
            bytes: b"PULSE\nchannel:front\ncolor:red\n\n\0".to_vec(),
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);

        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.payload.as_ref(), b"PULSE\nchannel:front\ncolor:red\n\n");
    }

    #[test]
    fn connection_closed_mid_frame() {
        let mut reader = FrameReader::new(Cursor::new(b"PULSE\ncol".to_vec()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed { pending: 9 }));
    }

    #[test]
    fn oversized_frame_then_recovery() {
        let mut wire = vec![b'#'; 64];
        wire.extend_from_slice(b"\0OFF\n\n\0");
        let cfg = FrameConfig {
            max_frame_size: 16,
            read_chunk_size: 8,
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(Cursor::new(wire), cfg);

        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::Oversized { max: 16, .. }));
        assert!(err.is_recoverable());

        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.payload.as_ref(), b"OFF\n\n");
    }

    #[test]
    fn poll_returns_none_on_timeout() {
        let reader = ScriptedReader {
            script: vec![
                Step::Data(b"OF".to_vec()),
                Step::Fail(ErrorKind::TimedOut),
                Step::Fail(ErrorKind::WouldBlock),
                Step::Data(b"F\0ON\0".to_vec()),
            ],
        };
        let mut framed = FrameReader::new(reader);

        assert!(framed.poll_frame().unwrap().is_none());
        assert!(framed.poll_frame().unwrap().is_none());
        assert!(framed.poll_frame().unwrap().is_none());
        assert_eq!(framed.buffered(), 2);
        assert_eq!(framed.poll_frame().unwrap().unwrap().payload.as_ref(), b"OFF");
        // Second frame is served from the buffer without another read.
        assert_eq!(framed.poll_frame().unwrap().unwrap().payload.as_ref(), b"ON");
        assert!(matches!(
            framed.poll_frame().unwrap_err(),
            FrameError::ConnectionClosed { .. }
        ));
    }

    #[test]
    fn read_timeout_propagates_from_blocking_read() {
        let reader = ScriptedReader {
            script: vec![Step::Fail(ErrorKind::TimedOut)],
        };
        let mut framed = FrameReader::new(reader);
        let err = framed.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::TimedOut));
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = ScriptedReader {
            script: vec![Step::Fail(ErrorKind::Interrupted), Step::Data(b"ok\0".to_vec())],
        };
        let mut framed = FrameReader::new(reader);
        assert_eq!(framed.read_frame().unwrap().payload.as_ref(), b"ok");

        let reader = ScriptedReader {
            script: vec![Step::Fail(ErrorKind::Interrupted), Step::Data(b"ok\0".to_vec())],
        };
        let mut framed = FrameReader::new(reader);
        assert_eq!(framed.poll_frame().unwrap().unwrap().payload.as_ref(), b"ok");
    }

    #[test]
    fn hard_io_error_is_reported() {
        let reader = ScriptedReader {
            script: vec![Step::Fail(ErrorKind::BrokenPipe)],
        };
        let mut framed = FrameReader::new(reader);
        let err = framed.poll_frame().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    #[test]
    fn clear_drops_pending_bytes() {
        let mut reader = FrameReader::new(Cursor::new(b"PART".to_vec()));
        assert!(reader.poll_frame().unwrap().is_none());
        assert_eq!(reader.buffered(), 4);
        reader.clear();
        assert_eq!(reader.buffered(), 0);
    }

    #[test]
    fn accessors_and_into_inner() {
        let cursor = Cursor::new(Vec::<u8>::new());
        let mut reader = FrameReader::new(cursor);

        let _ = reader.get_ref();
        let _ = reader.get_mut();
        assert_eq!(reader.config().delimiter, 0);
        let _inner = reader.into_inner();
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }

            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    enum Step {
        Data(Vec<u8>),
        Fail(ErrorKind),
    }

    struct ScriptedReader {
        script: Vec<Step>,
    }

    impl Read for ScriptedReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.script.is_empty() {
                return Ok(0);
            }
            match self.script.remove(0) {
                Step::Fail(kind) => Err(std::io::Error::from(kind)),
                Step::Data(bytes) => {
                    let n = bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&bytes[..n]);
                    if n < bytes.len() {
                        self.script.insert(0, Step::Data(bytes[n..].to_vec()));
                    }
                    Ok(n)
                }
            }
        }
    }
}

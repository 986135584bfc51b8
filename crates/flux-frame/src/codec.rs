use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Default frame delimiter (Stomp NUL terminator).
pub const NUL: u8 = 0x00;

/// Default maximum frame size, delimiter excluded: 4 KiB.
///
/// Controller firmware sends short commands; anything larger is line noise.
pub const DEFAULT_MAX_FRAME: usize = 4 * 1024;

/// Default number of bytes requested per read from the connection.
pub const DEFAULT_READ_CHUNK: usize = 256;

const EXCERPT_LEN: usize = 64;

/// One delimiter-bounded chunk of bytes (one undecoded command).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame contents without the delimiter.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame (payload + delimiter).
    pub fn wire_size(&self) -> usize {
        self.payload.len() + 1
    }

    /// Printable prefix of the frame for log fields.
    ///
    /// Non-printable bytes are escaped; at most 64 payload bytes are shown.
    pub fn excerpt(&self) -> String {
        excerpt(self.payload.as_ref())
    }
}

/// Printable, escaped prefix of `bytes` (at most 64 bytes).
pub fn excerpt(bytes: &[u8]) -> String {
    let shown = &bytes[..bytes.len().min(EXCERPT_LEN)];
    let mut out: String = shown
        .iter()
        .flat_map(|b| std::ascii::escape_default(*b))
        .map(char::from)
        .collect();
    if bytes.len() > EXCERPT_LEN {
        out.push_str("...");
    }
    out
}

/// Configuration for framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameConfig {
    /// Maximum frame size in bytes, delimiter excluded. Default: 4 KiB.
    pub max_frame_size: usize,
    /// Byte that terminates every frame. Default: NUL.
    pub delimiter: u8,
    /// Bytes requested per read. Default: 256.
    pub read_chunk_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME,
            delimiter: NUL,
            read_chunk_size: DEFAULT_READ_CHUNK,
        }
    }
}

/// Encode a payload into the wire format: payload bytes then the delimiter.
pub fn encode_frame(payload: &[u8], config: &FrameConfig, dst: &mut BytesMut) -> Result<()> {
    if payload.len() > config.max_frame_size {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: config.max_frame_size,
        });
    }
    if let Some(offset) = payload.iter().position(|b| *b == config.delimiter) {
        return Err(FrameError::DelimiterInPayload {
            delimiter: config.delimiter,
            offset,
        });
    }
    dst.reserve(payload.len() + 1);
    dst.put_slice(payload);
    dst.put_u8(config.delimiter);
    Ok(())
}

/// Incremental frame decoder over an append-only byte buffer.
///
/// Feed bytes with [`extend`](Self::extend) as they arrive and call
/// [`decode`](Self::decode) until it returns `Ok(None)`.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    config: FrameConfig,
    // Prefix of `buf` already known to hold no delimiter.
    scanned: usize,
    // Dropping bytes up to the next delimiter after an oversized frame.
    resyncing: bool,
}

impl FrameDecoder {
    /// Create a decoder with default configuration.
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    /// Create a decoder with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        let capacity = config.max_frame_size.min(DEFAULT_MAX_FRAME) + 1;
        Self {
            buf: BytesMut::with_capacity(capacity),
            config,
            scanned: 0,
            resyncing: false,
        }
    }

    /// Append received bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Decode the next frame.
    ///
    /// - `Ok(Some(frame))`: a delimiter was found; the buffer advanced past it
    ///   and trailing bytes are kept for the next call.
    /// - `Ok(None)`: no complete frame buffered yet.
    /// - `Err(FrameError::Oversized)`: the pending frame exceeded the maximum
    ///   size. Its bytes are dropped up to and including the next delimiter,
    ///   possibly across later calls, and exactly one error is reported.
    pub fn decode(&mut self) -> Result<Option<Frame>> {
        let delimiter = self.config.delimiter;

        if self.resyncing {
            match self.buf.iter().position(|b| *b == delimiter) {
                Some(pos) => {
                    self.buf.advance(pos + 1);
                    self.resyncing = false;
                    self.scanned = 0;
                    tracing::trace!(dropped = pos + 1, "frame stream resynchronized");
                }
                None => {
                    self.buf.clear();
                    return Ok(None);
                }
            }
        }

        let max = self.config.max_frame_size;
        match self.buf[self.scanned..]
            .iter()
            .position(|b| *b == delimiter)
        {
            Some(offset) => {
                let pos = self.scanned + offset;
                self.scanned = 0;
                if pos > max {
                    self.buf.advance(pos + 1);
                    return Err(FrameError::Oversized { size: pos, max });
                }
                let payload = self.buf.split_to(pos).freeze();
                self.buf.advance(1);
                Ok(Some(Frame { payload }))
            }
            None if self.buf.len() > max => {
                let size = self.buf.len();
                self.buf.clear();
                self.scanned = 0;
                self.resyncing = true;
                Err(FrameError::Oversized { size, max })
            }
            None => {
                self.scanned = self.buf.len();
                Ok(None)
            }
        }
    }

    /// Number of bytes buffered and not yet returned as a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// True while bytes are being skipped after an oversized frame.
    pub fn is_resyncing(&self) -> bool {
        self.resyncing
    }

    /// Drop all buffered bytes and leave resynchronization.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.scanned = 0;
        self.resyncing = false;
    }

    /// Current decoder configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

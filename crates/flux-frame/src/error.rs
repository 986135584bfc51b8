/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A pending frame grew past the maximum size without a delimiter.
    ///
    /// The decoder has already discarded the bytes and is resynchronizing.
    #[error("frame too large ({size} bytes without delimiter, max {max})")]
    Oversized { size: usize, max: usize },

    /// An outgoing payload contains the frame delimiter.
    #[error("payload contains the frame delimiter 0x{delimiter:02x} at offset {offset}")]
    DelimiterInPayload { delimiter: u8, offset: usize },

    /// An outgoing payload exceeds the maximum frame size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed (EOF), possibly mid-frame.
    #[error("connection closed ({pending} bytes pending)")]
    ConnectionClosed { pending: usize },
}

impl FrameError {
    /// True for errors after which the stream is still usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FrameError::Oversized { .. })
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;

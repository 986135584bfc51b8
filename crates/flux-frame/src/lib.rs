//! Delimiter framing for Stomp commands on a serial line.
//!
//! Every command travels as a frame terminated by a single delimiter byte
//! (NUL by default). The serial line is unreliable: reads split frames at
//! arbitrary points and noise can produce runs of bytes that never reach a
//! delimiter. This crate hides both:
//!
//! - partial reads are accumulated until a delimiter arrives;
//! - a pending frame that outgrows the configured maximum is reported once
//!   and skipped up to the next delimiter, after which decoding resumes.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{
    encode_frame, Frame, FrameConfig, FrameDecoder, DEFAULT_MAX_FRAME, DEFAULT_READ_CHUNK, NUL,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::{FrameWriter, MAX_STALLED_WRITES};

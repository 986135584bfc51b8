//! Serial byte transport for Flux.
//!
//! This is the lowest layer of the workspace. It opens the serial device the
//! Stomp controller is attached to and exposes it as a [`Connection`]: plain
//! byte-level `Read + Write` plus a read timeout, so the session loop can wake
//! up to tick effects while the line is quiet.
//!
//! Disconnects surface the way they do on any `Read`: `Ok(0)` (EOF) or an
//! I/O error. Timed-out reads are not disconnects.

pub mod error;
pub mod replay;
pub mod serial;
pub mod traits;

pub use error::{Result, TransportError};
pub use replay::ReplayStream;
pub use serial::{available_devices, SerialConfig, SerialStream, DEFAULT_BAUD_RATE, DEFAULT_DEVICE};
pub use traits::{is_idle_read, Connection};

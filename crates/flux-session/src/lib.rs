//! Serial session management.
//!
//! A [`Session`] owns one open connection and runs the cooperative loop:
//! read a frame, parse it, dispatch it to the effect scheduler, tick the
//! scheduler, and write acknowledgments back. The [`Supervisor`] opens
//! connections through a [`Connector`] and, when enabled, rebuilds a fresh
//! session after the line drops.

pub mod ack;
pub mod connector;
pub mod error;
pub mod session;
pub mod supervisor;

pub use ack::{error_frame, receipt_frame, ERROR, RECEIPT};
pub use connector::{Connector, SerialConnector};
pub use error::{Result, SessionError};
pub use session::{ExitReason, Session, SessionConfig, SessionStats, ShutdownSignal};
pub use supervisor::{DriverFactory, ReconnectPolicy, Supervisor};

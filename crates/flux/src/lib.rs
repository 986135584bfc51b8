//! Drive lighting effects from Stomp-style commands sent over a serial line.
//!
//! A controller writes text commands such as `PULSE\nchannel:front\ncolor:red\n\n\0`
//! to the serial port. flux splits the byte stream into frames, parses each
//! frame into a command, and runs the matching effect on its channel until a
//! newer command replaces it.
//!
//! # Crate Structure
//!
//! - [`transport`]: serial devices and scripted test streams
//! - [`frame`]: delimiter-based framing with resynchronisation
//! - [`command`]: Stomp-style command parsing and encoding
//! - [`effect`]: effect catalog, actuators and the per-channel scheduler
//! - [`session`]: the serial session loop and reconnect supervisor

/// Re-export transport types.
pub mod transport {
    pub use flux_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use flux_frame::*;
}

/// Re-export command types.
pub mod command {
    pub use flux_command::*;
}

/// Re-export effect types.
pub mod effect {
    pub use flux_effect::*;
}

/// Re-export session types.
pub mod session {
    pub use flux_session::*;
}

//! Stomp-subset command grammar.
//!
//! A command is a verb line, `key:value` header lines, a blank line and an
//! optional body:
//!
//! ```text
//! PULSE
//! channel:front
//! color:red
//!
//! <body bytes>
//! ```
//!
//! The frame boundary ends the body; there is no `content-length`. Parsing is
//! purely structural: unknown verbs and headers are accepted here and judged
//! by the effect registry.

pub mod command;
pub mod error;
pub mod parser;

pub use command::{headers, Command};
pub use error::{ParseError, Result};
pub use parser::parse;

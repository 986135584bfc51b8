use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use crate::error::Result;

/// A connected byte stream to a Stomp controller.
///
/// The session layer only needs byte-level read/write and a bounded read: a
/// read that returns `TimedOut` or `WouldBlock` means "nothing arrived yet",
/// `Ok(0)` means the peer went away.
pub trait Connection: Read + Write + Send {
    /// Human-readable name of the remote end, used in log fields.
    fn describe(&self) -> String;

    /// Bound how long a single `read` may block.
    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()>;
}

impl<C: Connection + ?Sized> Connection for Box<C> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        (**self).set_read_timeout(timeout)
    }
}

/// Returns true if a read error only means that no bytes were available.
pub fn is_idle_read(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::TimedOut | ErrorKind::WouldBlock)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_are_idle_reads() {
        assert!(is_idle_read(ErrorKind::TimedOut));
        assert!(is_idle_read(ErrorKind::WouldBlock));
        assert!(!is_idle_read(ErrorKind::BrokenPipe));
        assert!(!is_idle_read(ErrorKind::UnexpectedEof));
    }
}

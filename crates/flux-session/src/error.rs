use flux_transport::TransportError;

/// Errors that end a session run.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The first connection could not be opened. Not retried.
    #[error("configuration error: {0}")]
    Configuration(#[source] TransportError),

    /// Reconnect attempts ran out after the line dropped.
    #[error("gave up after {attempts} reconnect attempts: {source}")]
    ReconnectExhausted {
        attempts: u32,
        #[source]
        source: Box<SessionError>,
    },

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] flux_frame::FrameError),
}

pub type Result<T> = std::result::Result<T, SessionError>;

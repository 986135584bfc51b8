/// Errors that can occur in serial transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the serial device.
    #[error("failed to open {device} at {baud_rate} baud: {source}")]
    Open {
        device: String,
        baud_rate: u32,
        source: serialport::Error,
    },

    /// Failed to enumerate serial devices.
    #[error("failed to enumerate serial devices: {0}")]
    Enumerate(serialport::Error),

    /// Failed to change a setting on an open device.
    #[error("failed to configure {device}: {source}")]
    Configure {
        device: String,
        source: serialport::Error,
    },

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;

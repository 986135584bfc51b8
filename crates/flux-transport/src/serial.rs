use std::io::{Read, Write};
use std::time::Duration;

use serialport::SerialPort;
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::Connection;

/// Device path used when none is configured.
pub const DEFAULT_DEVICE: &str = "/dev/tty.usbserial";

/// Baud rate used when none is configured.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Serial device settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// Device path (e.g. `/dev/ttyUSB0`, `COM3`).
    pub device: String,
    /// Line speed in bits per second.
    pub baud_rate: u32,
    /// Initial read timeout. The session narrows this to its tick interval.
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: Duration::from_millis(100),
        }
    }
}

/// An open serial device.
pub struct SerialStream {
    port: Box<dyn SerialPort>,
    device: String,
}

impl SerialStream {
    /// Open the configured serial device.
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let port = serialport::new(config.device.as_str(), config.baud_rate)
            .timeout(config.timeout)
            .open()
            .map_err(|source| TransportError::Open {
                device: config.device.clone(),
                baud_rate: config.baud_rate,
                source,
            })?;

        info!(
            device = %config.device,
            baud_rate = config.baud_rate,
            "serial device opened"
        );

        Ok(Self {
            port,
            device: config.device.clone(),
        })
    }

    /// Device path this stream was opened on.
    pub fn device(&self) -> &str {
        &self.device
    }
}

impl Read for SerialStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.port.flush()
    }
}

impl Connection for SerialStream {
    fn describe(&self) -> String {
        self.device.clone()
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.port
            .set_timeout(timeout)
            .map_err(|source| TransportError::Configure {
                device: self.device.clone(),
                source,
            })
    }
}

impl std::fmt::Debug for SerialStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialStream")
            .field("device", &self.device)
            .finish()
    }
}

/// List serial device paths present on this machine.
pub fn available_devices() -> Result<Vec<String>> {
    let ports = serialport::available_ports().map_err(TransportError::Enumerate)?;
    let mut devices: Vec<String> = ports.into_iter().map(|port| port.port_name).collect();
    devices.sort();
    debug!(count = devices.len(), "enumerated serial devices");
    Ok(devices)
}

use flux_transport::{Connection, SerialConfig, SerialStream};

/// Opens connections for the [`Supervisor`](crate::Supervisor).
pub trait Connector {
    type Connection: Connection;

    /// Open a new connection.
    fn connect(&mut self) -> flux_transport::Result<Self::Connection>;

    /// Name of the endpoint, for log fields.
    fn describe(&self) -> String;
}

/// Opens a serial device.
#[derive(Debug, Clone)]
pub struct SerialConnector {
    config: SerialConfig,
}

impl SerialConnector {
    pub fn new(config: SerialConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SerialConfig {
        &self.config
    }
}

impl Connector for SerialConnector {
    type Connection = SerialStream;

    fn connect(&mut self) -> flux_transport::Result<SerialStream> {
        SerialStream::open(&self.config)
    }

    fn describe(&self) -> String {
        format!("{}@{}", self.config.device, self.config.baud_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_device_fails_to_connect() {
        let mut connector = SerialConnector::new(SerialConfig {
            device: "/dev/flux-test-no-such-device".to_string(),
            ..SerialConfig::default()
        });
        assert_eq!(connector.describe(), "/dev/flux-test-no-such-device@9600");
        assert!(connector.connect().is_err());
    }
}

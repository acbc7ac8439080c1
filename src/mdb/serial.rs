//! # Bus Adapter Serial Communication
//!
//! This module provides the serial-port [`Transport`] for the MDB bus adapter:
//! opening and configuring the port, writing a command line, and reading the
//! response line within a bounded timeout.

use crate::error::TransportError;
use crate::mdb::transport::{classify_response, Transport};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_serial::{SerialPort, SerialPortBuilderExt};

/// Configuration for serial connection.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub baudrate: u32,
    /// Upper bound for one response line. MDB changers can legitimately take
    /// over a second to answer while busy or resetting.
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            baudrate: 115_200,
            timeout: Duration::from_secs(2),
        }
    }
}

/// Line transport to the bus adapter over a serial port (8N1, no flow control).
pub struct SerialTransport {
    port: BufReader<tokio_serial::SerialStream>,
    config: SerialConfig,
    port_name: String,
}

impl SerialTransport {
    /// Opens `port_name` with the default configuration.
    pub async fn connect(port_name: &str) -> Result<SerialTransport, TransportError> {
        Self::connect_with_config(port_name, SerialConfig::default()).await
    }

    /// Opens `port_name` with a custom configuration.
    pub async fn connect_with_config(
        port_name: &str,
        config: SerialConfig,
    ) -> Result<SerialTransport, TransportError> {
        let port = tokio_serial::new(port_name, config.baudrate)
            .data_bits(tokio_serial::DataBits::Eight)
            .stop_bits(tokio_serial::StopBits::One)
            .parity(tokio_serial::Parity::None)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(config.timeout)
            .open_native_async()
            .map_err(|e| TransportError::Unavailable(format!("{port_name}: {e}")))?;

        log::debug!("Serial device port name: '{port_name}'");
        Ok(SerialTransport {
            port: BufReader::new(port),
            config,
            port_name: port_name.to_string(),
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Drop anything left over from an earlier exchange that timed out, so a
    /// late answer is not taken as the response to the next command.
    fn discard_stale_input(&mut self) {
        let buffered = self.port.buffer().len();
        if buffered > 0 {
            log::debug!("Discarding {buffered} stale bytes");
            std::pin::Pin::new(&mut self.port).consume(buffered);
        }
        if let Err(e) = self.port.get_mut().clear(tokio_serial::ClearBuffer::Input) {
            log::debug!("Could not clear serial input buffer: {e}");
        }
    }
}

#[async_trait::async_trait]
impl Transport for SerialTransport {
    async fn send(&mut self, command: &str) -> Result<String, TransportError> {
        use tokio::time::timeout;

        self.discard_stale_input();

        let line = format!("{command}\n");
        let port = self.port.get_mut();
        AsyncWriteExt::write_all(&mut *port, line.as_bytes())
            .await
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;
        AsyncWriteExt::flush(&mut *port)
            .await
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;

        let mut buf = Vec::with_capacity(64);
        let n = timeout(self.config.timeout, self.port.read_until(b'\n', &mut buf))
            .await
            .map_err(|_| TransportError::NoResponse)?
            .map_err(|_| TransportError::NoResponse)?;
        if n == 0 || !buf.is_ascii() {
            return Err(TransportError::NoResponse);
        }

        let text = String::from_utf8(buf).map_err(|_| TransportError::NoResponse)?;
        classify_response(&text)
    }
}

//! # Command/Response Transport
//!
//! The bus adapter speaks a half-duplex, line-oriented protocol: one textual
//! command goes out, one textual response line comes back. [`Transport`] is
//! the seam between the coin changer core and whatever carries those lines
//! (a serial port in production, [`MockTransport`](super::serial_mock::MockTransport)
//! in tests).

use crate::constants::RESP_NACK;
use crate::error::TransportError;

/// Exchanges one command for one response.
///
/// Implementations keep exactly one request outstanding at a time and never
/// retry on their own; retry policy belongs to the caller.
#[async_trait::async_trait]
pub trait Transport: Send {
    /// Send `command` (without line terminator) and return the response line.
    async fn send(&mut self, command: &str) -> Result<String, TransportError>;
}

#[async_trait::async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn send(&mut self, command: &str) -> Result<String, TransportError> {
        (**self).send(command).await
    }
}

#[async_trait::async_trait]
impl<T: Transport + ?Sized> Transport for &mut T {
    async fn send(&mut self, command: &str) -> Result<String, TransportError> {
        (**self).send(command).await
    }
}

/// Map a raw response line onto the transport contract.
///
/// Line terminators are stripped. An empty line is [`TransportError::NoResponse`];
/// a line containing `NACK` anywhere is [`TransportError::Rejected`].
pub fn classify_response(raw: &str) -> Result<String, TransportError> {
    let line = raw.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Err(TransportError::NoResponse);
    }
    if line.contains(RESP_NACK) {
        return Err(TransportError::Rejected(line.to_string()));
    }
    Ok(line.to_string())
}

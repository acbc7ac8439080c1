//! Command construction and response unwrapping for the bus adapter.

use crate::constants::*;
use crate::error::{DecodeError, MdbError};
use crate::mdb::retry::RetryPolicy;
use crate::mdb::transport::Transport;

/// `R,0C,<enable><manual dispense enable>`; bit i of each mask is coin type i.
pub fn coin_type_command(coin_enable: u16, manual_dispense_enable: u16) -> String {
    format!("{CMD_COIN_TYPE_PREFIX},{coin_enable:04X}{manual_dispense_enable:04X}")
}

/// `R,0D,<NT>`: dispense `count` coins (high nibble) of `coin_type` (low nibble).
pub fn dispense_command(count: u8, coin_type: u8) -> String {
    format!(
        "{CMD_DISPENSE_PREFIX},{:X}{:X}",
        count & 0x0F,
        coin_type & EVENT_COIN_TYPE_MASK
    )
}

/// Payload of a bus response: everything after the `r,` tag, trimmed.
pub fn bus_payload(response: &str) -> Result<&str, DecodeError> {
    response
        .strip_prefix(RESP_BUS_TAG)
        .map(str::trim)
        .ok_or_else(|| DecodeError::UnexpectedTag(response.to_string()))
}

/// Send a bus command and return its payload.
pub async fn bus_query<T: Transport + ?Sized>(
    transport: &mut T,
    retry: &RetryPolicy,
    command: &str,
) -> Result<String, MdbError> {
    let response = retry.send(transport, command).await?;
    Ok(bus_payload(&response)?.to_string())
}

/// Send a command whose only requirement is a non-empty, non-NACK answer.
pub async fn expect_any<T: Transport + ?Sized>(
    transport: &mut T,
    retry: &RetryPolicy,
    command: &str,
) -> Result<String, MdbError> {
    Ok(retry.send(transport, command).await?)
}

//! # Hex Payload Utilities
//!
//! The bus adapter returns every coin changer response as an ASCII hex string.
//! These helpers turn fixed-width nibble fields of such a payload into bytes,
//! using the `hex` crate, and report failures as [`DecodeError`] with the
//! nibble offset that failed.
//!
//! ## Usage
//!
//! ```rust
//! use mdb_changer::util::hex::{byte_at, decode_fixed, encode_hex_upper};
//!
//! assert_eq!(byte_at("4105", 2).unwrap(), 0x05);
//! assert_eq!(decode_fixed("0301", 4, "diagnose").unwrap(), vec![0x03, 0x01]);
//! assert_eq!(encode_hex_upper(&[0xAB, 0x01]), "AB01");
//! ```

use crate::error::DecodeError;

/// Encode bytes to uppercase hex string, the form the adapter expects in commands.
pub fn encode_hex_upper(data: &[u8]) -> String {
    hex::encode_upper(data)
}

/// Decode the byte whose two hex digits start at nibble `offset`.
pub fn byte_at(payload: &str, offset: usize) -> Result<u8, DecodeError> {
    let text = payload
        .get(offset..offset + 2)
        .ok_or_else(|| DecodeError::InvalidHex {
            offset,
            text: payload.get(offset..).unwrap_or_default().to_string(),
        })?;

    let mut byte = [0u8; 1];
    hex::decode_to_slice(text, &mut byte).map_err(|_| DecodeError::InvalidHex {
        offset,
        text: text.to_string(),
    })?;
    Ok(byte[0])
}

/// Decode the first `nibbles` hex digits of `payload` into bytes.
///
/// Characters past `nibbles` are ignored; a shorter payload is reported as
/// [`DecodeError::PayloadTooShort`] naming `field`.
pub fn decode_fixed(
    payload: &str,
    nibbles: usize,
    field: &'static str,
) -> Result<Vec<u8>, DecodeError> {
    if payload.len() < nibbles {
        return Err(DecodeError::PayloadTooShort {
            field,
            expected: nibbles,
            actual: payload.len(),
        });
    }

    let text = payload.get(..nibbles).ok_or_else(|| DecodeError::InvalidHex {
        offset: 0,
        text: payload.to_string(),
    })?;

    hex::decode(text).map_err(|e| {
        let offset = match e {
            hex::FromHexError::InvalidHexCharacter { index, .. } => index - index % 2,
            _ => 0,
        };
        DecodeError::InvalidHex {
            offset,
            text: text.get(offset..offset + 2).unwrap_or(text).to_string(),
        }
    })
}

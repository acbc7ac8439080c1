//! # Coin Changer SETUP
//!
//! Parses the SETUP response into the changer's [`DeviceConfig`] and its
//! [`CoinTypeTable`]. The payload is 23 bytes (46 hex digits):
//!
//! | field                 | bytes |
//! |-----------------------|-------|
//! | feature level         | 1     |
//! | currency code         | 2     |
//! | coin scaling factor   | 1     |
//! | decimal places        | 1     |
//! | coin type routing     | 2     |
//! | coin type credit × 16 | 16    |
//!
//! Each coin type's credit value is its raw credit byte multiplied by the
//! scaling factor, in the smallest unit of the changer's currency.

use crate::constants::{COIN_TYPE_COUNT, EVENT_COIN_TYPE_MASK, SETUP_PAYLOAD_NIBBLES};
use crate::error::DecodeError;
use crate::util::hex::{decode_fixed, encode_hex_upper};
use nom::bytes::complete::take;
use nom::number::complete::{be_u16, be_u8};
use nom::sequence::tuple;
use nom::IResult;

/// Changer-wide settings reported by SETUP. Read-only after initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    pub feature_level: u8,
    /// Currency code as reported, e.g. 0x1978 for ISO 4217 978 (EUR)
    pub currency_code: u16,
    pub scaling_factor: u8,
    pub decimal_places: u8,
    /// Bit i set: coin type i can be routed to its tube
    pub coin_routing: u16,
}

impl DeviceConfig {
    /// Currency code as the four hex digits the changer sent.
    pub fn currency_code_hex(&self) -> String {
        format!("{:04X}", self.currency_code)
    }

    /// Whether coins of `coin_type` are stored in a tube (rather than only the cash box).
    pub fn routes_to_tube(&self, coin_type: u8) -> bool {
        let bit = coin_type & EVENT_COIN_TYPE_MASK;
        self.coin_routing & (1 << bit) != 0
    }

    /// Render a credit amount with the changer's decimal places, e.g. 150 -> "1.50".
    pub fn format_credit(&self, amount: i64) -> String {
        let places = u32::from(self.decimal_places);
        if places == 0 {
            return amount.to_string();
        }
        let divisor = 10i64.saturating_pow(places);
        let sign = if amount < 0 { "-" } else { "" };
        let abs = amount.unsigned_abs();
        let divisor = divisor.unsigned_abs();
        format!(
            "{sign}{}.{:0width$}",
            abs / divisor,
            abs % divisor,
            width = places as usize
        )
    }
}

/// Credit value of every coin type. Always holds exactly 16 entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoinTypeTable {
    values: [u32; COIN_TYPE_COUNT],
}

impl CoinTypeTable {
    /// Build the table from raw credit bytes and the scaling factor.
    pub fn from_raw(raw: &[u8; COIN_TYPE_COUNT], scaling_factor: u8) -> Self {
        let mut values = [0u32; COIN_TYPE_COUNT];
        for (value, unit) in values.iter_mut().zip(raw) {
            *value = u32::from(*unit) * u32::from(scaling_factor);
        }
        Self { values }
    }

    /// Build the table from already scaled credit values.
    pub fn from_values(values: [u32; COIN_TYPE_COUNT]) -> Self {
        Self { values }
    }

    /// Credit value of `coin_type` (only the low nibble is significant).
    pub fn credit_value(&self, coin_type: u8) -> u32 {
        self.values[usize::from(coin_type & EVENT_COIN_TYPE_MASK)]
    }

    pub fn values(&self) -> &[u32; COIN_TYPE_COUNT] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Coin types with a non-zero credit value, with their values.
    pub fn accepted(&self) -> impl Iterator<Item = (u8, u32)> + '_ {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| **v > 0)
            .map(|(i, v)| (i as u8, *v))
    }
}

fn setup_fields(input: &[u8]) -> IResult<&[u8], (DeviceConfig, [u8; COIN_TYPE_COUNT])> {
    let (input, (feature_level, currency_code, scaling_factor, decimal_places, coin_routing)) =
        tuple((be_u8, be_u16, be_u8, be_u8, be_u16))(input)?;
    let (input, credits) = take(COIN_TYPE_COUNT)(input)?;

    let mut raw = [0u8; COIN_TYPE_COUNT];
    raw.copy_from_slice(credits);

    Ok((
        input,
        (
            DeviceConfig {
                feature_level,
                currency_code,
                scaling_factor,
                decimal_places,
                coin_routing,
            },
            raw,
        ),
    ))
}

/// Parse a SETUP payload (the hex after the `r,` tag).
pub fn parse_setup(payload: &str) -> Result<(DeviceConfig, CoinTypeTable), DecodeError> {
    let bytes = decode_fixed(payload, SETUP_PAYLOAD_NIBBLES, "setup")?;
    let (_, (config, raw)) = setup_fields(&bytes).map_err(|_| DecodeError::PayloadTooShort {
        field: "setup",
        expected: SETUP_PAYLOAD_NIBBLES,
        actual: payload.len(),
    })?;

    let table = CoinTypeTable::from_raw(&raw, config.scaling_factor);
    Ok((config, table))
}

/// Encode a SETUP payload, the inverse of [`parse_setup`].
pub fn encode_setup(config: &DeviceConfig, raw: &[u8; COIN_TYPE_COUNT]) -> String {
    let mut bytes = Vec::with_capacity(SETUP_PAYLOAD_NIBBLES / 2);
    bytes.push(config.feature_level);
    bytes.extend_from_slice(&config.currency_code.to_be_bytes());
    bytes.push(config.scaling_factor);
    bytes.push(config.decimal_places);
    bytes.extend_from_slice(&config.coin_routing.to_be_bytes());
    bytes.extend_from_slice(raw);
    encode_hex_upper(&bytes)
}

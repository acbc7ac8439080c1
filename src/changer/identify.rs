//! # Expansion IDENTIFICATION and DIAGNOSTIC STATUS
//!
//! IDENTIFICATION answers with 33 bytes:
//! manufacturer code (3 ASCII), serial number (12 ASCII), model/tuning
//! revision (12 ASCII), software version (2 bytes) and the optional feature
//! bitmap (4 bytes). DIAGNOSTIC STATUS answers with a main and a sub code.
//! Both are informational; the controller logs them.

use crate::constants::{DIAGNOSE_PAYLOAD_NIBBLES, IDENTIFY_PAYLOAD_NIBBLES};
use crate::error::DecodeError;
use crate::util::hex::decode_fixed;
use bitflags::bitflags;
use nom::bytes::complete::take;
use nom::number::complete::{be_u16, be_u32};
use nom::sequence::tuple;
use nom::IResult;
use std::fmt;

bitflags! {
    /// Level 3 optional features a changer may advertise.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OptionalFeatures: u32 {
        const ALTERNATIVE_PAYOUT = 1 << 0;
        const EXTENDED_DIAGNOSTIC = 1 << 1;
        const CONTROLLED_MANUAL_FILL_PAYOUT = 1 << 2;
        const FILE_TRANSPORT_LAYER = 1 << 3;
        const _ = !0;
    }
}

/// Identity of the attached changer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identification {
    pub manufacturer: String,
    pub serial_number: String,
    pub model: String,
    /// Software version as the four hex digits reported
    pub software_version: String,
    pub optional_features: OptionalFeatures,
}

fn ascii_field(bytes: &[u8], field: &'static str) -> Result<String, DecodeError> {
    if !bytes.is_ascii() {
        return Err(DecodeError::NonAscii { field });
    }
    let text: String = bytes.iter().map(|b| *b as char).collect();
    Ok(text.trim_end_matches([' ', '\0']).to_string())
}

type RawIdentification<'a> = (&'a [u8], &'a [u8], &'a [u8], u16, u32);

fn identify_fields(input: &[u8]) -> IResult<&[u8], RawIdentification<'_>> {
    tuple((take(3usize), take(12usize), take(12usize), be_u16, be_u32))(input)
}

impl Identification {
    /// Parse an IDENTIFICATION payload (the hex after the `r,` tag).
    pub fn parse(payload: &str) -> Result<Self, DecodeError> {
        let bytes = decode_fixed(payload, IDENTIFY_PAYLOAD_NIBBLES, "identify")?;
        let (_, (manufacturer, serial, model, version, features)) = identify_fields(&bytes)
            .map_err(|_| DecodeError::PayloadTooShort {
                field: "identify",
                expected: IDENTIFY_PAYLOAD_NIBBLES,
                actual: payload.len(),
            })?;

        Ok(Self {
            manufacturer: ascii_field(manufacturer, "manufacturer")?,
            serial_number: ascii_field(serial, "serial number")?,
            model: ascii_field(model, "model")?,
            software_version: format!("{version:04X}"),
            optional_features: OptionalFeatures::from_bits_retain(features),
        })
    }
}

/// Main diagnostic status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticMain {
    PoweringUp,
    PoweringDown,
    Ok,
    KeypadShifted,
    ManualFillPayoutActive,
    NewInventoryInformation,
    InhibitedByVmc,
    GeneralError,
    DiscriminatorModuleError,
    AcceptGateModuleError,
    SeparatorModuleError,
    DispenserModuleError,
    CoinCassetteError,
    Unknown(u8),
}

impl From<u8> for DiagnosticMain {
    fn from(code: u8) -> Self {
        match code {
            0x01 => Self::PoweringUp,
            0x02 => Self::PoweringDown,
            0x03 => Self::Ok,
            0x04 => Self::KeypadShifted,
            0x05 => Self::ManualFillPayoutActive,
            0x06 => Self::NewInventoryInformation,
            0x07 => Self::InhibitedByVmc,
            0x10 => Self::GeneralError,
            0x11 => Self::DiscriminatorModuleError,
            0x12 => Self::AcceptGateModuleError,
            0x13 => Self::SeparatorModuleError,
            0x14 => Self::DispenserModuleError,
            0x15 => Self::CoinCassetteError,
            other => Self::Unknown(other),
        }
    }
}

/// Main and sub code of a DIAGNOSTIC STATUS response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Diagnostics {
    pub main: u8,
    pub sub: u8,
}

impl Diagnostics {
    pub fn parse(payload: &str) -> Result<Self, DecodeError> {
        let bytes = decode_fixed(payload, DIAGNOSE_PAYLOAD_NIBBLES, "diagnose")?;
        Ok(Self {
            main: bytes[0],
            sub: bytes[1],
        })
    }

    pub fn main_status(&self) -> DiagnosticMain {
        DiagnosticMain::from(self.main)
    }

    /// 0x03xx: fully operational and ready to accept coins.
    pub fn is_operational(&self) -> bool {
        self.main_status() == DiagnosticMain::Ok
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} (main=0x{:02X} sub=0x{:02X})",
            self.main_status(),
            self.main,
            self.sub
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mdb::serial_mock::identify_fixture;

    #[test]
    fn test_parse_identification() {
        let id = Identification::parse(&identify_fixture()).unwrap();
        assert_eq!(id.manufacturer, "ABC");
        assert_eq!(id.serial_number, "000000001234");
        assert_eq!(id.model, "CHANGER-1");
        assert_eq!(id.software_version, "0102");
        assert!(id
            .optional_features
            .contains(OptionalFeatures::ALTERNATIVE_PAYOUT | OptionalFeatures::EXTENDED_DIAGNOSTIC));
        assert!(!id
            .optional_features
            .contains(OptionalFeatures::FILE_TRANSPORT_LAYER));
    }

    #[test]
    fn test_unknown_feature_bits_retained() {
        let mut payload = identify_fixture();
        payload.replace_range(58..66, "80000001");
        let id = Identification::parse(&payload).unwrap();
        assert_eq!(id.optional_features.bits(), 0x8000_0001);
    }

    #[test]
    fn test_identification_rejects_non_ascii() {
        let mut payload = identify_fixture();
        payload.replace_range(0..2, "C3");
        assert_eq!(
            Identification::parse(&payload).unwrap_err(),
            DecodeError::NonAscii {
                field: "manufacturer"
            }
        );
    }

    #[test]
    fn test_identification_too_short() {
        let payload = identify_fixture();
        assert!(matches!(
            Identification::parse(&payload[..58]),
            Err(DecodeError::PayloadTooShort { expected: 66, .. })
        ));
    }

    #[test]
    fn test_parse_diagnostics() {
        let ok = Diagnostics::parse("0300").unwrap();
        assert!(ok.is_operational());
        assert_eq!(ok.to_string(), "Ok (main=0x03 sub=0x00)");

        let jammed = Diagnostics::parse("1402").unwrap();
        assert_eq!(jammed.main_status(), DiagnosticMain::DispenserModuleError);
        assert!(!jammed.is_operational());

        assert_eq!(
            DiagnosticMain::from(0x42),
            DiagnosticMain::Unknown(0x42)
        );
        assert!(Diagnostics::parse("03").is_err());
    }
}

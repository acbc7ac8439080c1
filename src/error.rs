//! # MDB Error Handling
//!
//! This module defines the error types that can occur in the mdb-changer crate:
//! transport failures reported by the bus adapter channel, decode failures for
//! the hex payloads returned by the coin changer, and the crate-level
//! [`MdbError`] that wraps both.

use thiserror::Error;

/// Failure of a single command/response exchange with the bus adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// No channel is configured, or the channel could not be opened or written.
    #[error("Transport unavailable: {0}")]
    Unavailable(String),

    /// The adapter did not answer, or answered with an empty/unreadable line.
    #[error("No response from adapter")]
    NoResponse,

    /// The adapter answered with a negative acknowledgement.
    #[error("Command rejected: {0}")]
    Rejected(String),
}

/// Failure to interpret a response payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The payload after the response tag is empty.
    #[error("Empty payload")]
    EmptyPayload,

    /// A two-digit hex field could not be parsed.
    #[error("Invalid hex at nibble offset {offset}: {text:?}")]
    InvalidHex { offset: usize, text: String },

    /// The first event byte of a poll payload was zero.
    #[error("Unexpected zero event byte")]
    ZeroEvent,

    /// A deposited coin reported the reserved "not used" routing.
    #[error("Coin type {coin_type} reported unused routing")]
    UnusedRouting { coin_type: u8 },

    /// A fixed-layout payload is shorter than its layout requires.
    #[error("{field} payload too short: expected {expected} nibbles, got {actual}")]
    PayloadTooShort {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A text field contained non-ASCII bytes.
    #[error("Field {field} is not ASCII")]
    NonAscii { field: &'static str },

    /// The response did not start with the tag expected for the command.
    #[error("Unexpected response tag in {0:?}")]
    UnexpectedTag(String),
}

/// Represents the different error types that can occur in the crate.
#[derive(Debug, Error)]
pub enum MdbError {
    /// Indicates a failed exchange with the bus adapter.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Indicates a payload that could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The adapter answered, but not with what the command requires.
    #[error("Unexpected response to {command}: {response:?}")]
    UnexpectedResponse { command: String, response: String },

    /// Indicates an invalid controller configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Indicates an I/O failure outside the bus exchange (config files, signals).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An initialization step failed; the controller never reached the poll loop.
    #[error("Initialization failed at {step}: {source}")]
    Initialization {
        step: crate::changer::sequencer::InitStep,
        #[source]
        source: Box<MdbError>,
    },

    /// The polling loop stopped after a transport failure.
    #[error("Polling halted: {0}")]
    Halted(#[source] TransportError),
}

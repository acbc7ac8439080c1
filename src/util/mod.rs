//! # Utility Modules
//!
//! Hex payload helpers and logging patterns shared by the adapter plumbing
//! and the coin changer protocol core.

pub mod hex;
pub mod logging;

pub use hex::{byte_at, decode_fixed, encode_hex_upper};
pub use logging::{log_exchange, LogThrottle, StatusThrottle};

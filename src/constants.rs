//! MDB Coin Changer Constants
//!
//! This module defines the command vocabulary understood by the bus adapter
//! and the bit masks of the MDB coin changer event encoding.

// ----------------------------------------------------------------------------
// Adapter commands (literal, case-sensitive)
// ----------------------------------------------------------------------------

/// Read adapter firmware version
pub const CMD_VERSION: &str = "V";
/// Put the adapter into bus-master mode
pub const CMD_MASTER_MODE: &str = "M,1";
/// Coin changer RESET
pub const CMD_RESET: &str = "R,08";
/// Coin changer SETUP
pub const CMD_SETUP: &str = "R,09";
/// Coin changer TUBE STATUS
pub const CMD_TUBE_STATUS: &str = "R,0A";
/// Coin changer POLL
pub const CMD_POLL: &str = "R,0B";
/// Coin changer COIN TYPE prefix; followed by 4 hex enable + 4 hex manual dispense enable
pub const CMD_COIN_TYPE_PREFIX: &str = "R,0C";
/// Coin changer DISPENSE prefix; followed by one byte: count (high nibble), type (low nibble)
pub const CMD_DISPENSE_PREFIX: &str = "R,0D";
/// Expansion IDENTIFICATION
pub const CMD_IDENTIFY: &str = "R,0F,00";
/// Expansion SEND DIAGNOSTIC STATUS
pub const CMD_DIAGNOSE: &str = "R,0F,05";

// ----------------------------------------------------------------------------
// Response tokens
// ----------------------------------------------------------------------------

/// Prefix of a version response
pub const RESP_VERSION_TAG: &str = "v,";
/// Token confirming master mode
pub const RESP_MASTER_ACK: &str = "m,ACK";
/// Prefix of a bus (R,..) response
pub const RESP_BUS_TAG: &str = "r,";
/// Plain acknowledgement payload
pub const RESP_ACK: &str = "ACK";
/// Negative acknowledgement marker, anywhere in a response
pub const RESP_NACK: &str = "NACK";

// ----------------------------------------------------------------------------
// Poll event byte (Z1) masks
// ----------------------------------------------------------------------------

/// Z1 bit 7: coins dispensed manually
pub const EVENT_DISPENSED_BIT: u8 = 0x80;
/// Z1 bits 7-6 == 01: coin deposited
pub const EVENT_DEPOSITED_BIT: u8 = 0x40;
/// Z1 bits 7-5 == 001: slug
pub const EVENT_SLUG_BIT: u8 = 0x20;
/// Number of coins dispensed (0b1yyyxxxx)
pub const EVENT_NUM_COINS_MASK: u8 = 0x70;
/// Coin routing (0b01yyxxxx)
pub const EVENT_ROUTING_MASK: u8 = 0x30;
/// Coin type (low nibble)
pub const EVENT_COIN_TYPE_MASK: u8 = 0x0F;

/// Number of coin types a changer may report
pub const COIN_TYPE_COUNT: usize = 16;

// ----------------------------------------------------------------------------
// Fixed payload widths, in hex nibbles
// ----------------------------------------------------------------------------

/// SETUP: level(2) currency(4) scaling(2) decimals(2) routing(4) + 16 coin values
pub const SETUP_PAYLOAD_NIBBLES: usize = 14 + COIN_TYPE_COUNT * 2;
/// IDENTIFICATION: 3 + 12 + 12 + 2 + 4 bytes
pub const IDENTIFY_PAYLOAD_NIBBLES: usize = 66;
/// DIAGNOSTIC STATUS: main + sub code
pub const DIAGNOSE_PAYLOAD_NIBBLES: usize = 4;
/// TUBE STATUS: 2-byte full status word, counts follow
pub const TUBE_FULL_STATUS_NIBBLES: usize = 4;

//! Coin changer TUBE STATUS: which tubes are full and how many coins each holds.

use crate::constants::{COIN_TYPE_COUNT, EVENT_COIN_TYPE_MASK, TUBE_FULL_STATUS_NIBBLES};
use crate::error::DecodeError;
use crate::util::hex::{byte_at, decode_fixed};

/// Snapshot of the changer's tubes, refreshed on request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TubeStatus {
    /// Bit i set: tube for coin type i is full
    full: u16,
    counts: [u8; COIN_TYPE_COUNT],
}

impl TubeStatus {
    /// Parse a TUBE STATUS payload: a 2-byte full-status word followed by up
    /// to 16 count bytes. Changers omit trailing tubes they don't have; those
    /// count as empty.
    pub fn parse(payload: &str) -> Result<Self, DecodeError> {
        let word = decode_fixed(payload, TUBE_FULL_STATUS_NIBBLES, "tube status")?;
        let full = u16::from_be_bytes([word[0], word[1]]);

        let mut counts = [0u8; COIN_TYPE_COUNT];
        let mut offset = TUBE_FULL_STATUS_NIBBLES;
        for count in counts.iter_mut() {
            if offset >= payload.len() {
                break;
            }
            *count = byte_at(payload, offset)?;
            offset += 2;
        }

        Ok(Self { full, counts })
    }

    pub fn is_full(&self, coin_type: u8) -> bool {
        self.full & (1 << (coin_type & EVENT_COIN_TYPE_MASK)) != 0
    }

    pub fn count(&self, coin_type: u8) -> u8 {
        self.counts[usize::from(coin_type & EVENT_COIN_TYPE_MASK)]
    }

    pub fn counts(&self) -> &[u8; COIN_TYPE_COUNT] {
        &self.counts
    }

    pub fn full_status(&self) -> u16 {
        self.full
    }

    /// Coin types whose tube reports full.
    pub fn full_tubes(&self) -> impl Iterator<Item = u8> + '_ {
        (0..COIN_TYPE_COUNT as u8).filter(|t| self.is_full(*t))
    }
}

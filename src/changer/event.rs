//! # Poll Event Decoder
//!
//! A POLL response carries zero or more activity events. Each event starts
//! with a byte Z1 whose most significant set bit selects its kind:
//!
//! | Z1 pattern   | event                    | bytes |
//! |--------------|--------------------------|-------|
//! | `1yyyxxxx`   | coins dispensed manually | Z1 Z2 |
//! | `01yyxxxx`   | coin deposited           | Z1 Z2 |
//! | `001xxxxx`   | slug                     | Z1    |
//! | `000xxxxx`   | status (1..=31)          | Z1    |
//!
//! `xxxx` is the coin type. For dispensed coins `yyy` is the number of coins;
//! for deposits `yy` is the routing. Z2 is the number of coins left in the
//! tube for that coin type.
//!
//! Decoding is a pure function of the payload text.

use crate::changer::setup::CoinTypeTable;
use crate::constants::*;
use crate::error::DecodeError;
use crate::util::hex::byte_at;
use std::fmt;

/// Where a deposited coin went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    CashBox,
    Tube,
    NotUsed,
    Reject,
}

impl Routing {
    /// Routing from the two `yy` bits of a deposit Z1.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Routing::CashBox,
            1 => Routing::Tube,
            2 => Routing::NotUsed,
            _ => Routing::Reject,
        }
    }

    /// Whether a coin with this routing was accepted and earns credit.
    pub fn is_credited(&self) -> bool {
        matches!(self, Routing::CashBox | Routing::Tube)
    }
}

/// Changer status reported in a poll response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    EscrowRequest,
    PayoutBusy,
    NoCredit,
    DefectiveTubeSensor,
    DoubleArrival,
    AcceptorUnplugged,
    TubeJam,
    RomChecksumError,
    CoinRoutingError,
    ChangerBusy,
    ChangerReset,
    CoinJam,
    PossibleCreditedCoinRemoval,
    Unknown(u8),
}

impl StatusCode {
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Self::EscrowRequest,
            2 => Self::PayoutBusy,
            3 => Self::NoCredit,
            4 => Self::DefectiveTubeSensor,
            5 => Self::DoubleArrival,
            6 => Self::AcceptorUnplugged,
            7 => Self::TubeJam,
            8 => Self::RomChecksumError,
            9 => Self::CoinRoutingError,
            10 => Self::ChangerBusy,
            11 => Self::ChangerReset,
            12 => Self::CoinJam,
            13 => Self::PossibleCreditedCoinRemoval,
            other => Self::Unknown(other),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::EscrowRequest => 1,
            Self::PayoutBusy => 2,
            Self::NoCredit => 3,
            Self::DefectiveTubeSensor => 4,
            Self::DoubleArrival => 5,
            Self::AcceptorUnplugged => 6,
            Self::TubeJam => 7,
            Self::RomChecksumError => 8,
            Self::CoinRoutingError => 9,
            Self::ChangerBusy => 10,
            Self::ChangerReset => 11,
            Self::CoinJam => 12,
            Self::PossibleCreditedCoinRemoval => 13,
            Self::Unknown(code) => *code,
        }
    }

    /// Busy, reset and jam conditions: wait before polling again.
    pub fn requests_backoff(&self) -> bool {
        matches!(self, Self::ChangerBusy | Self::ChangerReset | Self::CoinJam)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::EscrowRequest => "EscrowRequest",
            Self::PayoutBusy => "PayoutBusy",
            Self::NoCredit => "NoCredit",
            Self::DefectiveTubeSensor => "DefectiveTubeSensor",
            Self::DoubleArrival => "DoubleArrival",
            Self::AcceptorUnplugged => "AcceptorUnplugged",
            Self::TubeJam => "TubeJam",
            Self::RomChecksumError => "RomChecksumError",
            Self::CoinRoutingError => "CoinRoutingError",
            Self::ChangerBusy => "ChangerBusy",
            Self::ChangerReset => "ChangerReset",
            Self::CoinJam => "CoinJam",
            Self::PossibleCreditedCoinRemoval => "PossibleCreditedCoinRemoval",
            Self::Unknown(_) => "Unknown",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::EscrowRequest => "an escrow lever activation has been detected",
            Self::PayoutBusy => "the changer is busy activating payout devices",
            Self::NoCredit => "a coin was validated but did not get to the place where credit is given",
            Self::DefectiveTubeSensor => "a tube sensor is behaving abnormally",
            Self::DoubleArrival => "two coins arrived too close together to validate either one",
            Self::AcceptorUnplugged => "the acceptor has been removed",
            Self::TubeJam => "a tube payout attempt resulted in a jam",
            Self::RomChecksumError => "the internal ROM checksum does not match",
            Self::CoinRoutingError => "a validated coin did not follow the intended routing",
            Self::ChangerBusy => "the changer is busy and cannot answer a detailed command",
            Self::ChangerReset => "the changer was reset and returned to its power-on idle state",
            Self::CoinJam => "coins have jammed in the acceptance path",
            Self::PossibleCreditedCoinRemoval => "an attempt to remove a credited coin was detected",
            Self::Unknown(_) => "unknown or unhandled status",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.name(), self.code(), self.description())
    }
}

/// One decoded poll event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Plain acknowledgement, nothing happened.
    Idle,
    CoinsDispensedManually {
        coin_type: u8,
        num_coins: u8,
        tube_count_after: Option<u8>,
    },
    CoinsDeposited {
        coin_type: u8,
        routing: Routing,
        tube_count_after: Option<u8>,
    },
    Slug,
    Status {
        code: StatusCode,
    },
    /// The payload could not be decoded; the event is dropped.
    Invalid(DecodeError),
}

impl Event {
    /// Signed change this event makes to the balance, given the coin table.
    ///
    /// Credited deposits add the coin's value; manually dispensed coins
    /// subtract `value * num_coins`; everything else is zero.
    pub fn credit_delta(&self, coins: &CoinTypeTable) -> i64 {
        match self {
            Event::CoinsDeposited {
                coin_type, routing, ..
            } if routing.is_credited() => i64::from(coins.credit_value(*coin_type)),
            Event::CoinsDispensedManually {
                coin_type,
                num_coins,
                ..
            } => -(i64::from(coins.credit_value(*coin_type)) * i64::from(*num_coins)),
            _ => 0,
        }
    }

    /// Whether the changer asked for a pause before the next poll.
    pub fn requests_backoff(&self) -> bool {
        matches!(self, Event::Status { code } if code.requests_backoff())
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Event::Invalid(_))
    }
}

/// Decode the event starting at nibble `offset`; returns the event and the
/// number of nibbles it used.
fn decode_one(payload: &str, offset: usize) -> (Event, usize) {
    let z1 = match byte_at(payload, offset) {
        Ok(z1) => z1,
        Err(e) => return (Event::Invalid(e), 2),
    };

    if z1 == 0 {
        return (Event::Invalid(DecodeError::ZeroEvent), 2);
    }

    let coin_type = z1 & EVENT_COIN_TYPE_MASK;
    if z1 & (EVENT_DISPENSED_BIT | EVENT_DEPOSITED_BIT) != 0 {
        let tube_count_after = match payload.get(offset + 2..) {
            Some(rest) if !rest.is_empty() => match byte_at(payload, offset + 2) {
                Ok(z2) => Some(z2),
                Err(e) => return (Event::Invalid(e), 4),
            },
            _ => None,
        };

        let event = if z1 & EVENT_DISPENSED_BIT != 0 {
            Event::CoinsDispensedManually {
                coin_type,
                num_coins: (z1 & EVENT_NUM_COINS_MASK) >> 4,
                tube_count_after,
            }
        } else {
            match Routing::from_bits((z1 & EVENT_ROUTING_MASK) >> 4) {
                Routing::NotUsed => Event::Invalid(DecodeError::UnusedRouting { coin_type }),
                routing => Event::CoinsDeposited {
                    coin_type,
                    routing,
                    tube_count_after,
                },
            }
        };
        return (event, 4);
    }

    if z1 & EVENT_SLUG_BIT != 0 {
        return (Event::Slug, 2);
    }

    (
        Event::Status {
            code: StatusCode::from_code(z1),
        },
        2,
    )
}

/// Decode every event in a poll payload (the text after the `r,` tag), in order.
///
/// An `ACK` payload is a single [`Event::Idle`]. Decoding stops after the
/// first [`Event::Invalid`], so the result is never empty and an invalid
/// event, if any, is last.
pub fn decode_events(payload: &str) -> Vec<Event> {
    let payload = payload.trim();
    if payload == RESP_ACK {
        return vec![Event::Idle];
    }
    if payload.is_empty() {
        return vec![Event::Invalid(DecodeError::EmptyPayload)];
    }

    let mut events = Vec::new();
    let mut offset = 0;
    while offset < payload.len() {
        let (event, used) = decode_one(payload, offset);
        let stop = event.is_invalid();
        events.push(event);
        if stop {
            break;
        }
        offset += used;
    }
    events
}

/// Decode the first event of a poll payload.
pub fn decode_event(payload: &str) -> Event {
    decode_events(payload)
        .into_iter()
        .next()
        .unwrap_or(Event::Invalid(DecodeError::EmptyPayload))
}

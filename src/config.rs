//! # Controller Configuration
//!
//! All tunables of the controller, loadable from a JSON file. Every field has
//! a default, so an empty object `{}` is a valid configuration:
//!
//! ```json
//! {
//!   "serial":     { "baudrate": 115200, "timeout_ms": 2000 },
//!   "token":      { "cost": 50, "coin_type": 3, "count": 1 },
//!   "acceptance": { "coin_enable": 65535, "manual_dispense_enable": 65535 },
//!   "polling":    { "interval_ms": 500, "busy_backoff_ms": 1000, "ack_attempts": 10 },
//!   "retry": {
//!     "initialization": { "max_attempts": 1, "delay_ms": 0 },
//!     "poll":           { "max_attempts": 1, "delay_ms": 0 },
//!     "dispense":       { "max_attempts": 1, "delay_ms": 0 }
//!   }
//! }
//! ```

use crate::constants::COIN_TYPE_COUNT;
use crate::error::MdbError;
use crate::mdb::retry::RetryPolicy;
use crate::mdb::serial::SerialConfig;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    pub baudrate: u32,
    pub timeout_ms: u64,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baudrate: 115_200,
            timeout_ms: 2_000,
        }
    }
}

/// Price of a token and how to release it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TokenSettings {
    /// Credit needed for one token, in the changer's base currency unit
    pub cost: i64,
    /// Tube (coin type) holding the tokens
    pub coin_type: u8,
    /// Coins released per token
    pub count: u8,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            cost: 50,
            coin_type: 3,
            count: 1,
        }
    }
}

/// Coin types to accept and to allow for manual dispensing (bit i = coin type i).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AcceptanceSettings {
    pub coin_enable: u16,
    pub manual_dispense_enable: u16,
}

impl Default for AcceptanceSettings {
    fn default() -> Self {
        Self {
            coin_enable: 0xFFFF,
            manual_dispense_enable: 0xFFFF,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    pub interval_ms: u64,
    /// Extra pause after a busy, reset or jam status
    pub busy_backoff_ms: u64,
    /// Polls allowed for the changer to answer after RESET
    pub ack_attempts: u32,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            busy_backoff_ms: 1_000,
            ack_attempts: 10,
        }
    }
}

impl PollingSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn busy_backoff(&self) -> Duration {
        Duration::from_millis(self.busy_backoff_ms)
    }
}

/// Retry policies per exchange kind. All default to a single attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub initialization: RetryPolicy,
    pub poll: RetryPolicy,
    pub dispense: RetryPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub serial: SerialSettings,
    pub token: TokenSettings,
    pub acceptance: AcceptanceSettings,
    pub polling: PollingSettings,
    pub retry: RetrySettings,
}

impl ControllerConfig {
    /// Parse a configuration from JSON text.
    pub fn from_json(text: &str) -> Result<Self, MdbError> {
        serde_json::from_str(text).map_err(|e| MdbError::Config(e.to_string()))
    }

    /// Load a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, MdbError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn serial_config(&self) -> SerialConfig {
        SerialConfig {
            baudrate: self.serial.baudrate,
            timeout: Duration::from_millis(self.serial.timeout_ms),
        }
    }

    /// Reject settings the controller cannot run with.
    pub fn validate(&self) -> Result<(), MdbError> {
        if self.token.cost <= 0 {
            return Err(MdbError::Config(format!(
                "token cost must be positive, got {}",
                self.token.cost
            )));
        }
        if usize::from(self.token.coin_type) >= COIN_TYPE_COUNT {
            return Err(MdbError::Config(format!(
                "token coin type must be 0-15, got {}",
                self.token.coin_type
            )));
        }
        if !(1..=15).contains(&self.token.count) {
            return Err(MdbError::Config(format!(
                "token count must be 1-15, got {}",
                self.token.count
            )));
        }
        if self.polling.ack_attempts == 0 {
            return Err(MdbError::Config("ack_attempts must be at least 1".into()));
        }
        if self.serial.baudrate == 0 {
            return Err(MdbError::Config("baudrate must be positive".into()));
        }
        if self.serial.timeout_ms == 0 {
            return Err(MdbError::Config("timeout_ms must be positive".into()));
        }
        for (name, policy) in [
            ("initialization", &self.retry.initialization),
            ("poll", &self.retry.poll),
            ("dispense", &self.retry.dispense),
        ] {
            if policy.max_attempts == 0 {
                return Err(MdbError::Config(format!(
                    "retry.{name}.max_attempts must be at least 1"
                )));
            }
        }
        Ok(())
    }
}

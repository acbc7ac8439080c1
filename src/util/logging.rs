//! # Exchange and Event Logging Utilities
//!
//! Helpers for logging command/response exchanges with the bus adapter, and a
//! rate limiter for the status events a coin changer can repeat on every poll
//! (a busy or jammed changer would otherwise produce two log lines a second).
//!
//! ## Usage
//!
//! ```rust
//! use mdb_changer::util::logging::StatusThrottle;
//!
//! let mut throttle = StatusThrottle::new(10_000, 3);
//! if throttle.allow("ChangerBusy") {
//!     log::warn!("changer busy");
//! }
//! ```

use crate::error::TransportError;
use std::collections::HashMap;
use std::time::Instant;

/// Log target for raw adapter traffic.
pub const EXCHANGE_TARGET: &str = "mdb::exchange";

/// Rate limiter for one log category.
#[derive(Debug)]
pub struct LogThrottle {
    window_ms: u64,
    cap: u32,
    count: u32,
    suppressed: u32,
    t0: Instant,
}

impl LogThrottle {
    /// Allow at most `cap` messages per `window_ms` milliseconds.
    pub fn new(window_ms: u64, cap: u32) -> Self {
        Self {
            window_ms,
            cap,
            count: 0,
            suppressed: 0,
            t0: Instant::now(),
        }
    }

    /// Returns `true` if the message should be logged.
    ///
    /// When a new window opens after messages were suppressed, the number of
    /// suppressed messages is logged once at debug level.
    pub fn allow(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.t0).as_millis() as u64 > self.window_ms {
            if self.suppressed > 0 {
                log::debug!("{} repeated log lines suppressed", self.suppressed);
            }
            self.t0 = now;
            self.count = 0;
            self.suppressed = 0;
        }

        self.count += 1;
        if self.count <= self.cap {
            true
        } else {
            self.suppressed += 1;
            false
        }
    }

    /// Messages suppressed in the current window.
    pub fn suppressed(&self) -> u32 {
        self.suppressed
    }
}

/// Per-category throttles, keyed by status name.
#[derive(Debug)]
pub struct StatusThrottle {
    window_ms: u64,
    cap: u32,
    throttles: HashMap<&'static str, LogThrottle>,
}

impl StatusThrottle {
    pub fn new(window_ms: u64, cap: u32) -> Self {
        Self {
            window_ms,
            cap,
            throttles: HashMap::new(),
        }
    }

    /// Check if a message in `category` may be logged.
    pub fn allow(&mut self, category: &'static str) -> bool {
        let (window_ms, cap) = (self.window_ms, self.cap);
        self.throttles
            .entry(category)
            .or_insert_with(|| LogThrottle::new(window_ms, cap))
            .allow()
    }
}

impl Default for StatusThrottle {
    fn default() -> Self {
        Self::new(10_000, 3)
    }
}

/// Log one command/response exchange at debug level.
pub fn log_exchange(command: &str, result: &Result<String, TransportError>) {
    match result {
        Ok(response) => log::debug!(target: EXCHANGE_TARGET, "{command} -> {response}"),
        Err(e) => log::debug!(target: EXCHANGE_TARGET, "{command} -> failed: {e}"),
    }
}

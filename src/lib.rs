//! # mdb-changer-rs - A Rust Crate for MDB Coin Changer Control
//!
//! The mdb-changer-rs crate drives an MDB (Multi-Drop Bus) coin changer through a
//! line-oriented bus adapter (commands like `R,0B`, responses like `r,4105`),
//! credits inserted coins and releases a token from a changer tube once enough
//! credit has accrued.
//!
//! ## Features
//!
//! - Connect to the bus adapter over a serial port
//! - Bring the changer up in a fixed, fail-fast initialization sequence
//! - Parse SETUP, tube status, identification and diagnostic payloads
//! - Decode poll events (deposits, manual dispenses, slugs, status codes)
//! - Keep a credit balance and dispense a token when it reaches the token cost
//! - Configurable retry policies, defaulting to no retry
//! - Support for logging and error handling
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mdb_changer::{connect, start_controller, ControllerConfig};
//!
//! # async fn run() -> Result<(), mdb_changer::MdbError> {
//! let config = ControllerConfig::default();
//! let transport = connect("/dev/ttyACM0", &config.serial_config()).await?;
//! let mut controller = start_controller(transport, &config).await?;
//! controller.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod changer;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod mdb;
pub mod util;

pub use crate::config::ControllerConfig;
pub use crate::error::{DecodeError, MdbError, TransportError};
pub use crate::logging::{init_logger, log_info};

pub use changer::{
    decode_event, decode_events, start_controller, BalanceLedger, ChangerInfo, CoinTypeTable,
    DeviceConfig, Event, InitStep, PollState, PollingLoop, Routing, StatusCode,
};
pub use mdb::{MockTransport, RetryPolicy, SerialConfig, SerialTransport, Transport};

/// Connect to the bus adapter via serial port.
///
/// # Arguments
/// * `port` - Serial port path (e.g., "/dev/ttyACM0" on Linux, "COM3" on Windows)
/// * `config` - Baud rate and response timeout
///
/// # Returns
/// * `Ok(SerialTransport)` - Open transport, ready for the initialization sequence
/// * `Err(MdbError)` - The port could not be opened
pub async fn connect(port: &str, config: &SerialConfig) -> Result<SerialTransport, MdbError> {
    Ok(SerialTransport::connect_with_config(port, config.clone()).await?)
}

//! The mdb module contains the bus adapter plumbing: the command vocabulary,
//! the command/response [`Transport`] seam with its serial and mock
//! implementations, and the retry policy applied to exchanges.

pub mod commands;
pub mod retry;
pub mod serial;
pub mod serial_mock;
pub mod transport;

pub use commands::*;
pub use retry::RetryPolicy;
pub use serial::{SerialConfig, SerialTransport};
pub use serial_mock::MockTransport;
pub use transport::{classify_response, Transport};

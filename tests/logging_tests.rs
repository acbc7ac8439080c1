//! Unit tests for the logging functionality in the `mdb-changer-rs` crate.

use mdb_changer::logging::{init_logger, log_debug, log_error, log_info, log_warn};
use mdb_changer::util::logging::{log_exchange, StatusThrottle};
use mdb_changer::TransportError;

/// Tests that the logging helpers work after initialization.
#[test]
fn test_logging() {
    init_logger(true);
    log_error("This is an error message");
    log_warn("This is a warning message");
    log_info("This is an info message");
    log_debug("This is a debug message");
    log_exchange("R,0B", &Ok("r,ACK".to_string()));
    log_exchange("R,0B", &Err(TransportError::NoResponse));
}

/// Tests that initializing the logger twice is harmless.
#[test]
fn test_init_logger_twice() {
    init_logger(false);
    init_logger(false);
}

#[test]
fn test_status_throttle_per_category() {
    let mut throttle = StatusThrottle::new(60_000, 1);
    assert!(throttle.allow("ChangerBusy"));
    assert!(!throttle.allow("ChangerBusy"));
    assert!(throttle.allow("TubeJam"));
}

use crate::error::TransportError;
use crate::mdb::transport::Transport;
use crate::util::logging::log_exchange;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;

/// Fixed-delay retry policy for adapter exchanges.
///
/// The default is a single attempt: a failed exchange is reported to the
/// caller immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay_ms,
        }
    }

    /// One attempt, no delay.
    pub fn none() -> Self {
        Self::new(1, 0)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Send `command`, re-sending after transport failures until an attempt
    /// succeeds or `max_attempts` are used up. The last failure is returned.
    pub async fn send<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
        command: &str,
    ) -> Result<String, TransportError> {
        let mut attempt = 1;
        loop {
            let result = transport.send(command).await;
            log_exchange(command, &result);
            match result {
                Ok(response) => return Ok(response),
                Err(err) if attempt >= self.max_attempts => return Err(err),
                Err(err) => {
                    log::warn!(
                        "{command} failed (attempt {attempt}/{}): {err}",
                        self.max_attempts
                    );
                    attempt += 1;
                    if self.delay_ms > 0 {
                        sleep(self.delay()).await;
                    }
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mdb::serial_mock::MockTransport;

    #[test]
    fn test_new_clamps_attempts() {
        assert_eq!(RetryPolicy::new(0, 5).max_attempts, 1);
        assert_eq!(RetryPolicy::default(), RetryPolicy::none());
    }

    #[tokio::test]
    async fn test_no_retry_by_default() {
        let mut mock = MockTransport::new();
        mock.queue_error("R,0B", TransportError::NoResponse)
            .queue("R,0B", "r,ACK");

        let result = RetryPolicy::none().send(&mut mock, "R,0B").await;
        assert_eq!(result, Err(TransportError::NoResponse));
        assert_eq!(mock.count_sent("R,0B"), 1);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let mut mock = MockTransport::new();
        mock.queue_error("R,0B", TransportError::NoResponse)
            .queue("R,0B", "r,NACK")
            .queue("R,0B", "r,ACK");

        let result = RetryPolicy::new(3, 0).send(&mut mock, "R,0B").await;
        assert_eq!(result.unwrap(), "r,ACK");
        assert_eq!(mock.count_sent("R,0B"), 3);
    }

    #[tokio::test]
    async fn test_returns_last_error_when_exhausted() {
        let mut mock = MockTransport::new();
        mock.queue_error("R,0D,13", TransportError::NoResponse)
            .queue("R,0D,13", "r,NACK");

        let result = RetryPolicy::new(2, 0).send(&mut mock, "R,0D,13").await;
        assert!(matches!(result, Err(TransportError::Rejected(_))));
    }
}

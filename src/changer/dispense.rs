//! Token dispensing.
//!
//! The token sits in a changer tube and is released with the DISPENSE
//! command, as if it were a coin. The balance is debited only after the
//! adapter confirms the command.

use crate::changer::ledger::BalanceLedger;
use crate::error::MdbError;
use crate::mdb::commands::{dispense_command, expect_any};
use crate::mdb::retry::RetryPolicy;
use crate::mdb::transport::Transport;

#[derive(Debug, Clone)]
pub struct DispenseController {
    command: String,
    retry: RetryPolicy,
    dispensed: u64,
    failed: u64,
}

impl DispenseController {
    /// Dispense `count` coins of `coin_type` per token.
    pub fn new(coin_type: u8, count: u8, retry: RetryPolicy) -> Self {
        Self {
            command: dispense_command(count, coin_type),
            retry,
            dispensed: 0,
            failed: 0,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Tokens released so far.
    pub fn dispensed(&self) -> u64 {
        self.dispensed
    }

    /// Dispense attempts that failed.
    pub fn failed(&self) -> u64 {
        self.failed
    }

    /// Release one token and debit its cost.
    ///
    /// On failure the balance is left untouched, so the credit stays
    /// pending; nothing schedules another attempt.
    pub async fn dispense_token<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        ledger: &mut BalanceLedger,
    ) -> bool {
        match self.try_dispense(transport).await {
            Ok(()) => {
                ledger.apply(-ledger.token_cost());
                self.dispensed += 1;
                log::info!("Released a token (balance now {})", ledger.balance());
                true
            }
            Err(e) => {
                self.failed += 1;
                log::error!(
                    "Token dispense failed, keeping balance {}: {e}",
                    ledger.balance()
                );
                false
            }
        }
    }

    async fn try_dispense<T: Transport + ?Sized>(&self, transport: &mut T) -> Result<(), MdbError> {
        expect_any(transport, &self.retry, &self.command).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::mdb::serial_mock::MockTransport;

    #[tokio::test]
    async fn test_success_debits_cost() {
        let mut mock = MockTransport::new();
        mock.queue("R,0D,13", "r,ACK");
        let mut ledger = BalanceLedger::new(50);
        ledger.apply(60);

        let mut dispenser = DispenseController::new(3, 1, RetryPolicy::none());
        assert!(dispenser.dispense_token(&mut mock, &mut ledger).await);
        assert_eq!(ledger.balance(), 10);
        assert_eq!(dispenser.dispensed(), 1);
    }

    #[tokio::test]
    async fn test_failure_keeps_balance() {
        let mut mock = MockTransport::new();
        mock.queue_error("R,0D,13", TransportError::NoResponse);
        let mut ledger = BalanceLedger::new(50);
        ledger.apply(50);

        let mut dispenser = DispenseController::new(3, 1, RetryPolicy::none());
        assert!(!dispenser.dispense_token(&mut mock, &mut ledger).await);
        assert_eq!(ledger.balance(), 50);
        assert_eq!(dispenser.failed(), 1);
        assert_eq!(mock.count_sent("R,0D,13"), 1);
    }

    #[tokio::test]
    async fn test_nack_is_failure() {
        let mut mock = MockTransport::new();
        mock.queue("R,0D,21", "r,NACK");
        let mut ledger = BalanceLedger::new(50);
        ledger.apply(75);

        let mut dispenser = DispenseController::new(1, 2, RetryPolicy::none());
        assert_eq!(dispenser.command(), "R,0D,21");
        assert!(!dispenser.dispense_token(&mut mock, &mut ledger).await);
        assert_eq!(ledger.balance(), 75);
    }

    #[tokio::test]
    async fn test_retry_policy_applies() {
        let mut mock = MockTransport::new();
        mock.queue_error("R,0D,13", TransportError::NoResponse)
            .queue("R,0D,13", "r,ACK");
        let mut ledger = BalanceLedger::new(50);
        ledger.apply(50);

        let mut dispenser = DispenseController::new(3, 1, RetryPolicy::new(2, 0));
        assert!(dispenser.dispense_token(&mut mock, &mut ledger).await);
        assert_eq!(ledger.balance(), 0);
    }
}

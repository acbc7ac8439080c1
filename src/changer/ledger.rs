//! Credit balance of the controller.
//!
//! [`BalanceLedger::apply`] is the only way the balance changes. It never
//! dispenses itself: when a credit crosses the token price it returns
//! [`LedgerAction::DispenseToken`] and the caller runs the dispense, whose
//! debit goes back through `apply` as a negative delta and therefore cannot
//! trigger another dispense.

/// What the caller must do after a balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerAction {
    None,
    DispenseToken,
}

#[derive(Debug, Clone)]
pub struct BalanceLedger {
    balance: i64,
    token_cost: i64,
}

impl BalanceLedger {
    pub fn new(token_cost: i64) -> Self {
        Self {
            balance: 0,
            token_cost,
        }
    }

    pub fn balance(&self) -> i64 {
        self.balance
    }

    pub fn token_cost(&self) -> i64 {
        self.token_cost
    }

    /// Add `delta` to the balance.
    ///
    /// Requests a dispense only for a positive delta that leaves the balance
    /// at or above the token cost.
    pub fn apply(&mut self, delta: i64) -> LedgerAction {
        let before = self.balance;
        self.balance = self.balance.saturating_add(delta);
        log::debug!("Balance {before} -> {} ({delta:+})", self.balance);

        if delta > 0 && self.balance >= self.token_cost {
            LedgerAction::DispenseToken
        } else {
            LedgerAction::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credit_below_cost() {
        let mut ledger = BalanceLedger::new(50);
        assert_eq!(ledger.apply(25), LedgerAction::None);
        assert_eq!(ledger.apply(20), LedgerAction::None);
        assert_eq!(ledger.balance(), 45);
    }

    #[test]
    fn test_crossing_requests_dispense() {
        let mut ledger = BalanceLedger::new(50);
        ledger.apply(25);
        assert_eq!(ledger.apply(25), LedgerAction::DispenseToken);
        assert_eq!(ledger.balance(), 50);
    }

    #[test]
    fn test_debit_never_requests_dispense() {
        let mut ledger = BalanceLedger::new(50);
        ledger.apply(200);
        assert_eq!(ledger.apply(-50), LedgerAction::None);
        assert_eq!(ledger.balance(), 150);
    }

    #[test]
    fn test_balance_may_go_negative() {
        let mut ledger = BalanceLedger::new(50);
        assert_eq!(ledger.apply(-30), LedgerAction::None);
        assert_eq!(ledger.balance(), -30);
        assert_eq!(ledger.apply(0), LedgerAction::None);
    }
}

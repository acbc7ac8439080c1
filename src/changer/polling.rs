//! # Polling Loop
//!
//! Polls the changer at a fixed interval and dispatches each decoded event:
//! deposits and manual dispenses go to the [`BalanceLedger`], everything else
//! is logged. A transport failure halts the loop for good; a restart means a
//! new controller.

use crate::changer::dispense::DispenseController;
use crate::changer::event::{decode_events, Event, Routing};
use crate::changer::ledger::{BalanceLedger, LedgerAction};
use crate::changer::sequencer::ChangerInfo;
use crate::changer::tubes::TubeStatus;
use crate::config::ControllerConfig;
use crate::constants::{CMD_POLL, CMD_TUBE_STATUS};
use crate::error::{MdbError, TransportError};
use crate::mdb::commands::{bus_payload, bus_query};
use crate::mdb::retry::RetryPolicy;
use crate::mdb::transport::Transport;
use crate::util::logging::StatusThrottle;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Running,
    /// Terminal: the loop stopped after a transport failure.
    Halted,
}

#[derive(Debug, Clone)]
pub struct PollSettings {
    pub interval: Duration,
    /// Added to `interval` after a busy, reset or jam status
    pub busy_backoff: Duration,
    pub retry: RetryPolicy,
}

impl From<&ControllerConfig> for PollSettings {
    fn from(config: &ControllerConfig) -> Self {
        Self {
            interval: config.polling.interval(),
            busy_backoff: config.polling.busy_backoff(),
            retry: config.retry.poll,
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::from(&ControllerConfig::default())
    }
}

/// The running controller: owns the transport, the changer data learned at
/// initialization, the balance and the dispenser.
pub struct PollingLoop<T: Transport> {
    transport: T,
    info: ChangerInfo,
    ledger: BalanceLedger,
    dispenser: DispenseController,
    settings: PollSettings,
    state: PollState,
    /// Failure that halted the loop
    halted_by: Option<TransportError>,
    throttle: StatusThrottle,
}

impl<T: Transport> PollingLoop<T> {
    pub fn new(transport: T, info: ChangerInfo, config: &ControllerConfig) -> Self {
        Self {
            transport,
            info,
            ledger: BalanceLedger::new(config.token.cost),
            dispenser: DispenseController::new(
                config.token.coin_type,
                config.token.count,
                config.retry.dispense,
            ),
            settings: PollSettings::from(config),
            state: PollState::Running,
            halted_by: None,
            throttle: StatusThrottle::default(),
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// The transport failure that halted the loop, if it has halted.
    pub fn halted_by(&self) -> Option<&TransportError> {
        self.halted_by.as_ref()
    }

    pub fn balance(&self) -> i64 {
        self.ledger.balance()
    }

    pub fn ledger(&self) -> &BalanceLedger {
        &self.ledger
    }

    pub fn info(&self) -> &ChangerInfo {
        &self.info
    }

    pub fn dispenser(&self) -> &DispenseController {
        &self.dispenser
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// One poll: send `R,0B`, decode the answer and dispatch every event.
    ///
    /// Returns the decoded events. Undecodable answers come back as
    /// [`Event::Invalid`] and change nothing.
    ///
    /// # Errors
    /// [`MdbError::Halted`] when the poll exchange fails. Every call after
    /// that returns the same failure without touching the transport.
    pub async fn tick(&mut self) -> Result<Vec<Event>, MdbError> {
        if let Some(e) = &self.halted_by {
            return Err(MdbError::Halted(e.clone()));
        }

        let response = match self.settings.retry.send(&mut self.transport, CMD_POLL).await {
            Ok(response) => response,
            Err(e) => {
                self.state = PollState::Halted;
                self.halted_by = Some(e.clone());
                log::error!("Poll failed, halting: {e}");
                return Err(MdbError::Halted(e));
            }
        };

        let events = match bus_payload(&response) {
            Ok(payload) => decode_events(payload),
            Err(e) => vec![Event::Invalid(e)],
        };

        for event in &events {
            self.dispatch(event).await;
        }
        Ok(events)
    }

    async fn dispatch(&mut self, event: &Event) {
        match event {
            Event::Idle => log::trace!("Poll: idle"),
            Event::CoinsDeposited {
                coin_type,
                routing: Routing::Reject,
                ..
            } => log::info!("Coin type {coin_type} rejected"),
            Event::CoinsDeposited {
                coin_type, routing, ..
            } => {
                let value = event.credit_delta(&self.info.coins);
                log::info!(
                    "Coin type {coin_type} deposited to {routing:?}, credit {}",
                    self.info.device.format_credit(value)
                );
                if self.ledger.apply(value) == LedgerAction::DispenseToken {
                    self.dispenser
                        .dispense_token(&mut self.transport, &mut self.ledger)
                        .await;
                }
            }
            Event::CoinsDispensedManually {
                coin_type,
                num_coins,
                ..
            } => {
                let value = event.credit_delta(&self.info.coins);
                log::info!(
                    "{num_coins} coin(s) of type {coin_type} dispensed manually, debit {}",
                    self.info.device.format_credit(-value)
                );
                self.ledger.apply(value);
            }
            Event::Slug => {
                if self.throttle.allow("Slug") {
                    log::warn!("Slug deposited");
                }
            }
            Event::Status { code } => {
                if self.throttle.allow(code.name()) {
                    if code.requests_backoff() {
                        log::warn!("Changer status {code}");
                    } else {
                        log::info!("Changer status {code}");
                    }
                }
            }
            Event::Invalid(e) => log::warn!("Dropping undecodable poll event: {e}"),
        }
    }

    /// Re-read tube fill levels (`R,0A`).
    pub async fn refresh_tube_status(&mut self) -> Result<&TubeStatus, MdbError> {
        let payload = bus_query(&mut self.transport, &self.settings.retry, CMD_TUBE_STATUS).await?;
        self.info.tubes = TubeStatus::parse(&payload)?;
        Ok(&self.info.tubes)
    }

    /// Poll until `shutdown` completes or the loop halts.
    ///
    /// `shutdown` is only observed between polls, so an exchange in flight
    /// always finishes.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<(), MdbError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            let events = self.tick().await?;

            let mut pause = self.settings.interval;
            if events.iter().any(Event::requests_backoff) {
                pause += self.settings.busy_backoff;
            }

            tokio::select! {
                _ = &mut shutdown => {
                    log::info!("Polling stopped, balance {}", self.ledger.balance());
                    return Ok(());
                }
                _ = sleep(pause) => {}
            }
        }
    }

    /// Poll until the loop halts.
    pub async fn run(&mut self) -> Result<(), MdbError> {
        self.run_until(std::future::pending()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changer::identify::{Diagnostics, Identification};
    use crate::changer::setup::{CoinTypeTable, DeviceConfig};
    use crate::mdb::serial_mock::{identify_fixture, MockTransport};

    fn info() -> ChangerInfo {
        let mut values = [0u32; 16];
        values[1] = 5;
        values[2] = 10;
        values[3] = 25;
        ChangerInfo {
            firmware_version: "MDB-USB 3.0.1".to_string(),
            device: DeviceConfig {
                feature_level: 3,
                currency_code: 0x1978,
                scaling_factor: 5,
                decimal_places: 2,
                coin_routing: 0x000F,
            },
            coins: CoinTypeTable::from_values(values),
            identification: Identification::parse(&identify_fixture()).unwrap(),
            diagnostics: Diagnostics::parse("0300").unwrap(),
            tubes: TubeStatus::default(),
        }
    }

    fn polling(mock: &MockTransport) -> PollingLoop<MockTransport> {
        PollingLoop::new(mock.clone(), info(), &ControllerConfig::default())
    }

    #[tokio::test]
    async fn test_deposit_credits_balance() {
        let mock = MockTransport::new();
        mock.queue("R,0B", "r,41");
        let mut poller = polling(&mock);

        let events = poller.tick().await.unwrap();
        assert_eq!(
            events,
            vec![Event::CoinsDeposited {
                coin_type: 1,
                routing: Routing::CashBox,
                tube_count_after: None
            }]
        );
        assert_eq!(poller.balance(), 5);
    }

    #[tokio::test]
    async fn test_manual_dispense_debits() {
        let mock = MockTransport::new();
        mock.queue("R,0B", "r,B205");
        let mut poller = polling(&mock);

        poller.tick().await.unwrap();
        assert_eq!(poller.balance(), -30);
        assert_eq!(mock.count_sent("R,0D,13"), 0);
    }

    #[tokio::test]
    async fn test_rejected_and_invalid_change_nothing() {
        let mock = MockTransport::new();
        mock.queue("R,0B", "r,73")
            .queue("R,0B", "r,00")
            .queue("R,0B", "r,63")
            .queue("R,0B", "x,garbage")
            .queue("R,0B", "r,01");
        let mut poller = polling(&mock);

        for _ in 0..5 {
            poller.tick().await.unwrap();
        }
        assert_eq!(poller.balance(), 0);
        assert_eq!(poller.state(), PollState::Running);
    }

    #[tokio::test]
    async fn test_crossing_cost_dispenses_once() {
        let mock = MockTransport::new();
        mock.queue("R,0B", "r,5302")
            .queue("R,0B", "r,5303")
            .queue("R,0D,13", "r,ACK");
        let mut poller = polling(&mock);

        poller.tick().await.unwrap();
        assert_eq!(poller.balance(), 25);
        poller.tick().await.unwrap();
        assert_eq!(poller.balance(), 0);
        assert_eq!(mock.count_sent("R,0D,13"), 1);
        assert_eq!(poller.dispenser().dispensed(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_halts() {
        let mock = MockTransport::new();
        mock.queue_error("R,0B", TransportError::NoResponse)
            .queue("R,0B", "r,ACK");
        let mut poller = polling(&mock);

        assert!(matches!(
            poller.tick().await,
            Err(MdbError::Halted(TransportError::NoResponse))
        ));
        assert_eq!(poller.state(), PollState::Halted);
        assert_eq!(poller.halted_by(), Some(&TransportError::NoResponse));

        // Later ticks report the original failure and send nothing
        assert!(matches!(
            poller.tick().await,
            Err(MdbError::Halted(TransportError::NoResponse))
        ));
        assert_eq!(mock.count_sent("R,0B"), 1);
    }

    #[tokio::test]
    async fn test_busy_status_requests_backoff() {
        let mock = MockTransport::new();
        mock.queue("R,0B", "r,0A");
        let mut poller = polling(&mock);

        let events = poller.tick().await.unwrap();
        assert!(events[0].requests_backoff());
    }

    #[tokio::test]
    async fn test_refresh_tube_status() {
        let mock = MockTransport::new();
        mock.queue("R,0A", &format!("r,0002{}", "07".repeat(16)));
        let mut poller = polling(&mock);

        let tubes = poller.refresh_tube_status().await.unwrap();
        assert!(tubes.is_full(1));
        assert_eq!(tubes.count(4), 7);
        assert!(poller.info().tubes.is_full(1));
    }

    #[tokio::test]
    async fn test_run_until_halt() {
        let mock = MockTransport::new();
        mock.queue("R,0B", "r,ACK").queue("R,0B", "r,41");
        let mut poller = polling(&mock);

        let result = poller.run().await;
        assert!(matches!(result, Err(MdbError::Halted(_))));
        assert_eq!(poller.balance(), 5);
        assert_eq!(mock.count_sent("R,0B"), 3);
    }

    #[tokio::test]
    async fn test_run_until_shutdown() {
        let mock = MockTransport::new();
        mock.set_default("R,0B", "r,ACK");
        let mut poller = polling(&mock);

        let shutdown = sleep(Duration::from_millis(1_200));
        poller.run_until(shutdown).await.unwrap();
        assert_eq!(poller.state(), PollState::Running);
        // One poll at start, then one per 500 ms interval
        let polls = mock.count_sent("R,0B");
        assert!((2..=3).contains(&polls), "{polls} polls");
    }
}

//! # Initialization Sequencer
//!
//! Brings the adapter and the coin changer from power-on to ready-to-accept
//! in a fixed order of steps. There is no recovery: the first step that fails
//! ends the sequence, and the controller never reaches the poll loop. A
//! [`RetryPolicy`] may be injected to repeat failed exchanges within a step;
//! the default repeats nothing.

use crate::changer::event::{decode_events, Event};
use crate::changer::identify::{Diagnostics, Identification};
use crate::changer::setup::{parse_setup, CoinTypeTable, DeviceConfig};
use crate::changer::tubes::TubeStatus;
use crate::config::ControllerConfig;
use crate::constants::*;
use crate::error::{MdbError, TransportError};
use crate::mdb::commands::{bus_payload, bus_query, coin_type_command, expect_any};
use crate::mdb::retry::RetryPolicy;
use crate::mdb::transport::Transport;
use crate::util::logging::log_exchange;
use std::fmt;

/// The initialization steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStep {
    ReadVersion,
    SetMasterMode,
    Reset,
    PollUntilAck,
    Setup,
    Identify,
    Diagnose,
    RequestTubeStatus,
    ConfigureCoinAcceptance,
}

impl InitStep {
    pub const ALL: [InitStep; 9] = [
        InitStep::ReadVersion,
        InitStep::SetMasterMode,
        InitStep::Reset,
        InitStep::PollUntilAck,
        InitStep::Setup,
        InitStep::Identify,
        InitStep::Diagnose,
        InitStep::RequestTubeStatus,
        InitStep::ConfigureCoinAcceptance,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            InitStep::ReadVersion => "version readout",
            InitStep::SetMasterMode => "master mode",
            InitStep::Reset => "changer reset",
            InitStep::PollUntilAck => "poll after reset",
            InitStep::Setup => "changer setup",
            InitStep::Identify => "changer identification",
            InitStep::Diagnose => "changer diagnosis",
            InitStep::RequestTubeStatus => "tube status request",
            InitStep::ConfigureCoinAcceptance => "coin type configuration",
        }
    }
}

impl fmt::Display for InitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything learned about the changer during initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangerInfo {
    pub firmware_version: String,
    pub device: DeviceConfig,
    pub coins: CoinTypeTable,
    pub identification: Identification,
    pub diagnostics: Diagnostics,
    pub tubes: TubeStatus,
}

#[derive(Debug, Clone)]
pub struct SequencerSettings {
    pub ack_attempts: u32,
    pub retry: RetryPolicy,
    pub coin_enable: u16,
    pub manual_dispense_enable: u16,
}

impl From<&ControllerConfig> for SequencerSettings {
    fn from(config: &ControllerConfig) -> Self {
        Self {
            ack_attempts: config.polling.ack_attempts,
            retry: config.retry.initialization,
            coin_enable: config.acceptance.coin_enable,
            manual_dispense_enable: config.acceptance.manual_dispense_enable,
        }
    }
}

impl Default for SequencerSettings {
    fn default() -> Self {
        Self::from(&ControllerConfig::default())
    }
}

enum StepOutcome {
    Confirmed,
    Version(String),
    Setup(DeviceConfig, CoinTypeTable),
    Identified(Identification),
    Diagnosed(Diagnostics),
    Tubes(TubeStatus),
}

#[derive(Default)]
struct Collected {
    firmware_version: Option<String>,
    setup: Option<(DeviceConfig, CoinTypeTable)>,
    identification: Option<Identification>,
    diagnostics: Option<Diagnostics>,
    tubes: Option<TubeStatus>,
}

impl Collected {
    fn record(&mut self, outcome: StepOutcome) {
        match outcome {
            StepOutcome::Confirmed => {}
            StepOutcome::Version(v) => self.firmware_version = Some(v),
            StepOutcome::Setup(device, coins) => self.setup = Some((device, coins)),
            StepOutcome::Identified(id) => self.identification = Some(id),
            StepOutcome::Diagnosed(d) => self.diagnostics = Some(d),
            StepOutcome::Tubes(t) => self.tubes = Some(t),
        }
    }

    fn finish(self) -> Result<ChangerInfo, MdbError> {
        let missing = |what: &str| MdbError::Config(format!("initialization produced no {what}"));
        let (device, coins) = self.setup.ok_or_else(|| missing("setup"))?;
        Ok(ChangerInfo {
            firmware_version: self.firmware_version.ok_or_else(|| missing("version"))?,
            device,
            coins,
            identification: self.identification.ok_or_else(|| missing("identification"))?,
            diagnostics: self.diagnostics.ok_or_else(|| missing("diagnostics"))?,
            tubes: self.tubes.ok_or_else(|| missing("tube status"))?,
        })
    }
}

/// Runs [`InitStep::ALL`] against a transport, stopping at the first failure.
pub struct InitializationSequencer<'a, T: Transport + ?Sized> {
    transport: &'a mut T,
    settings: SequencerSettings,
    completed: Vec<InitStep>,
}

impl<'a, T: Transport + ?Sized> InitializationSequencer<'a, T> {
    pub fn new(transport: &'a mut T, settings: SequencerSettings) -> Self {
        Self {
            transport,
            settings,
            completed: Vec::with_capacity(InitStep::ALL.len()),
        }
    }

    /// Steps that finished successfully, in order.
    pub fn completed(&self) -> &[InitStep] {
        &self.completed
    }

    /// Run every step in order.
    ///
    /// # Errors
    /// [`MdbError::Initialization`] naming the first step that failed.
    pub async fn run(&mut self) -> Result<ChangerInfo, MdbError> {
        let mut collected = Collected::default();

        for step in InitStep::ALL {
            match self.execute(step).await {
                Ok(outcome) => {
                    log::info!("{step} succeeded");
                    self.completed.push(step);
                    collected.record(outcome);
                }
                Err(e) => {
                    log::error!("{step} failed: {e}");
                    return Err(MdbError::Initialization {
                        step,
                        source: Box::new(e),
                    });
                }
            }
        }

        collected.finish()
    }

    async fn execute(&mut self, step: InitStep) -> Result<StepOutcome, MdbError> {
        let retry = self.settings.retry;
        let transport = &mut *self.transport;

        match step {
            InitStep::ReadVersion => {
                let response = expect_any(transport, &retry, CMD_VERSION).await?;
                let version = response
                    .strip_prefix(RESP_VERSION_TAG)
                    .ok_or_else(|| unexpected(CMD_VERSION, &response))?;
                log::info!("Adapter firmware: {}", version.trim());
                Ok(StepOutcome::Version(version.trim().to_string()))
            }
            InitStep::SetMasterMode => {
                let response = expect_any(transport, &retry, CMD_MASTER_MODE).await?;
                if !response.contains(RESP_MASTER_ACK) {
                    return Err(unexpected(CMD_MASTER_MODE, &response));
                }
                Ok(StepOutcome::Confirmed)
            }
            InitStep::Reset => {
                expect_any(transport, &retry, CMD_RESET).await?;
                Ok(StepOutcome::Confirmed)
            }
            InitStep::PollUntilAck => self.poll_until_ack().await,
            InitStep::Setup => {
                let payload = bus_query(transport, &retry, CMD_SETUP).await?;
                let (device, coins) = parse_setup(&payload)?;
                log::info!(
                    "Feature level {}, currency 0x{}, scaling {}, {} decimal places, routing 0x{:04X}",
                    device.feature_level,
                    device.currency_code_hex(),
                    device.scaling_factor,
                    device.decimal_places,
                    device.coin_routing
                );
                log::info!("Coin type credit values: {:?}", coins.values());
                Ok(StepOutcome::Setup(device, coins))
            }
            InitStep::Identify => {
                let payload = bus_query(transport, &retry, CMD_IDENTIFY).await?;
                let id = Identification::parse(&payload)?;
                log::info!(
                    "Changer {} serial {} model {} software {} features {:?}",
                    id.manufacturer,
                    id.serial_number,
                    id.model,
                    id.software_version,
                    id.optional_features
                );
                Ok(StepOutcome::Identified(id))
            }
            InitStep::Diagnose => {
                let payload = bus_query(transport, &retry, CMD_DIAGNOSE).await?;
                let diagnostics = Diagnostics::parse(&payload)?;
                if diagnostics.is_operational() {
                    log::info!("Diagnostic status: {diagnostics}");
                } else {
                    log::warn!("Changer not fully operational: {diagnostics}");
                }
                Ok(StepOutcome::Diagnosed(diagnostics))
            }
            InitStep::RequestTubeStatus => {
                let payload = bus_query(transport, &retry, CMD_TUBE_STATUS).await?;
                let tubes = TubeStatus::parse(&payload)?;
                log::info!(
                    "Tube full status 0x{:04X}, counts {:?}",
                    tubes.full_status(),
                    tubes.counts()
                );
                Ok(StepOutcome::Tubes(tubes))
            }
            InitStep::ConfigureCoinAcceptance => {
                let command = coin_type_command(
                    self.settings.coin_enable,
                    self.settings.manual_dispense_enable,
                );
                expect_any(transport, &retry, &command).await?;
                Ok(StepOutcome::Confirmed)
            }
        }
    }

    /// Poll until the changer answers with an ACK or a decodable event.
    ///
    /// Each transport failure or undecodable answer uses up one of
    /// `ack_attempts`. Events seen here are logged only: the coin table is
    /// not known yet, so nothing is credited.
    async fn poll_until_ack(&mut self) -> Result<StepOutcome, MdbError> {
        let attempts = self.settings.ack_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            let result = self.transport.send(CMD_POLL).await;
            log_exchange(CMD_POLL, &result);

            let failure = match result {
                Ok(response) => match bus_payload(&response) {
                    Ok(payload) => {
                        let events = decode_events(payload);
                        match events.first() {
                            Some(Event::Invalid(e)) => MdbError::from(e.clone()),
                            _ => {
                                for event in &events {
                                    log::info!("Poll after reset: {event:?}");
                                }
                                return Ok(StepOutcome::Confirmed);
                            }
                        }
                    }
                    Err(e) => MdbError::from(e),
                },
                Err(e) => MdbError::from(e),
            };

            log::warn!("Poll {attempt}/{attempts} after reset failed: {failure}");
            last_error = Some(failure);
        }

        Err(last_error.unwrap_or(MdbError::Transport(TransportError::NoResponse)))
    }
}

fn unexpected(command: &str, response: &str) -> MdbError {
    MdbError::UnexpectedResponse {
        command: command.to_string(),
        response: response.to_string(),
    }
}

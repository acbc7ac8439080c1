//! The changer module contains the coin changer protocol core: payload
//! parsing for SETUP, tube status, identification and diagnostics, the poll
//! event decoder, the balance ledger, token dispensing, and the controller
//! state machines (initialization sequencer and polling loop).

pub mod controller;
pub mod dispense;
pub mod event;
pub mod identify;
pub mod ledger;
pub mod polling;
pub mod sequencer;
pub mod setup;
pub mod tubes;

pub use controller::start_controller;
pub use dispense::DispenseController;
pub use event::{decode_event, decode_events, Event, Routing, StatusCode};
pub use identify::{DiagnosticMain, Diagnostics, Identification, OptionalFeatures};
pub use ledger::{BalanceLedger, LedgerAction};
pub use polling::{PollSettings, PollState, PollingLoop};
pub use sequencer::{ChangerInfo, InitStep, InitializationSequencer, SequencerSettings};
pub use setup::{encode_setup, parse_setup, CoinTypeTable, DeviceConfig};
pub use tubes::TubeStatus;

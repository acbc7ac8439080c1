//! Controller entry point: initialize the changer, then hand the transport to
//! the polling loop.

use crate::changer::polling::PollingLoop;
use crate::changer::sequencer::{InitializationSequencer, SequencerSettings};
use crate::config::ControllerConfig;
use crate::error::MdbError;
use crate::mdb::transport::Transport;

/// Run the initialization sequence on `transport`.
///
/// On success the returned loop owns the transport and is ready to poll.
/// On failure no poll is ever sent.
pub async fn start_controller<T: Transport>(
    mut transport: T,
    config: &ControllerConfig,
) -> Result<PollingLoop<T>, MdbError> {
    config.validate()?;

    let info = InitializationSequencer::new(&mut transport, SequencerSettings::from(config))
        .run()
        .await?;

    log::info!(
        "Changer ready: {} {}, token cost {}",
        info.identification.manufacturer,
        info.identification.model,
        info.device.format_credit(config.token.cost)
    );
    Ok(PollingLoop::new(transport, info, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changer::polling::PollState;
    use crate::changer::sequencer::InitStep;
    use crate::mdb::serial_mock::MockTransport;

    const SETUP: &str = "0319780502000F0102040A000000000000000000000000";

    #[tokio::test]
    async fn test_start_controller() {
        let mock = MockTransport::new();
        mock.script_startup(SETUP);

        let poller = start_controller(mock.clone(), &ControllerConfig::default())
            .await
            .unwrap();
        assert_eq!(poller.state(), PollState::Running);
        assert_eq!(poller.balance(), 0);
        assert_eq!(poller.info().coins.credit_value(1), 10);
        assert_eq!(mock.count_sent("R,0B"), 1);
    }

    #[tokio::test]
    async fn test_invalid_config_sends_nothing() {
        let mock = MockTransport::new();
        let mut config = ControllerConfig::default();
        config.token.cost = -1;

        assert!(matches!(
            start_controller(mock.clone(), &config).await,
            Err(MdbError::Config(_))
        ));
        assert!(mock.sent_commands().is_empty());
    }

    #[tokio::test]
    async fn test_setup_failure_stops_before_polling() {
        let mock = MockTransport::new();
        mock.script_startup("0319");

        let err = start_controller(mock.clone(), &ControllerConfig::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            MdbError::Initialization {
                step: InitStep::Setup,
                ..
            }
        ));
        assert_eq!(mock.count_sent("R,0F,00"), 0);
        assert_eq!(mock.count_sent("R,0B"), 1);
    }
}

//! Integration tests for the initialization sequence against a scripted adapter.


use mdb_changer::changer::{InitializationSequencer, SequencerSettings};
use mdb_changer::constants::*;
use mdb_changer::{
    start_controller, ControllerConfig, InitStep, MdbError, MockTransport, RetryPolicy,
    TransportError,
};
use mdb_changer::mdb::serial_mock::identify_fixture;
use mock_support::{ready_changer, setup_payload};

/// The command each step sends, in order.
const STEP_COMMANDS: [&str; 9] = [
    CMD_VERSION,
    CMD_MASTER_MODE,
    CMD_RESET,
    CMD_POLL,
    CMD_SETUP,
    CMD_IDENTIFY,
    CMD_DIAGNOSE,
    CMD_TUBE_STATUS,
    "R,0C,FFFFFFFF",
];

/// Good answers, one per entry of `STEP_COMMANDS`.
fn good_replies() -> Vec<String> {
    vec![
        "v,MDB-USB 3.0.1".to_string(),
        "m,ACK".to_string(),
        "r,ACK".to_string(),
        "r,ACK".to_string(),
        format!("r,{}", setup_payload()),
        format!("r,{}", identify_fixture()),
        "r,0300".to_string(),
        "r,0000".to_string(),
        "r,ACK".to_string(),
    ]
}

/// Script every step before `failing` to succeed and `failing` to be rejected.
fn changer_failing_at(failing: usize) -> MockTransport {
    let mock = MockTransport::new();
    for (command, reply) in STEP_COMMANDS.iter().zip(good_replies()).take(failing) {
        mock.queue(command, &reply);
    }
    mock.queue_error(STEP_COMMANDS[failing], TransportError::Rejected("r,NACK".into()));
    mock
}

#[tokio::test]
async fn test_successful_initialization() {
    let mock = ready_changer();
    let poller = start_controller(mock.clone(), &ControllerConfig::default())
        .await
        .unwrap();

    assert_eq!(mock.sent_commands(), STEP_COMMANDS.to_vec());
    let info = poller.info();
    assert_eq!(info.firmware_version, "MDB-USB 3.0.1");
    assert_eq!(info.device.scaling_factor, 5);
    assert_eq!(info.coins.credit_value(3), 25);
    assert_eq!(info.identification.model, "CHANGER-1");
}

#[tokio::test]
async fn test_each_failing_step_stops_the_sequence() {
    for (index, step) in InitStep::ALL.iter().enumerate() {
        let mock = changer_failing_at(index);
        let result = start_controller(mock.clone(), &ControllerConfig::default()).await;

        match result {
            Err(MdbError::Initialization { step: failed, .. }) => assert_eq!(failed, *step),
            Err(other) => panic!("{step}: unexpected error {other}"),
            Ok(_) => panic!("{step}: initialization should fail"),
        }

        let sent = mock.sent_commands();
        // PollUntilAck re-polls until its attempts run out
        let expected_len = if *step == InitStep::PollUntilAck {
            index + 10
        } else {
            index + 1
        };
        assert_eq!(sent.len(), expected_len, "{step}: {sent:?}");
        for later in &STEP_COMMANDS[index + 1..] {
            if *later != CMD_POLL {
                assert_eq!(mock.count_sent(later), 0, "{step} sent {later}");
            }
        }
    }
}

#[tokio::test]
async fn test_nack_during_setup_is_fatal() {
    let mock = MockTransport::new();
    mock.queue(CMD_VERSION, "v,1")
        .queue(CMD_MASTER_MODE, "m,ACK")
        .queue(CMD_RESET, "r,ACK")
        .queue(CMD_POLL, "r,ACK")
        .queue(CMD_SETUP, "r,NACK");

    let err = start_controller(mock.clone(), &ControllerConfig::default())
        .await
        .err()
        .unwrap();
    assert_eq!(
        err.to_string(),
        "Initialization failed at changer setup: Transport error: Command rejected: r,NACK"
    );
}

#[tokio::test]
async fn test_reset_events_are_not_credited() {
    let mock = MockTransport::new();
    mock.queue(CMD_VERSION, "v,1")
        .queue(CMD_MASTER_MODE, "m,ACK")
        .queue(CMD_RESET, "r,ACK")
        .queue(CMD_POLL, "r,5305")
        .queue(CMD_SETUP, &format!("r,{}", setup_payload()))
        .queue(CMD_IDENTIFY, &format!("r,{}", identify_fixture()))
        .queue(CMD_DIAGNOSE, "r,0300")
        .queue(CMD_TUBE_STATUS, "r,0000")
        .queue("R,0C,FFFFFFFF", "r,ACK");

    let poller = start_controller(mock.clone(), &ControllerConfig::default())
        .await
        .unwrap();
    assert_eq!(poller.balance(), 0);
}

#[tokio::test]
async fn test_retry_policy_covers_flaky_step() {
    let mock = MockTransport::new();
    mock.queue_error(CMD_VERSION, TransportError::NoResponse)
        .queue(CMD_VERSION, "v,2.0")
        .queue(CMD_MASTER_MODE, "m,ACK");

    let settings = SequencerSettings {
        retry: RetryPolicy::new(2, 0),
        ..SequencerSettings::default()
    };
    let mut transport = mock.clone();
    let mut sequencer = InitializationSequencer::new(&mut transport, settings);
    let err = sequencer.run().await.unwrap_err();

    // Version and master mode pass; reset has no script
    assert_eq!(
        sequencer.completed(),
        &[InitStep::ReadVersion, InitStep::SetMasterMode]
    );
    assert!(matches!(
        err,
        MdbError::Initialization {
            step: InitStep::Reset,
            ..
        }
    ));
    assert_eq!(mock.count_sent(CMD_VERSION), 2);
    assert_eq!(mock.count_sent(CMD_RESET), 2);
}

#[tokio::test]
async fn test_default_policy_does_not_retry() {
    let mock = MockTransport::new();
    mock.queue_error(CMD_VERSION, TransportError::NoResponse)
        .queue(CMD_VERSION, "v,2.0");

    assert!(start_controller(mock.clone(), &ControllerConfig::default())
        .await
        .is_err());
    assert_eq!(mock.count_sent(CMD_VERSION), 1);
}

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use sami::{
    CapabilityOutcome, CapabilityRequest, CommandError, CommandKind, CommandLog, Driver,
    DriverConfig, DriverError, DriverEvent, InstrumentErrorCode, ParameterError, ParameterId,
    ProtocolState, Sample, SimulatedInstrument, SimulatedTransport, StateError, Value,
};
use time::OffsetDateTime;
use tokio::sync::mpsc;

type TestDriver = Driver<SimulatedTransport, mpsc::UnboundedSender<DriverEvent>>;

fn driver(
    instrument: SimulatedInstrument,
    config: DriverConfig,
) -> (TestDriver, mpsc::UnboundedReceiver<DriverEvent>) {
    let (sink, events) = mpsc::unbounded_channel();
    (Driver::new(instrument.spawn(), sink, config), events)
}

async fn discovered(
    instrument: SimulatedInstrument,
) -> (TestDriver, mpsc::UnboundedReceiver<DriverEvent>) {
    let (mut driver, mut events) = driver(instrument, DriverConfig::default());
    driver
        .execute_capability(CapabilityRequest::Discover)
        .await
        .expect("simulated instrument answers discovery");
    while events.try_recv().is_ok() {}
    (driver, events)
}

fn drain(events: &mut mpsc::UnboundedReceiver<DriverEvent>) -> Vec<DriverEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

#[tokio::test(start_paused = true)]
async fn discover_enters_command_state_and_caches_configuration() {
    let log = CommandLog::default();
    let (mut driver, mut events) = driver(
        SimulatedInstrument::builder().command_log(log.clone()).build(),
        DriverConfig::default(),
    );

    let outcome = driver
        .execute_capability(CapabilityRequest::Discover)
        .await
        .expect("discovery succeeds");

    assert_matches!(outcome, CapabilityOutcome::Status { status } if status.counters.is_some());
    assert_eq!(ProtocolState::Command, driver.state());
    assert_eq!(Value::Int(0x10), driver.registry().get(ParameterId::PumpPulse));
    assert_eq!(vec!["S".to_string(), "L".to_string()], log.lines());
    assert_eq!(
        vec![
            DriverEvent::StateChanged {
                state: ProtocolState::Command
            },
            DriverEvent::ConfigChanged,
        ],
        drain(&mut events)
    );
}

#[tokio::test(start_paused = true)]
async fn commands_before_discovery_are_rejected_without_traffic() {
    let log = CommandLog::default();
    let (mut driver, _events) = driver(
        SimulatedInstrument::builder().command_log(log.clone()).build(),
        DriverConfig::default(),
    );

    let error = driver
        .execute_capability(CapabilityRequest::GetParams(Vec::new()))
        .await
        .expect_err("get is not allowed before discovery");

    assert_matches!(
        error,
        DriverError::State(inner) if matches!(*inner, StateError::NotAllowed { .. })
    );
    assert_eq!(ProtocolState::Unknown, driver.state());
    assert!(log.lines().is_empty());
}

#[tokio::test(start_paused = true)]
async fn get_reads_cached_values_without_traffic() {
    let log = CommandLog::default();
    let (mut driver, _events) =
        discovered(SimulatedInstrument::builder().command_log(log.clone()).build()).await;

    let outcome = driver
        .execute_capability(CapabilityRequest::GetParams(vec![
            ParameterId::TimerInterval1,
            ParameterId::UseBaudRate57600,
        ]))
        .await
        .expect("get succeeds");

    assert_eq!(
        CapabilityOutcome::Params {
            values: BTreeMap::from([
                (ParameterId::TimerInterval1, Value::Int(0x258)),
                (ParameterId::UseBaudRate57600, Value::Bool(true)),
            ])
        },
        outcome
    );
    assert_eq!(2, log.lines().len());
}

#[tokio::test(start_paused = true)]
async fn set_uploads_the_change_and_confirms_it() {
    let log = CommandLog::default();
    let (mut driver, mut events) =
        discovered(SimulatedInstrument::builder().command_log(log.clone()).build()).await;

    let outcome = driver
        .execute_capability(CapabilityRequest::SetParams(vec![(
            ParameterId::PumpPulse,
            Value::Int(0x20),
        )]))
        .await
        .expect("set succeeds");

    assert_eq!(
        CapabilityOutcome::Params {
            values: BTreeMap::from([(ParameterId::PumpPulse, Value::Int(0x20))])
        },
        outcome
    );
    assert_eq!(Value::Int(0x20), driver.registry().get(ParameterId::PumpPulse));
    assert!(driver.registry().staged().is_empty());

    let lines = log.lines();
    assert_eq!(
        vec!["S", "L", "L", "L5A"],
        lines.iter().take(4).map(String::as_str).collect::<Vec<_>>()
    );
    assert_eq!(Some("20"), lines[4].get(78..80));
    assert_eq!(Some("L"), lines.last().map(String::as_str));
    assert_eq!(vec![DriverEvent::ConfigChanged], drain(&mut events));
}

#[tokio::test(start_paused = true)]
async fn invalid_set_is_rejected_before_any_upload() {
    let log = CommandLog::default();
    let (mut driver, _events) =
        discovered(SimulatedInstrument::builder().command_log(log.clone()).build()).await;

    let error = driver
        .execute_capability(CapabilityRequest::SetParams(vec![
            (ParameterId::PumpPulse, Value::Int(0x20)),
            (ParameterId::NumBlankCycles, Value::Int(0x100)),
        ]))
        .await
        .expect_err("out-of-range value fails the batch");

    assert_matches!(
        error,
        DriverError::Parameter(inner)
            if matches!(*inner, ParameterError::OutOfRange { id: ParameterId::NumBlankCycles, .. })
    );
    assert_eq!(Value::Int(0x10), driver.registry().get(ParameterId::PumpPulse));
    assert!(!log.lines().iter().any(|line| line == "L5A"));
}

#[tokio::test(start_paused = true)]
async fn rejected_upload_keeps_the_cached_configuration() {
    let (mut driver, _events) = discovered(
        SimulatedInstrument::builder()
            .failing_commands(HashMap::from([("L5A".to_string(), 0x06)]))
            .build(),
    )
    .await;

    let error = driver
        .execute_capability(CapabilityRequest::SetParams(vec![(
            ParameterId::PumpPulse,
            Value::Int(0x20),
        )]))
        .await
        .expect_err("instrument rejects the upload");

    assert_matches!(
        error,
        DriverError::Command(inner) if matches!(
            *inner,
            CommandError::Instrument {
                command: CommandKind::SetConfiguration,
                code: InstrumentErrorCode::ConfigurationInvalid,
            }
        )
    );
    assert_eq!(ProtocolState::Command, driver.state());
    assert_eq!(Value::Int(0x10), driver.registry().get(ParameterId::PumpPulse));
    assert!(driver.registry().staged().is_empty());
}

#[tokio::test(start_paused = true)]
async fn clock_sync_writes_host_time_into_program_time() {
    let (mut driver, _events) = discovered(SimulatedInstrument::builder().build()).await;
    let before = sami::sami_seconds_from_utc(OffsetDateTime::now_utc()).expect("in range");

    let outcome = driver
        .execute_capability(CapabilityRequest::ClockSync)
        .await
        .expect("clock sync succeeds");

    let CapabilityOutcome::ClockSynced { program_time } = outcome else {
        panic!("unexpected outcome {outcome:?}");
    };
    assert!(program_time >= before);
    assert!(program_time - before < 5);
    assert_eq!(
        Value::Int(program_time),
        driver.registry().get(ParameterId::ProgramTime)
    );
    assert_eq!(Value::Int(0x10), driver.registry().get(ParameterId::PumpPulse));
}

#[tokio::test(start_paused = true)]
async fn acquire_sample_returns_and_publishes_the_record() {
    let (mut driver, mut events) = discovered(SimulatedInstrument::builder().build()).await;

    let outcome = driver
        .execute_capability(CapabilityRequest::AcquireSample)
        .await
        .expect("sample succeeds");

    let CapabilityOutcome::Record { record } = outcome else {
        panic!("unexpected outcome {outcome:?}");
    };
    assert!(record.checksum_valid);
    assert_eq!(
        vec![DriverEvent::Sample {
            sample: Sample::Record(record)
        }],
        drain(&mut events)
    );
}

#[tokio::test(start_paused = true)]
async fn instrument_error_fails_the_command_and_keeps_state() {
    let (mut driver, _events) = discovered(
        SimulatedInstrument::builder()
            .failing_commands(HashMap::from([("R".to_string(), 0x05)]))
            .build(),
    )
    .await;

    let error = driver
        .execute_capability(CapabilityRequest::AcquireSample)
        .await
        .expect_err("busy instrument fails the sample");

    assert_matches!(
        error,
        DriverError::Command(inner) if matches!(
            *inner,
            CommandError::Instrument { code: InstrumentErrorCode::InstrumentBusy, .. }
        )
    );
    assert_eq!(ProtocolState::Command, driver.state());
}

#[tokio::test(start_paused = true)]
async fn mismatched_reply_drops_to_unknown_until_rediscovered() {
    let (mut driver, mut events) = discovered(
        SimulatedInstrument::builder()
            .garbled_replies(HashMap::from([("R".to_string(), "READY".to_string())]))
            .build(),
    )
    .await;

    let error = driver
        .execute_capability(CapabilityRequest::AcquireSample)
        .await
        .expect_err("an unframed line is not a record");

    assert!(error.is_response_mismatch());
    assert_matches!(
        error,
        DriverError::Command(inner) if matches!(
            *inner,
            CommandError::UnexpectedPrompt { command: CommandKind::TakeSample, ref line }
                if line == "READY"
        )
    );
    assert_eq!(ProtocolState::Unknown, driver.state());
    assert_eq!(
        vec![DriverEvent::StateChanged {
            state: ProtocolState::Unknown
        }],
        drain(&mut events)
    );

    let rejected = driver
        .execute_capability(CapabilityRequest::AcquireStatus)
        .await
        .expect_err("unknown state needs discovery first");
    assert_matches!(rejected, DriverError::State(_));

    driver
        .execute_capability(CapabilityRequest::Discover)
        .await
        .expect("rediscovery succeeds");
    assert_eq!(ProtocolState::Command, driver.state());
}

#[test]
fn instrument_errors_are_not_mismatches() {
    let error = CommandError::Instrument {
        command: CommandKind::TakeSample,
        code: InstrumentErrorCode::InstrumentBusy,
    };
    assert!(!error.is_response_mismatch());
    assert!(!DriverError::from(error).is_response_mismatch());
}

#[tokio::test(start_paused = true)]
async fn host_can_force_unknown_and_rediscover() {
    let log = CommandLog::default();
    let (driver, mut events) = discovered(
        SimulatedInstrument::builder()
            .command_log(log.clone())
            .build(),
    )
    .await;
    let (handle, task) = driver.spawn();
    handle
        .execute(CapabilityRequest::StartAutosample)
        .await
        .expect("autosample starts");
    let commands_before = log.lines().len();

    let previous = handle.force_unknown().await.expect("driver is running");

    assert_eq!(ProtocolState::Autosample, previous);
    assert_eq!(ProtocolState::Unknown, handle.state());
    assert_eq!(commands_before, log.lines().len());
    let states: Vec<ProtocolState> = drain(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            DriverEvent::StateChanged { state } => Some(state),
            _other => None,
        })
        .collect();
    assert_eq!(vec![ProtocolState::Autosample, ProtocolState::Unknown], states);

    assert_eq!(
        ProtocolState::Unknown,
        handle.force_unknown().await.expect("driver is running")
    );

    handle
        .execute(CapabilityRequest::Discover)
        .await
        .expect("rediscovery succeeds");
    assert_eq!(ProtocolState::Command, handle.state());

    handle.shutdown();
    task.await.expect("driver task exits cleanly");
}

#[tokio::test(start_paused = true)]
async fn silent_instrument_times_out_and_stays_unknown() {
    let (mut driver, _events) = driver(
        SimulatedInstrument::builder().silent(true).build(),
        DriverConfig::builder()
            .status_timeout(Duration::from_secs(2))
            .build(),
    );

    let error = driver
        .execute_capability(CapabilityRequest::Discover)
        .await
        .expect_err("no reply means timeout");

    assert_matches!(
        error,
        DriverError::Command(inner) if matches!(
            *inner,
            CommandError::Timeout { command: CommandKind::DeviceStatus, timeout }
                if timeout == Duration::from_secs(2)
        )
    );
    assert_eq!(ProtocolState::Unknown, driver.state());
}

#[tokio::test(start_paused = true)]
async fn autosample_streams_records_until_stopped() {
    let log = CommandLog::default();
    let (driver, mut events) = discovered(
        SimulatedInstrument::builder()
            .sample_interval(Duration::from_secs(30))
            .command_log(log.clone())
            .build(),
    )
    .await;
    let (handle, task) = driver.spawn();

    let started = handle
        .execute(CapabilityRequest::StartAutosample)
        .await
        .expect("autosample starts");
    assert_eq!(
        CapabilityOutcome::StateChanged {
            state: ProtocolState::Autosample
        },
        started
    );
    assert_eq!(ProtocolState::Autosample, handle.state());

    let rejected = handle
        .execute(CapabilityRequest::AcquireSample)
        .await
        .expect_err("autosample rejects manual samples");
    assert_matches!(rejected, DriverError::State(_));

    let record = loop {
        match events.recv().await.expect("driver keeps publishing") {
            DriverEvent::Sample {
                sample: Sample::Record(record),
            } => break record,
            _other => {}
        }
    };
    assert!(record.checksum_valid);

    let stopped = handle
        .execute(CapabilityRequest::StopAutosample)
        .await
        .expect("autosample stops");
    assert_matches!(stopped, CapabilityOutcome::Immediate { status } if !status.flags.pump_on);
    assert_eq!(ProtocolState::Command, handle.state());
    assert_eq!(Some("L"), log.lines().last().map(String::as_str));

    handle.shutdown();
    task.await.expect("driver task exits cleanly");
}

#[tokio::test(start_paused = true)]
async fn scheduled_status_is_published_while_idle() {
    let (mut driver, mut events) = driver(
        SimulatedInstrument::builder().build(),
        DriverConfig::builder()
            .auto_status_interval(Duration::from_secs(60))
            .build(),
    );
    driver
        .execute_capability(CapabilityRequest::Discover)
        .await
        .expect("discovery succeeds");
    let (handle, task) = driver.spawn();

    let status = loop {
        match events.recv().await.expect("driver keeps publishing") {
            DriverEvent::Sample {
                sample: Sample::DeviceStatus(status),
            } => break status,
            _other => {}
        }
    };
    assert!(status.status.is_some());
    assert_eq!(ProtocolState::Command, handle.state());

    handle.shutdown();
    task.await.expect("driver task exits cleanly");
}

#[tokio::test(start_paused = true)]
async fn dropped_handles_stop_the_driver_task() {
    let (driver, _events) = discovered(SimulatedInstrument::builder().build()).await;
    let (handle, task) = driver.spawn();

    drop(handle);

    task.await.expect("driver task exits once every handle is gone");
}

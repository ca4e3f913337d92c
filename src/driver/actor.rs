use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::events::{DriverEvent, EventSink, Sample};
use super::state::{Action, CapabilityId, EventKind, ProtocolState, plan};
use crate::chunker::{FrameKind, RawFrame, is_bare_config};
use crate::codec::{
    DecodedFrame, DeviceStatus, FrameCodec, ImmediateStatus, InstrumentConfig, SampleRecord,
    decode_bare_config, sami_seconds_from_utc,
};
use crate::config::DriverConfig;
use crate::engine::{CommandEngine, Reply};
use crate::error::{CommandError, DriverError};
use crate::params::{ParameterId, ParameterRegistry, Value};
use crate::protocol::{Command, CommandKind};
use crate::transport::Transport;

const REQUEST_QUEUE_DEPTH: usize = 16;

/// One host request, with its arguments.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum CapabilityRequest {
    Discover,
    /// Read the named parameters; an empty list reads all of them.
    GetParams(Vec<ParameterId>),
    SetParams(Vec<(ParameterId, Value)>),
    AcquireSample,
    AcquireStatus,
    AcquireConfiguration,
    StartAutosample,
    StopAutosample,
    ClockSync,
}

impl CapabilityRequest {
    #[must_use]
    pub fn capability(&self) -> CapabilityId {
        match self {
            Self::Discover => CapabilityId::Discover,
            Self::GetParams(_) => CapabilityId::GetParam,
            Self::SetParams(_) => CapabilityId::SetParam,
            Self::AcquireSample => CapabilityId::AcquireSample,
            Self::AcquireStatus => CapabilityId::AcquireStatus,
            Self::AcquireConfiguration => CapabilityId::AcquireConfiguration,
            Self::StartAutosample => CapabilityId::StartAutosample,
            Self::StopAutosample => CapabilityId::StopAutosample,
            Self::ClockSync => CapabilityId::ClockSync,
        }
    }
}

/// Result of one accepted capability.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CapabilityOutcome {
    Status { status: DeviceStatus },
    Params { values: BTreeMap<ParameterId, Value> },
    Record { record: SampleRecord },
    Config { config: InstrumentConfig },
    Immediate { status: ImmediateStatus },
    /// Instrument program time written by the clock sync, 1904 epoch.
    ClockSynced { program_time: u32 },
    StateChanged { state: ProtocolState },
}

/// Protocol state machine for one instrument session.
///
/// Owns the command engine and the parameter registry; every method runs on
/// the caller's task, so a driver is driven by exactly one task at a time.
pub struct Driver<T, S> {
    engine: CommandEngine<T>,
    registry: ParameterRegistry,
    state: ProtocolState,
    config: DriverConfig,
    sink: S,
}

impl<T: Transport, S: EventSink> Driver<T, S> {
    /// Creates a driver in the `Unknown` state.
    pub fn new(transport: T, sink: S, config: DriverConfig) -> Self {
        Self {
            engine: CommandEngine::new(transport),
            registry: ParameterRegistry::new(),
            state: ProtocolState::Unknown,
            config,
            sink,
        }
    }

    #[must_use]
    pub fn state(&self) -> ProtocolState {
        self.state
    }

    #[must_use]
    pub fn registry(&self) -> &ParameterRegistry {
        &self.registry
    }

    /// Runs one host capability through the state table.
    ///
    /// # Errors
    ///
    /// Returns an error when the current state rejects the capability, when
    /// parameters fail validation, or when an instrument command fails. A
    /// failed command leaves the state unchanged, except that a reply which
    /// does not fit the session drops it to `Unknown` so the host can
    /// rediscover.
    #[instrument(skip(self), level = "info", fields(state = %self.state))]
    pub async fn execute_capability(
        &mut self,
        request: CapabilityRequest,
    ) -> Result<CapabilityOutcome, DriverError> {
        let event = EventKind::from(request.capability());
        let transition = plan(self.state, event)?;
        let outcome = self.perform(transition.action, request).await;
        self.publish_unsolicited();
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(error) => {
                self.abandon_on_mismatch(&error).await;
                return Err(error);
            }
        };

        if transition.next != self.state {
            self.enter(transition.next).await;
            if matches!(transition.action, Action::TransitionOnly) {
                return Ok(CapabilityOutcome::StateChanged { state: self.state });
            }
        }
        Ok(outcome)
    }

    /// Runs one scheduler event; events the current state rejects are
    /// skipped.
    #[instrument(skip(self), level = "debug", fields(state = %self.state))]
    pub async fn handle_scheduled(&mut self, event: EventKind) {
        let transition = match plan(self.state, event) {
            Ok(transition) => transition,
            Err(error) => {
                debug!(%error, "skipping scheduled event");
                return;
            }
        };
        let request = match event {
            EventKind::ScheduledClockSync => CapabilityRequest::ClockSync,
            _ => CapabilityRequest::AcquireStatus,
        };
        if let Err(error) = self.perform(transition.action, request).await {
            warn!(%error, "scheduled event failed");
            self.abandon_on_mismatch(&error).await;
        }
        self.publish_unsolicited();
    }

    /// Drops the session to `Unknown` without contacting the instrument.
    ///
    /// Returns the state the driver was in beforehand.
    #[instrument(skip(self), level = "info", fields(state = %self.state))]
    pub async fn force_unknown(&mut self) -> ProtocolState {
        let previous = self.state;
        match plan(previous, EventKind::ForceUnknown) {
            Ok(transition) if transition.next != previous => self.enter(transition.next).await,
            Ok(_) => debug!("already unknown"),
            Err(error) => warn!(%error, "cannot force unknown state"),
        }
        previous
    }

    async fn abandon_on_mismatch(&mut self, error: &DriverError) {
        if error.is_response_mismatch() && self.state != ProtocolState::Unknown {
            warn!(%error, "instrument reply does not fit the session");
            self.force_unknown().await;
        }
    }

    /// Publishes a frame that arrived outside any command.
    pub fn handle_unsolicited(&mut self, frame: RawFrame) {
        let decoded = if frame.kind() == FrameKind::Prompt && is_bare_config(frame.bytes()) {
            decode_bare_config(frame.bytes()).map(DecodedFrame::Config)
        } else {
            FrameCodec::decode(&frame)
        };

        match decoded {
            Ok(DecodedFrame::Record(record)) => self.publish(Sample::Record(record)),
            Ok(DecodedFrame::DeviceStatus(status)) => self.publish(Sample::DeviceStatus(status)),
            Ok(DecodedFrame::ImmediateStatus(status)) => {
                self.publish(Sample::ImmediateStatus(status));
            }
            Ok(DecodedFrame::Config(config)) => {
                if self.registry.apply_config(config.clone()) {
                    self.sink.notify(DriverEvent::ConfigChanged);
                }
                self.publish(Sample::Config(config));
            }
            Ok(DecodedFrame::Error(error)) => {
                warn!(code = %error.code(), "unsolicited instrument error");
            }
            Ok(DecodedFrame::Prompt { text }) => {
                debug!(%text, "ignoring unsolicited line");
            }
            Err(error) => warn!(kind = %frame.kind(), %error, "dropping undecodable frame"),
        }
    }

    async fn perform(
        &mut self,
        action: Action,
        request: CapabilityRequest,
    ) -> Result<CapabilityOutcome, DriverError> {
        match action {
            Action::ProbeStatus => {
                let status = self.acquire_status().await?;
                if request != CapabilityRequest::Discover {
                    self.publish(Sample::DeviceStatus(status.clone()));
                }
                Ok(CapabilityOutcome::Status { status })
            }
            Action::ReadParameters => {
                let CapabilityRequest::GetParams(ids) = request else {
                    return Ok(CapabilityOutcome::Params {
                        values: self.registry.snapshot(),
                    });
                };
                Ok(CapabilityOutcome::Params {
                    values: self.read_parameters(&ids),
                })
            }
            Action::WriteParameters => {
                let CapabilityRequest::SetParams(values) = request else {
                    return Ok(CapabilityOutcome::Params {
                        values: BTreeMap::new(),
                    });
                };
                self.write_parameters(values).await
            }
            Action::TakeSample => {
                let frame = self.expect_frame(Command::TakeSample).await?;
                let record = SampleRecord::decode(&frame).map_err(|source| {
                    CommandError::ProtocolViolation {
                        command: CommandKind::TakeSample,
                        source,
                    }
                })?;
                self.publish(Sample::Record(record.clone()));
                Ok(CapabilityOutcome::Record { record })
            }
            Action::FetchConfiguration => {
                let config = self.update_params().await?;
                self.publish(Sample::Config(config.clone()));
                Ok(CapabilityOutcome::Config { config })
            }
            Action::SyncClock => self.sync_clock().await,
            Action::ConfirmQuiescence => {
                let frame = self.expect_frame(Command::ImmediateStatus).await?;
                let status = ImmediateStatus::decode(&frame).map_err(|source| {
                    CommandError::ProtocolViolation {
                        command: CommandKind::ImmediateStatus,
                        source,
                    }
                })?;
                Ok(CapabilityOutcome::Immediate { status })
            }
            Action::TransitionOnly => Ok(CapabilityOutcome::StateChanged { state: self.state }),
        }
    }

    async fn enter(&mut self, next: ProtocolState) {
        info!(from = %self.state, to = %next, "state transition");
        self.state = next;

        let config_changed = if next == ProtocolState::Command {
            match self.refresh().await {
                Ok((_, changed)) => changed,
                Err(error) => {
                    warn!(%error, "configuration refresh on entering command state failed");
                    false
                }
            }
        } else {
            false
        };

        self.sink.notify(DriverEvent::StateChanged { state: next });
        if config_changed {
            self.sink.notify(DriverEvent::ConfigChanged);
        }
    }

    fn read_parameters(&self, ids: &[ParameterId]) -> BTreeMap<ParameterId, Value> {
        if ids.is_empty() {
            return self.registry.snapshot();
        }
        ids.iter().map(|id| (*id, self.registry.get(*id))).collect()
    }

    #[instrument(skip_all, level = "info", fields(count = values.len()))]
    async fn write_parameters(
        &mut self,
        values: Vec<(ParameterId, Value)>,
    ) -> Result<CapabilityOutcome, DriverError> {
        let ids: Vec<ParameterId> = values.iter().map(|(id, _)| *id).collect();
        self.registry.set_many(values)?;

        let uploaded = self.upload_staged().await;
        self.registry.clear_staged();
        uploaded?;

        Ok(CapabilityOutcome::Params {
            values: self.read_parameters(&ids),
        })
    }

    async fn upload_staged(&mut self) -> Result<(), DriverError> {
        self.update_params().await?;
        let frame = self.registry.build_outbound()?;
        self.execute(Command::SetConfiguration(frame)).await?;
        self.update_params().await?;
        Ok(())
    }

    #[instrument(skip_all, level = "info")]
    async fn sync_clock(&mut self) -> Result<CapabilityOutcome, DriverError> {
        self.update_params().await?;
        let program_time = sami_seconds_from_utc(OffsetDateTime::now_utc())
            .ok_or(DriverError::ClockOutOfRange)?;
        let overrides = BTreeMap::from([(ParameterId::ProgramTime, Value::Int(program_time))]);
        let frame = self.registry.build_with(&overrides)?;
        self.execute(Command::SetConfiguration(frame)).await?;
        self.update_params().await?;
        Ok(CapabilityOutcome::ClockSynced { program_time })
    }

    async fn acquire_status(&mut self) -> Result<DeviceStatus, DriverError> {
        let frame = self.expect_frame(Command::DeviceStatus).await?;
        DeviceStatus::decode(&frame)
            .map_err(|source| {
                CommandError::ProtocolViolation {
                    command: CommandKind::DeviceStatus,
                    source,
                }
                .into()
            })
    }

    /// Fetches the configuration and applies it to the registry.
    ///
    /// Returns the configuration and whether it differs from the cached one.
    async fn refresh(&mut self) -> Result<(InstrumentConfig, bool), DriverError> {
        let frame = self.expect_frame(Command::GetConfiguration).await?;
        let config = InstrumentConfig::decode(&frame).map_err(|source| {
            CommandError::ProtocolViolation {
                command: CommandKind::GetConfiguration,
                source,
            }
        })?;
        let changed = self.registry.apply_config(config.clone());
        Ok((config, changed))
    }

    async fn update_params(&mut self) -> Result<InstrumentConfig, DriverError> {
        let (config, changed) = self.refresh().await?;
        if changed {
            self.sink.notify(DriverEvent::ConfigChanged);
        }
        Ok(config)
    }

    async fn expect_frame(&mut self, command: Command) -> Result<RawFrame, DriverError> {
        let kind = command.kind();
        match self.execute(command).await? {
            Reply::Frame(frame) => Ok(frame),
            Reply::Prompt(line) => Err(CommandError::UnexpectedPrompt {
                command: kind,
                line,
            }
            .into()),
        }
    }

    async fn execute(&mut self, command: Command) -> Result<Reply, CommandError> {
        let timeout = self.config.timeout_for(command.kind());
        self.engine.execute(&command, timeout).await
    }

    fn publish_unsolicited(&mut self) {
        for frame in self.engine.take_unsolicited() {
            self.handle_unsolicited(frame);
        }
    }

    fn publish(&self, sample: Sample) {
        self.sink.notify(DriverEvent::Sample { sample });
    }
}

enum Request {
    Capability {
        capability: CapabilityRequest,
        reply: oneshot::Sender<Result<CapabilityOutcome, DriverError>>,
    },
    ForceUnknown {
        reply: oneshot::Sender<ProtocolState>,
    },
}

/// Cloneable handle to a driver running on its own task.
#[derive(Debug, Clone)]
pub struct DriverHandle {
    requests: mpsc::Sender<Request>,
    state: watch::Receiver<ProtocolState>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Capability { capability, .. } => f
                .debug_struct("Capability")
                .field("capability", capability)
                .finish_non_exhaustive(),
            Self::ForceUnknown { .. } => f.debug_struct("ForceUnknown").finish_non_exhaustive(),
        }
    }
}

impl DriverHandle {
    /// Runs one capability on the driver task.
    ///
    /// # Errors
    ///
    /// Returns the capability's error, or [`DriverError::Stopped`] when the
    /// driver task has exited.
    pub async fn execute(
        &self,
        capability: CapabilityRequest,
    ) -> Result<CapabilityOutcome, DriverError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Request::Capability { capability, reply })
            .await
            .map_err(|_error| DriverError::Stopped)?;
        response.await.map_err(|_error| DriverError::Stopped)?
    }

    /// Drops the session to `Unknown`, returning the state it left.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Stopped`] when the driver task has exited.
    pub async fn force_unknown(&self) -> Result<ProtocolState, DriverError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Request::ForceUnknown { reply })
            .await
            .map_err(|_error| DriverError::Stopped)?;
        response.await.map_err(|_error| DriverError::Stopped)
    }

    /// State after the most recently completed request.
    #[must_use]
    pub fn state(&self) -> ProtocolState {
        *self.state.borrow()
    }

    /// Watch channel following the protocol state.
    #[must_use]
    pub fn state_updates(&self) -> watch::Receiver<ProtocolState> {
        self.state.clone()
    }

    /// Asks the driver task to stop after the current request.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl<T, S> Driver<T, S>
where
    T: Transport + 'static,
    S: EventSink + 'static,
{
    /// Moves the driver onto its own task.
    ///
    /// The task serializes host requests, scheduler ticks and idle inbound
    /// frames, and ends on shutdown, when every handle is dropped, or when
    /// the transport closes.
    pub fn spawn(self) -> (DriverHandle, JoinHandle<()>) {
        let (requests, inbox) = mpsc::channel(REQUEST_QUEUE_DEPTH);
        let (state_tx, state) = watch::channel(self.state);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.run(inbox, state_tx, cancel.clone()));
        (
            DriverHandle {
                requests,
                state,
                cancel,
            },
            task,
        )
    }

    #[instrument(skip_all, name = "driver")]
    async fn run(
        mut self,
        mut inbox: mpsc::Receiver<Request>,
        state_tx: watch::Sender<ProtocolState>,
        cancel: CancellationToken,
    ) {
        let mut status_ticks = self.config.auto_status_interval().map(periodic);
        let mut clock_ticks = self.config.clock_sync_interval().map(periodic);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                request = inbox.recv() => {
                    let Some(request) = request else {
                        break;
                    };
                    // The requester may have given up waiting.
                    match request {
                        Request::Capability { capability, reply } => {
                            let result = self.execute_capability(capability).await;
                            state_tx.send_replace(self.state);
                            let _ = reply.send(result);
                        }
                        Request::ForceUnknown { reply } => {
                            let previous = self.force_unknown().await;
                            state_tx.send_replace(self.state);
                            let _ = reply.send(previous);
                        }
                    }
                }
                () = next_tick(&mut status_ticks) => {
                    self.handle_scheduled(EventKind::ScheduledAcquireStatus).await;
                }
                () = next_tick(&mut clock_ticks) => {
                    self.handle_scheduled(EventKind::ScheduledClockSync).await;
                }
                inbound = self.engine.receive() => match inbound {
                    Ok(Some(frame)) => self.handle_unsolicited(frame),
                    Ok(None) => {
                        info!("transport closed");
                        break;
                    }
                    Err(error) => {
                        warn!(%error, "transport failed");
                        break;
                    }
                },
            }
            state_tx.send_replace(self.state);
        }
        debug!("driver task finished");
    }
}

fn periodic(period: Duration) -> Interval {
    let mut ticks = interval_at(Instant::now() + period, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticks
}

async fn next_tick(ticks: &mut Option<Interval>) {
    match ticks {
        Some(ticks) => {
            ticks.tick().await;
        }
        None => std::future::pending().await,
    }
}

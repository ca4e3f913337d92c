use serde::Serialize;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;

/// Protocol state of one instrument session.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default, EnumIter, Display, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolState {
    #[default]
    #[strum(to_string = "unknown")]
    Unknown,
    #[strum(to_string = "command")]
    Command,
    #[strum(to_string = "autosample")]
    Autosample,
}

/// Host-invocable capabilities.
#[derive(
    Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, EnumString, Display, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityId {
    #[strum(to_string = "discover")]
    Discover,
    #[strum(to_string = "get_param")]
    GetParam,
    #[strum(to_string = "set_param")]
    SetParam,
    #[strum(to_string = "acquire_sample")]
    AcquireSample,
    #[strum(to_string = "acquire_status")]
    AcquireStatus,
    #[strum(to_string = "acquire_configuration")]
    AcquireConfiguration,
    #[strum(to_string = "start_autosample")]
    StartAutosample,
    #[strum(to_string = "stop_autosample")]
    StopAutosample,
    #[strum(to_string = "clock_sync")]
    ClockSync,
}

/// Every event the state table handles, scheduler events included.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, Display, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    #[strum(to_string = "discover")]
    Discover,
    #[strum(to_string = "get")]
    Get,
    #[strum(to_string = "set")]
    Set,
    #[strum(to_string = "acquire_sample")]
    AcquireSample,
    #[strum(to_string = "acquire_status")]
    AcquireStatus,
    #[strum(to_string = "acquire_configuration")]
    AcquireConfiguration,
    #[strum(to_string = "start_autosample")]
    StartAutosample,
    #[strum(to_string = "stop_autosample")]
    StopAutosample,
    #[strum(to_string = "clock_sync")]
    ClockSync,
    #[strum(to_string = "scheduled_acquire_status")]
    ScheduledAcquireStatus,
    #[strum(to_string = "scheduled_clock_sync")]
    ScheduledClockSync,
    /// Host abandons the current session without talking to the instrument.
    #[strum(to_string = "force_unknown")]
    ForceUnknown,
}

impl From<CapabilityId> for EventKind {
    fn from(capability: CapabilityId) -> Self {
        match capability {
            CapabilityId::Discover => Self::Discover,
            CapabilityId::GetParam => Self::Get,
            CapabilityId::SetParam => Self::Set,
            CapabilityId::AcquireSample => Self::AcquireSample,
            CapabilityId::AcquireStatus => Self::AcquireStatus,
            CapabilityId::AcquireConfiguration => Self::AcquireConfiguration,
            CapabilityId::StartAutosample => Self::StartAutosample,
            CapabilityId::StopAutosample => Self::StopAutosample,
            CapabilityId::ClockSync => Self::ClockSync,
        }
    }
}

/// Work performed for one accepted event.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Action {
    /// Issue Device-Status.
    ProbeStatus,
    /// Answer from the parameter registry.
    ReadParameters,
    /// Stage, refresh, upload and confirm a configuration.
    WriteParameters,
    TakeSample,
    FetchConfiguration,
    /// Write host time into the configuration.
    SyncClock,
    /// Issue Immediate-Status to confirm the instrument is quiet.
    ConfirmQuiescence,
    /// Change state without talking to the instrument.
    TransitionOnly,
}

/// Accepted event: what to do and where to go afterwards.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Transition {
    pub action: Action,
    pub next: ProtocolState,
}

/// Errors returned for events the current state does not accept.
#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
pub enum StateError {
    #[error("`{event}` is not allowed in state `{state}`")]
    NotAllowed {
        event: EventKind,
        state: ProtocolState,
    },
}

/// Looks up `event` in the state table.
///
/// # Errors
///
/// Returns [`StateError::NotAllowed`] for every pair the table rejects.
///
/// ```
/// use sami::{Action, EventKind, ProtocolState, plan};
///
/// let transition = plan(ProtocolState::Autosample, EventKind::StopAutosample)?;
/// assert_eq!(Action::ConfirmQuiescence, transition.action);
/// assert_eq!(ProtocolState::Command, transition.next);
/// assert!(plan(ProtocolState::Unknown, EventKind::StartAutosample).is_err());
/// # Ok::<(), sami::StateError>(())
/// ```
pub fn plan(state: ProtocolState, event: EventKind) -> Result<Transition, StateError> {
    use EventKind as E;
    use ProtocolState as S;

    let (action, next) = match (state, event) {
        (S::Unknown, E::Discover) => (Action::ProbeStatus, S::Command),

        (S::Command, E::Get) => (Action::ReadParameters, S::Command),
        (S::Command, E::Set) => (Action::WriteParameters, S::Command),
        (S::Command, E::StartAutosample) => (Action::TransitionOnly, S::Autosample),
        (S::Command, E::AcquireSample) => (Action::TakeSample, S::Command),
        (S::Command, E::AcquireStatus | E::ScheduledAcquireStatus) => {
            (Action::ProbeStatus, S::Command)
        }
        (S::Command, E::AcquireConfiguration) => (Action::FetchConfiguration, S::Command),
        (S::Command, E::ClockSync | E::ScheduledClockSync) => (Action::SyncClock, S::Command),

        (S::Autosample, E::StopAutosample) => (Action::ConfirmQuiescence, S::Command),
        (S::Autosample, E::AcquireStatus | E::ScheduledAcquireStatus) => {
            (Action::ProbeStatus, S::Autosample)
        }
        (S::Autosample, E::ScheduledClockSync) => (Action::SyncClock, S::Autosample),

        (S::Unknown | S::Command | S::Autosample, E::ForceUnknown) => {
            (Action::TransitionOnly, S::Unknown)
        }

        (
            S::Unknown,
            E::Get
            | E::Set
            | E::AcquireSample
            | E::AcquireStatus
            | E::AcquireConfiguration
            | E::StartAutosample
            | E::StopAutosample
            | E::ClockSync
            | E::ScheduledAcquireStatus
            | E::ScheduledClockSync,
        )
        | (S::Command, E::Discover | E::StopAutosample)
        | (
            S::Autosample,
            E::Discover
            | E::Get
            | E::Set
            | E::AcquireSample
            | E::AcquireConfiguration
            | E::StartAutosample
            | E::ClockSync,
        ) => return Err(StateError::NotAllowed { event, state }),
    };

    Ok(Transition { action, next })
}

/// Capabilities a host may invoke; scheduler events are not listed.
#[must_use]
pub fn capabilities() -> Vec<CapabilityId> {
    CapabilityId::iter().collect()
}

/// Capabilities the table accepts in `state`.
#[must_use]
pub fn capabilities_in(state: ProtocolState) -> Vec<CapabilityId> {
    CapabilityId::iter()
        .filter(|capability| plan(state, EventKind::from(*capability)).is_ok())
        .collect()
}

use std::time::Duration;

use derive_more::From;
use thiserror::Error;

use crate::codec::{FrameDecodeError, InstrumentErrorCode};
use crate::driver::StateError;
use crate::params::ParameterError;
use crate::protocol::CommandKind;

/// Errors returned by byte transports.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to `{address}`")]
    Connect {
        address: String,
        source: std::io::Error,
    },
    #[error("transport I/O failed")]
    Io(#[from] std::io::Error),
}

/// Errors returned while one command is outstanding.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(
        "no reply to `{command}` within {timeout}",
        timeout = humantime::format_duration(*timeout)
    )]
    Timeout {
        command: CommandKind,
        timeout: Duration,
    },
    #[error("`{command}` received unframed line `{line}` instead of its reply")]
    UnexpectedPrompt { command: CommandKind, line: String },
    #[error("`{command}` reply could not be decoded")]
    ProtocolViolation {
        command: CommandKind,
        source: FrameDecodeError,
    },
    #[error("instrument rejected `{command}` with error {code}")]
    Instrument {
        command: CommandKind,
        code: InstrumentErrorCode,
    },
    #[error("transport closed while `{command}` was outstanding")]
    TransportClosed { command: CommandKind },
    #[error("transport failed while `{command}` was outstanding")]
    Transport {
        command: CommandKind,
        source: TransportError,
    },
}

impl CommandError {
    /// The instrument answered, but not the way the session expects.
    #[must_use]
    pub fn is_response_mismatch(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedPrompt { .. } | Self::ProtocolViolation { .. }
        )
    }
}

/// Errors returned when validating runtime options.
#[derive(Debug, Error)]
pub(crate) enum CliConfigError {
    #[error("either --address or --fake must be given")]
    MissingTarget,
}

/// Errors returned by telemetry initialisation.
#[derive(Debug, Error)]
pub(crate) enum TelemetryError {
    #[error("failed to install tracing subscriber")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Top-level driver errors wrapping module-specific error types.
#[derive(Debug, Error, From)]
pub enum DriverError {
    #[error(transparent)]
    #[from(CommandError, Box<CommandError>)]
    Command(Box<CommandError>),
    #[error(transparent)]
    #[from(ParameterError, Box<ParameterError>)]
    Parameter(Box<ParameterError>),
    #[error(transparent)]
    #[from(StateError, Box<StateError>)]
    State(Box<StateError>),
    #[error(transparent)]
    #[from(FrameDecodeError, Box<FrameDecodeError>)]
    Decode(Box<FrameDecodeError>),
    #[error(transparent)]
    #[from(TransportError, Box<TransportError>)]
    Transport(Box<TransportError>),
    #[error("host clock cannot be expressed as instrument time")]
    #[from(skip)]
    ClockOutOfRange,
    #[error("driver task has stopped")]
    #[from(skip)]
    Stopped,
}

impl DriverError {
    /// True when a command failed because the reply did not fit the session.
    #[must_use]
    pub fn is_response_mismatch(&self) -> bool {
        matches!(self, Self::Command(error) if error.is_response_mismatch())
    }
}

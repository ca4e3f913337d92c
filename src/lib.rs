mod app;
mod chunker;
mod cli;
mod codec;
mod config;
mod driver;
mod engine;
mod error;
mod params;
mod protocol;
mod telemetry;
mod transport;
mod utils;

#[cfg(test)]
mod test_fixtures;

pub use app::{InstrumentSession, RunOptions, connect, run, simulated_transport};
pub use chunker::{Chunker, FrameKind, RawFrame};
pub use cli::{
    Args, Command as CliCommand, GetArgs, ListenArgs, LogLevel, OutputFormat, SetArgs, Target,
};
pub use codec::{
    ConfigEncoder, DecodedFrame, DeviceCounters, DeviceStatus, ExternalDeviceFaults, FrameCodec,
    FrameDecodeError, ImmediateFlags, ImmediateStatus, InstrumentConfig, InstrumentError,
    InstrumentErrorCode, RecordType, SAMI_EPOCH_OFFSET_SECONDS, SampleRecord, StatusFlags,
    sami_seconds_from_utc, sami_seconds_to_utc,
};
pub use config::DriverConfig;
pub use driver::{
    Action, CallbackSink, CapabilityId, CapabilityOutcome, CapabilityRequest, Driver,
    DriverEvent, DriverHandle, EventKind, EventSink, ProtocolState, Sample, StateError,
    Transition, capabilities, capabilities_in, plan,
};
pub use engine::{CommandEngine, Reply};
pub use error::{CommandError, DriverError, TransportError};
pub use params::{
    Assignment, ParameterEntry, ParameterError, ParameterId, ParameterRegistry, Value, ValueKind,
    entries, entry,
};
pub use protocol::{Command, CommandKind, ExpectedReply, TERMINATOR};
pub use transport::{CommandLog, SimulatedInstrument, SimulatedTransport, TcpTransport, Transport};

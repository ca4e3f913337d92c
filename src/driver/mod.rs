mod actor;
mod events;
mod state;

pub use self::actor::{CapabilityOutcome, CapabilityRequest, Driver, DriverHandle};
pub use self::events::{CallbackSink, DriverEvent, EventSink, Sample};
pub use self::state::{
    Action, CapabilityId, EventKind, ProtocolState, StateError, Transition, capabilities,
    capabilities_in, plan,
};

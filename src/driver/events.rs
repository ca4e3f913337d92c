use serde::Serialize;
use tokio::sync::mpsc;

use super::state::ProtocolState;
use crate::codec::{DeviceStatus, ImmediateStatus, InstrumentConfig, SampleRecord};

/// Decoded telemetry published to the host.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Sample {
    Record(SampleRecord),
    DeviceStatus(DeviceStatus),
    Config(InstrumentConfig),
    ImmediateStatus(ImmediateStatus),
}

/// Notifications emitted by the driver.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DriverEvent {
    StateChanged { state: ProtocolState },
    /// The refreshed configuration differs from the cached one.
    ConfigChanged,
    Sample { sample: Sample },
}

/// Receiver of driver notifications.
pub trait EventSink: Send {
    fn notify(&self, event: DriverEvent);
}

impl EventSink for mpsc::UnboundedSender<DriverEvent> {
    fn notify(&self, event: DriverEvent) {
        // A closed receiver means the host stopped listening.
        let _ = self.send(event);
    }
}

/// Adapts a closure into an [`EventSink`].
///
/// ```
/// use std::sync::{Arc, Mutex};
///
/// use sami::{CallbackSink, DriverEvent, EventSink};
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = CallbackSink::new({
///     let seen = Arc::clone(&seen);
///     move |event| seen.lock().expect("not poisoned").push(event)
/// });
/// sink.notify(DriverEvent::ConfigChanged);
/// assert_eq!(1, seen.lock().expect("not poisoned").len());
/// ```
#[derive(Debug, Clone)]
pub struct CallbackSink<F>(F);

impl<F> CallbackSink<F>
where
    F: Fn(DriverEvent) + Send,
{
    pub fn new(callback: F) -> Self {
        Self(callback)
    }
}

impl<F> EventSink for CallbackSink<F>
where
    F: Fn(DriverEvent) + Send,
{
    fn notify(&self, event: DriverEvent) {
        (self.0)(event);
    }
}

use std::time::Duration;

use bon::Builder;

use crate::protocol::CommandKind;

/// Driver timeouts and scheduler periods.
///
/// ```
/// use std::time::Duration;
///
/// use sami::{CommandKind, DriverConfig};
///
/// let config = DriverConfig::builder()
///     .sample_timeout(Duration::from_secs(30))
///     .auto_status_interval(Duration::from_secs(60))
///     .build();
/// assert_eq!(Duration::from_secs(30), config.timeout_for(CommandKind::TakeSample));
/// assert_eq!(Duration::from_secs(5), config.timeout_for(CommandKind::DeviceStatus));
/// ```
#[derive(Debug, Clone, Builder)]
pub struct DriverConfig {
    #[builder(default = Duration::from_secs(5))]
    status_timeout: Duration,
    #[builder(default = Duration::from_secs(10))]
    configuration_timeout: Duration,
    /// Commands answered by a bare prompt.
    #[builder(default = Duration::from_secs(5))]
    prompt_timeout: Duration,
    #[builder(default = Duration::from_secs(180))]
    sample_timeout: Duration,
    #[builder(default = Duration::from_secs(5))]
    immediate_timeout: Duration,
    /// Period of the scheduled status acquisition, if enabled.
    auto_status_interval: Option<Duration>,
    /// Period of the scheduled clock synchronisation, if enabled.
    clock_sync_interval: Option<Duration>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl DriverConfig {
    /// Reply deadline for `command`.
    #[must_use]
    pub fn timeout_for(&self, command: CommandKind) -> Duration {
        match command {
            CommandKind::DeviceStatus => self.status_timeout,
            CommandKind::GetConfiguration => self.configuration_timeout,
            CommandKind::TakeSample => self.sample_timeout,
            CommandKind::ImmediateStatus => self.immediate_timeout,
            CommandKind::SetConfiguration
            | CommandKind::Quit
            | CommandKind::AutoStatusOn
            | CommandKind::AutoStatusOff => self.prompt_timeout,
        }
    }

    #[must_use]
    pub fn auto_status_interval(&self) -> Option<Duration> {
        self.auto_status_interval
    }

    #[must_use]
    pub fn clock_sync_interval(&self) -> Option<Duration> {
        self.clock_sync_interval
    }
}

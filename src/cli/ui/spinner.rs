use std::future::Future;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::driver::CapabilityId;

/// Progress spinner shown while the instrument works on a capability.
#[derive(Debug)]
pub(crate) struct Spinner {
    enabled: bool,
}

impl Spinner {
    pub(crate) fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Runs `operation` under a spinner labelled with the capability and the
    /// time spent waiting so far.
    pub(crate) async fn while_running<F, Fut, T>(
        &self,
        capability: CapabilityId,
        operation: F,
    ) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if !self.enabled {
            return operation().await;
        }

        let bar = ProgressBar::new_spinner();
        bar.set_style(spinner_style());
        bar.set_message(activity_message(capability));
        bar.enable_steady_tick(Duration::from_millis(120));
        let result = operation().await;
        bar.finish_and_clear();
        result
    }
}

fn activity_message(capability: CapabilityId) -> String {
    match capability {
        CapabilityId::Discover => "Discovering instrument".to_string(),
        CapabilityId::AcquireSample => "Waiting for a sample record".to_string(),
        other => format!("Waiting for instrument ({other})"),
    }
}

fn spinner_style() -> ProgressStyle {
    let fallback = ProgressStyle::default_spinner();
    ProgressStyle::with_template("{spinner:.cyan.bold} {msg} {elapsed:.dim}")
        .unwrap_or(fallback)
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
}

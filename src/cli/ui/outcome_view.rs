use std::fmt::{self, Display, Formatter};

use crate::driver::CapabilityOutcome;

use super::painter::Painter;
use super::params_view::{ConfigView, ParamsView, ProgramTimeView};
use super::record_view::RecordView;
use super::status_view::{ImmediateStatusView, StatusView};

/// Renders the result of one capability.
pub(crate) struct OutcomeView<'a> {
    outcome: &'a CapabilityOutcome,
    painter: &'a Painter,
}

impl<'a> OutcomeView<'a> {
    pub(crate) fn new(outcome: &'a CapabilityOutcome, painter: &'a Painter) -> Self {
        Self { outcome, painter }
    }
}

impl Display for OutcomeView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let painter = self.painter;
        match self.outcome {
            CapabilityOutcome::Status { status } => {
                write!(f, "{}", StatusView::new(status, painter))
            }
            CapabilityOutcome::Params { values } => {
                write!(f, "{}", painter.heading("Parameters:"))?;
                write!(f, "\n{}", ParamsView::new(values, painter))
            }
            CapabilityOutcome::Record { record } => {
                write!(f, "{}", RecordView::new(record, painter))
            }
            CapabilityOutcome::Config { config } => {
                write!(f, "{}", ConfigView::new(config, painter))
            }
            CapabilityOutcome::Immediate { status } => {
                write!(f, "{}", ImmediateStatusView::new(status, painter))
            }
            CapabilityOutcome::ClockSynced { program_time } => {
                write!(f, "{} ", painter.success("Clock synchronised:"))?;
                write!(f, "{}", ProgramTimeView::new(*program_time, painter))
            }
            CapabilityOutcome::StateChanged { state } => write!(
                f,
                "{} {}",
                painter.heading("State:"),
                painter.value(state.to_string())
            ),
        }
    }
}

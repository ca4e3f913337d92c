use std::fmt::{self, Display, Formatter};

use crate::cli::listen::{ListenStopReason, ListenSummary};
use crate::driver::Sample;
use crate::utils::format_timestamp;

use super::painter::Painter;
use super::record_view::RecordLineView;

/// Renders the banner printed once autosample is running.
pub(crate) struct ListenReadyView<'a> {
    max_samples: Option<usize>,
    painter: &'a Painter,
}

impl<'a> ListenReadyView<'a> {
    pub(crate) fn new(max_samples: Option<usize>, painter: &'a Painter) -> Self {
        Self {
            max_samples,
            painter,
        }
    }
}

impl Display for ListenReadyView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let limit = match self.max_samples {
            Some(limit) => format!("until {limit} sample(s)"),
            None => "until Ctrl+C".to_string(),
        };
        write!(
            f,
            "{} {}",
            self.painter.heading("Autosample running:"),
            self.painter.muted(limit)
        )
    }
}

/// Renders one published sample as a single line.
pub(crate) struct SampleLineView<'a> {
    index: usize,
    sample: &'a Sample,
    painter: &'a Painter,
}

impl<'a> SampleLineView<'a> {
    pub(crate) fn new(index: usize, sample: &'a Sample, painter: &'a Painter) -> Self {
        Self {
            index,
            sample,
            painter,
        }
    }
}

impl Display for SampleLineView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let painter = self.painter;
        let index_label = painter.muted(format!("[{:04}]", self.index));
        match self.sample {
            Sample::Record(record) => {
                write!(f, "{}", RecordLineView::new(self.index, record, painter))
            }
            Sample::DeviceStatus(status) => write!(
                f,
                "{index_label} {} {}",
                painter.value("status"),
                format_timestamp(status.instrument_time())
            ),
            Sample::Config(config) => write!(
                f,
                "{index_label} {} {}",
                painter.value("config"),
                painter.muted(format!("program_time=0x{:08X}", config.program_time()))
            ),
            Sample::ImmediateStatus(status) => write!(
                f,
                "{index_label} {} {}",
                painter.value("immediate_status"),
                painter.muted(format!("raw=0x{:02X}", status.raw))
            ),
        }
    }
}

/// Renders the listen session summary.
pub(crate) struct ListenSummaryView<'a> {
    summary: &'a ListenSummary,
    painter: &'a Painter,
}

impl<'a> ListenSummaryView<'a> {
    pub(crate) fn new(summary: &'a ListenSummary, painter: &'a Painter) -> Self {
        Self { summary, painter }
    }
}

impl Display for ListenSummaryView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let stop_reason = match self.summary.stop_reason {
            ListenStopReason::ReachedLimit(_) => {
                self.painter.success(self.summary.stop_reason.to_string())
            }
            ListenStopReason::Interrupted | ListenStopReason::DriverStopped => {
                self.painter.warning(self.summary.stop_reason.to_string())
            }
        };
        write!(
            f,
            "{} {} {}",
            self.painter.heading("Stopped:"),
            stop_reason,
            self.painter.value(format!(
                "- received {} sample(s)",
                self.summary.received_samples
            ))
        )
    }
}

use std::fmt::{self, Display, Formatter};
use std::io;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use serde_with::SerializeDisplay;
use tracing::{info, instrument, warn};

use crate::app::{InstrumentSession, write_json_line};
use crate::cli::OutputFormat;
use crate::driver::{CapabilityRequest, Sample};

use super::ui::{ListenReadyView, ListenSummaryView, Painter, SampleLineView};

/// Arguments for the `listen` command.
#[derive(Debug, Args)]
pub struct ListenArgs {
    /// Stop after this many samples. If omitted, listen until Ctrl+C.
    #[arg(long)]
    max_samples: Option<usize>,
}

impl ListenArgs {
    /// Creates listen arguments with an optional sample limit.
    #[must_use]
    pub fn new(max_samples: Option<usize>) -> Self {
        Self { max_samples }
    }

    #[must_use]
    pub(crate) fn max_samples(&self) -> Option<usize> {
        self.max_samples
    }
}

/// Why a listen session ended.
#[derive(Debug, Clone, Copy, Eq, PartialEq, SerializeDisplay)]
pub(crate) enum ListenStopReason {
    ReachedLimit(usize),
    Interrupted,
    DriverStopped,
}

impl Display for ListenStopReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReachedLimit(limit) => write!(f, "reached limit of {limit} sample(s)"),
            Self::Interrupted => f.write_str("interrupted"),
            Self::DriverStopped => f.write_str("driver stopped"),
        }
    }
}

/// Totals printed when a listen session ends.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub(crate) struct ListenSummary {
    pub(crate) received_samples: usize,
    pub(crate) stop_reason: ListenStopReason,
}

/// Executes the `listen` command: autosample on, stream samples, autosample off.
#[instrument(
    skip(session, out, painter),
    level = "info",
    fields(max_samples = ?args.max_samples())
)]
pub(crate) async fn run<W>(
    session: &mut InstrumentSession,
    args: &ListenArgs,
    out: &mut W,
    output_format: OutputFormat,
    painter: &Painter,
) -> Result<()>
where
    W: io::Write,
{
    session.execute(CapabilityRequest::StartAutosample).await?;
    session.drain_events();
    if output_format == OutputFormat::Pretty {
        writeln!(out, "{}", ListenReadyView::new(args.max_samples(), painter))?;
    }

    let mut received_samples = 0;
    let mut write_error = None;
    let stop_reason = loop {
        match args.max_samples() {
            Some(limit) if received_samples >= limit => {
                break ListenStopReason::ReachedLimit(limit);
            }
            _ => {}
        }

        tokio::select! {
            sample = session.next_sample() => {
                let Some(sample) = sample else {
                    break ListenStopReason::DriverStopped;
                };
                received_samples += 1;
                let written =
                    write_sample(out, output_format, painter, received_samples, &sample);
                if let Err(error) = written {
                    write_error = Some(error);
                    break ListenStopReason::Interrupted;
                }
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(error) = signal {
                    warn!(%error, "failed to listen for Ctrl+C");
                }
                break ListenStopReason::Interrupted;
            }
        }
    };
    info!(%stop_reason, received_samples, "listen finished");

    let stopped = if stop_reason == ListenStopReason::DriverStopped {
        Ok(())
    } else {
        session
            .execute(CapabilityRequest::StopAutosample)
            .await
            .map(|_outcome| ())
    };

    if let Some(error) = write_error {
        return Err(error);
    }
    let summary = ListenSummary {
        received_samples,
        stop_reason,
    };
    match output_format {
        OutputFormat::Pretty => {
            writeln!(out)?;
            writeln!(out, "{}", ListenSummaryView::new(&summary, painter))?;
        }
        OutputFormat::Json => write_json_line(out, &summary)?,
    }
    stopped
}

fn write_sample<W>(
    out: &mut W,
    output_format: OutputFormat,
    painter: &Painter,
    index: usize,
    sample: &Sample,
) -> Result<()>
where
    W: io::Write,
{
    match output_format {
        OutputFormat::Pretty => writeln!(out, "{}", SampleLineView::new(index, sample, painter))?,
        OutputFormat::Json => write_json_line(out, sample)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn summary_serializes_stop_reason_as_text() {
        let summary = ListenSummary {
            received_samples: 3,
            stop_reason: ListenStopReason::ReachedLimit(3),
        };

        assert_eq!(
            r#"{"received_samples":3,"stop_reason":"reached limit of 3 sample(s)"}"#,
            serde_json::to_string(&summary).expect("summary serializes")
        );
    }
}

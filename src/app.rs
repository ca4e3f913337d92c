use std::io::{self, IsTerminal};
use std::time::Duration;

use anyhow::Result;
use bon::Builder;
use owo_colors::OwoColorize;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, instrument};

use crate::cli::ui::{OutcomeView, Painter, Spinner};
use crate::cli::{Command, LogLevel, OutputFormat, Target};
use crate::codec::DeviceStatus;
use crate::config::DriverConfig;
use crate::driver::{
    CapabilityId, CapabilityOutcome, CapabilityRequest, Driver, DriverEvent, DriverHandle,
    Sample,
};
use crate::telemetry::{self, TracingOptions};
use crate::transport::{SimulatedInstrument, TcpTransport, Transport};

/// Record period of the CLI's simulated instrument.
const SIMULATED_SAMPLE_INTERVAL: Duration = Duration::from_secs(2);

/// Creates a transport backed by the built-in simulated instrument.
///
/// Must be called from within a Tokio runtime.
#[must_use]
pub fn simulated_transport() -> Box<dyn Transport> {
    Box::new(
        SimulatedInstrument::builder()
            .sample_interval(SIMULATED_SAMPLE_INTERVAL)
            .build()
            .spawn(),
    )
}

/// Opens the transport selected on the command line.
///
/// # Errors
///
/// Returns an error if the TCP connection cannot be established.
pub async fn connect(target: &Target) -> Result<Box<dyn Transport>> {
    match target {
        Target::Simulated => Ok(simulated_transport()),
        Target::Address(address) => Ok(Box::new(TcpTransport::connect(address).await?)),
    }
}

/// A discovered instrument with its driver running on a background task.
pub struct InstrumentSession {
    handle: DriverHandle,
    task: JoinHandle<()>,
    events: UnboundedReceiverStream<DriverEvent>,
}

impl InstrumentSession {
    /// Spawns a driver over `transport` and runs discovery.
    ///
    /// ```
    /// # async fn demo() -> anyhow::Result<()> {
    /// let (session, status) =
    ///     sami::InstrumentSession::open(sami::simulated_transport(), Default::default()).await?;
    /// assert!(status.status.is_some());
    /// session.close().await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if the instrument does not answer the status probe.
    #[instrument(skip_all, level = "info")]
    pub async fn open(
        transport: Box<dyn Transport>,
        config: DriverConfig,
    ) -> Result<(Self, DeviceStatus)> {
        let (sink, events) = mpsc::unbounded_channel();
        let (handle, task) = Driver::new(transport, sink, config).spawn();
        let session = Self {
            handle,
            task,
            events: UnboundedReceiverStream::new(events),
        };

        match session.handle.execute(CapabilityRequest::Discover).await {
            Ok(CapabilityOutcome::Status { status }) => Ok((session, status)),
            Ok(other) => {
                session.close().await?;
                Err(anyhow::anyhow!("discovery returned {other:?}"))
            }
            Err(error) => {
                session.close().await?;
                Err(error.into())
            }
        }
    }

    /// Runs one capability on the driver task.
    ///
    /// # Errors
    ///
    /// Returns the driver's error for rejected or failed capabilities.
    pub async fn execute(&self, request: CapabilityRequest) -> Result<CapabilityOutcome> {
        Ok(self.handle.execute(request).await?)
    }

    #[must_use]
    pub fn handle(&self) -> &DriverHandle {
        &self.handle
    }

    /// Waits for the next published sample, skipping other notifications.
    ///
    /// Returns `None` once the driver has stopped.
    pub async fn next_sample(&mut self) -> Option<Sample> {
        (&mut self.events)
            .filter_map(|event| match event {
                DriverEvent::Sample { sample } => Some(sample),
                other => {
                    debug!(?other, "driver notification");
                    None
                }
            })
            .next()
            .await
    }

    /// Discards notifications that arrived so far.
    pub fn drain_events(&mut self) {
        while let Ok(event) = self.events.as_mut().try_recv() {
            debug!(?event, "discarding driver notification");
        }
    }

    /// Stops the driver task and waits for it to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver task panicked.
    pub async fn close(self) -> Result<()> {
        self.handle.shutdown();
        self.task.await?;
        Ok(())
    }
}

/// Options for one CLI run.
#[derive(Debug, Clone, Builder)]
pub struct RunOptions {
    #[builder(default)]
    driver_config: DriverConfig,
    #[builder(default = OutputFormat::Json)]
    output_format: OutputFormat,
    log_level: Option<LogLevel>,
    /// Colour pretty output and show progress spinners.
    #[builder(default)]
    interactive: bool,
}

/// Runs the CLI command against `transport`.
///
/// ```
/// # async fn run() -> anyhow::Result<()> {
/// use clap::Parser;
///
/// let args = sami::Args::try_parse_from(["sami", "--fake", "status"])?;
/// let (command, target) = args.into_command_and_target()?;
/// let transport = sami::connect(&target).await?;
/// let mut out = Vec::new();
/// sami::run(command, &mut out, transport, sami::RunOptions::builder().build()).await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, the instrument rejects
/// or fails a command, or output writing fails.
#[instrument(
    skip(out, transport, options),
    level = "info",
    fields(command = command.name(), output_format = ?options.output_format)
)]
pub async fn run<W>(
    command: Command,
    out: &mut W,
    transport: Box<dyn Transport>,
    options: RunOptions,
) -> Result<()>
where
    W: io::Write,
{
    let tracing_options = TracingOptions::builder()
        .interactive(options.interactive)
        .maybe_level(options.log_level.map(LogLevel::as_level_filter))
        .build();
    telemetry::initialise_tracing(&tracing_options)?;

    let RunOptions {
        driver_config,
        output_format,
        interactive,
        ..
    } = options;
    let pretty = output_format == OutputFormat::Pretty;
    let spinner = Spinner::new(interactive && pretty);
    let (mut session, status) = spinner
        .while_running(CapabilityId::Discover, || {
            InstrumentSession::open(transport, driver_config)
        })
        .await?;
    if interactive && pretty && io::stderr().is_terminal() {
        eprintln!("{} Instrument ready", "✓".green());
    }
    let painter = Painter::new(interactive);
    let output = Output {
        format: output_format,
        painter: &painter,
        spinner: &spinner,
    };

    let result = match command {
        Command::Discover => output.render(out, &CapabilityOutcome::Status { status }),
        Command::Status => {
            output
                .execute(&session, CapabilityRequest::AcquireStatus, out)
                .await
        }
        Command::Config => {
            output
                .execute(&session, CapabilityRequest::AcquireConfiguration, out)
                .await
        }
        Command::Sample => {
            output
                .execute(&session, CapabilityRequest::AcquireSample, out)
                .await
        }
        Command::Get(args) => {
            let request = CapabilityRequest::GetParams(args.ids().to_vec());
            output.execute(&session, request, out).await
        }
        Command::Set(args) => {
            let request = CapabilityRequest::SetParams(args.into_values());
            output.execute(&session, request, out).await
        }
        Command::ClockSync => {
            output
                .execute(&session, CapabilityRequest::ClockSync, out)
                .await
        }
        Command::Listen(args) => {
            crate::cli::listen::run(&mut session, &args, out, output_format, &painter).await
        }
    };

    session.drain_events();
    let close_result = session.close().await;
    if let Err(error) = close_result {
        if result.is_ok() {
            return Err(error);
        }
        tracing::trace!(?error, "failed to close instrument session cleanly");
    }
    result
}

/// Rendering settings shared by the single-shot commands.
struct Output<'a> {
    format: OutputFormat,
    painter: &'a Painter,
    spinner: &'a Spinner,
}

impl Output<'_> {
    async fn execute<W>(
        &self,
        session: &InstrumentSession,
        request: CapabilityRequest,
        out: &mut W,
    ) -> Result<()>
    where
        W: io::Write,
    {
        let outcome = self
            .spinner
            .while_running(request.capability(), || session.execute(request))
            .await?;
        self.render(out, &outcome)
    }

    fn render<W>(&self, out: &mut W, outcome: &CapabilityOutcome) -> Result<()>
    where
        W: io::Write,
    {
        match self.format {
            OutputFormat::Pretty => writeln!(out, "{}", OutcomeView::new(outcome, self.painter))?,
            OutputFormat::Json => write_json_line(out, outcome)?,
        }
        Ok(())
    }
}

pub(crate) fn write_json_line(out: &mut impl io::Write, value: &impl Serialize) -> Result<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

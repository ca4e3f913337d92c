use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::level_filters::LevelFilter;

use crate::cli::listen::ListenArgs;
use crate::cli::params::{GetArgs, SetArgs};
use crate::config::DriverConfig;
use crate::error::CliConfigError;

/// Command-line options for the SAMI instrument tool.
#[derive(Debug, Parser)]
#[command(name = "sami", about = "Drive a SAMI pCO2 instrument over a serial-to-TCP link.")]
pub struct Args {
    /// Talks to the built-in simulated instrument instead of real hardware.
    #[arg(long, global = true, conflicts_with = "address")]
    fake: bool,
    /// Instrument serial server address (e.g. `10.0.0.7:4001`).
    #[arg(long, global = true)]
    address: Option<String>,
    /// Period of the scheduled status acquisition (e.g. `30s`).
    #[arg(long, global = true, value_parser = parse_duration)]
    status_interval: Option<Duration>,
    /// Period of the scheduled clock synchronisation (e.g. `1h`).
    #[arg(long, global = true, value_parser = parse_duration)]
    clock_sync_interval: Option<Duration>,
    /// Overrides `RUST_LOG` for this run.
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,
    /// Output format; defaults to `pretty` on a terminal and `json` otherwise.
    #[arg(long, global = true, value_enum)]
    output: Option<OutputFormat>,
    #[command(subcommand)]
    command: Command,
}

impl Args {
    /// Creates argument values directly without CLI parsing.
    ///
    /// ```
    /// use sami::{Args, CliCommand, ListenArgs};
    ///
    /// let status = Args::new(CliCommand::Status).with_fake();
    /// let listen = Args::new(CliCommand::Listen(ListenArgs::new(Some(3))));
    /// let _ = (status, listen);
    /// ```
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            fake: false,
            address: None,
            status_interval: None,
            clock_sync_interval: None,
            log_level: None,
            output: None,
            command,
        }
    }

    /// Targets the simulated instrument.
    #[must_use]
    pub fn with_fake(mut self) -> Self {
        self.fake = true;
        self.address = None;
        self
    }

    /// Targets the instrument at `address`.
    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.fake = false;
        self.address = Some(address.into());
        self
    }

    #[must_use]
    pub fn log_level(&self) -> Option<LogLevel> {
        self.log_level
    }

    #[must_use]
    pub fn output_format(&self) -> Option<OutputFormat> {
        self.output
    }

    /// Driver settings derived from the scheduler flags.
    #[must_use]
    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig::builder()
            .maybe_auto_status_interval(self.status_interval)
            .maybe_clock_sync_interval(self.clock_sync_interval)
            .build()
    }

    /// Splits parsed CLI arguments into the command and its instrument target.
    ///
    /// # Errors
    ///
    /// Returns an error if neither `--fake` nor `--address` was given.
    pub fn into_command_and_target(self) -> anyhow::Result<(Command, Target)> {
        let Args {
            fake,
            address,
            command,
            ..
        } = self;

        let target = match (fake, address) {
            (true, _) => Target::Simulated,
            (false, Some(address)) => Target::Address(address),
            (false, None) => return Err(CliConfigError::MissingTarget.into()),
        };
        Ok((command, target))
    }
}

/// Where the CLI sends its commands.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Target {
    /// The in-process simulated instrument.
    Simulated,
    /// A serial server reachable over TCP.
    Address(String),
}

/// Supported CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Probe the instrument and print its status.
    Discover,
    /// Acquire one device-status record.
    Status,
    /// Fetch and print the full configuration.
    Config,
    /// Take one measurement and wait for its record.
    Sample,
    /// Print parameter values; all of them when no name is given.
    Get(GetArgs),
    /// Validate and upload `name=value` assignments.
    Set(SetArgs),
    /// Write the host clock into the instrument configuration.
    ClockSync,
    /// Enter autosample and print samples until the limit or Ctrl+C.
    Listen(ListenArgs),
}

impl Command {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Discover => "discover",
            Self::Status => "status",
            Self::Config => "config",
            Self::Sample => "sample",
            Self::Get(_args) => "get",
            Self::Set(_args) => "set",
            Self::ClockSync => "clock-sync",
            Self::Listen(_args) => "listen",
        }
    }
}

/// Log verbosity accepted by `--log-level`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    #[must_use]
    pub fn as_level_filter(self) -> LevelFilter {
        match self {
            Self::Off => LevelFilter::OFF,
            Self::Error => LevelFilter::ERROR,
            Self::Warn => LevelFilter::WARN,
            Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }
}

/// Output rendering selected by `--output`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Coloured tables.
    Pretty,
    /// One JSON document per result.
    Json,
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime::parse_duration(value).map_err(|error| error.to_string())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use clap::error::ErrorKind;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::params::ParameterId;

    #[test]
    fn fake_conflicts_with_address() {
        let result = Args::try_parse_from(["sami", "--fake", "--address", "host:1", "status"]);

        let error = result.expect_err("--fake and --address should conflict");
        assert_eq!(ErrorKind::ArgumentConflict, error.kind());
    }

    #[test]
    fn missing_target_is_rejected_after_parsing() {
        let args = Args::try_parse_from(["sami", "status"]).expect("status parses");

        let error = args
            .into_command_and_target()
            .expect_err("no target should be rejected");
        assert_matches!(
            error.downcast_ref::<CliConfigError>(),
            Some(CliConfigError::MissingTarget)
        );
    }

    #[test]
    fn scheduler_flags_feed_driver_config() {
        let args = Args::try_parse_from([
            "sami",
            "--fake",
            "--status-interval",
            "30s",
            "--clock-sync-interval",
            "1h",
            "status",
        ])
        .expect("valid arguments should parse");

        let config = args.driver_config();
        assert_eq!(Some(Duration::from_secs(30)), config.auto_status_interval());
        assert_eq!(Some(Duration::from_secs(3600)), config.clock_sync_interval());
    }

    #[test]
    fn address_target_is_resolved() {
        let args = Args::try_parse_from(["sami", "--address", "10.0.0.7:4001", "config"])
            .expect("valid arguments should parse");

        let (command, target) = args
            .into_command_and_target()
            .expect("address target should resolve");
        assert_matches!(command, Command::Config);
        assert_eq!(Target::Address("10.0.0.7:4001".to_string()), target);
    }

    #[test]
    fn get_parses_parameter_names() {
        let args = Args::try_parse_from([
            "sami",
            "--fake",
            "get",
            "timer_interval_1",
            "pump_pulse",
        ])
        .expect("known names should parse");

        let (command, _target) = args.into_command_and_target().expect("fake target");
        let Command::Get(get) = command else {
            panic!("expected get command");
        };
        assert_eq!(
            &[ParameterId::TimerInterval1, ParameterId::PumpPulse],
            get.ids()
        );
    }

    #[test]
    fn set_rejects_unknown_names_at_parse_time() {
        let result = Args::try_parse_from(["sami", "--fake", "set", "bogus=1"]);

        let error = result.expect_err("unknown parameter should fail parsing");
        assert_eq!(ErrorKind::ValueValidation, error.kind());
    }
}

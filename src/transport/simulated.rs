use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bon::Builder;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, instrument};

use super::Transport;
use crate::chunker::is_bare_config;
use crate::error::TransportError;
use crate::params::FACTORY_CONFIG;
use crate::protocol::TERMINATOR;

const FACTORY_CLOCK: u32 = 0x003F_91BE;
const UNIQUE_ID: u8 = 0x5B;
const AUTO_STATUS_PERIOD: Duration = Duration::from_secs(1);
const STATUS_CLOCK_ACTIVE: u16 = 0x0001;
/// Pump off, valve off, external power on.
const QUIESCENT_IMMEDIATE_STATUS: u8 = 0x04;
const ERROR_UNKNOWN_COMMAND: u8 = 0x01;
const ERROR_CONFIGURATION_INVALID: u8 = 0x06;

/// Commands the simulated instrument has received, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct CommandLog {
    lines: Arc<Mutex<Vec<String>>>,
}

impl CommandLog {
    /// Received command lines, terminators stripped.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    fn push(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}

/// In-process instrument that speaks the serial protocol.
///
/// Replies are split into chunks of at most `chunk_size` bytes to exercise
/// frame reassembly.
#[derive(Debug, Clone, Builder)]
pub struct SimulatedInstrument {
    #[builder(default = FACTORY_CONFIG.to_string(), into)]
    config: String,
    #[builder(default = FACTORY_CLOCK)]
    clock: u32,
    #[builder(default = 64)]
    chunk_size: usize,
    /// Free-running record period.
    sample_interval: Option<Duration>,
    /// Receive commands but never answer them.
    #[builder(default)]
    silent: bool,
    /// Command tokens answered with an error code instead of their reply.
    #[builder(default)]
    failing_commands: HashMap<String, u8>,
    /// Command tokens answered with a fixed line instead of their reply.
    #[builder(default)]
    garbled_replies: HashMap<String, String>,
    #[builder(default)]
    command_log: CommandLog,
}

impl SimulatedInstrument {
    /// Starts the instrument task and returns the host side of the link.
    #[must_use]
    pub fn spawn(self) -> SimulatedTransport {
        let (to_instrument, from_host) = mpsc::unbounded_channel();
        let (to_host, from_instrument) = mpsc::unbounded_channel();
        tokio::spawn(self.run(from_host, to_host));
        SimulatedTransport {
            outbound: to_instrument,
            inbound: from_instrument,
        }
    }

    #[instrument(skip_all, name = "simulated_instrument")]
    async fn run(
        mut self,
        mut from_host: mpsc::UnboundedReceiver<Vec<u8>>,
        to_host: mpsc::UnboundedSender<Vec<u8>>,
    ) {
        let started = Instant::now();
        let base_clock = self.clock;
        let mut session = Session {
            line: Vec::new(),
            awaiting_config: false,
            sequence: 0,
        };
        let mut status_ticks: Option<Interval> = None;
        let mut sample_ticks = self.sample_interval.map(periodic);

        loop {
            let elapsed = u32::try_from(started.elapsed().as_secs()).unwrap_or(u32::MAX);
            self.clock = base_clock.wrapping_add(elapsed);

            let outbound = tokio::select! {
                written = from_host.recv() => {
                    let Some(bytes) = written else {
                        debug!("host side closed");
                        break;
                    };
                    let mut replies = Vec::new();
                    for byte in bytes {
                        if byte == TERMINATOR {
                            let line = String::from_utf8_lossy(&session.line).into_owned();
                            session.line.clear();
                            replies.extend(self.handle_line(&line, &mut session, &mut status_ticks));
                        } else {
                            session.line.push(byte);
                        }
                    }
                    replies
                }
                () = next_tick(&mut status_ticks) => self.status_frame(),
                () = next_tick(&mut sample_ticks) => {
                    session.sequence = session.sequence.wrapping_add(1);
                    self.record_frame(session.sequence)
                }
            };

            if self.silent || outbound.is_empty() {
                continue;
            }
            for chunk in outbound.chunks(self.chunk_size.max(1)) {
                if to_host.send(chunk.to_vec()).is_err() {
                    return;
                }
            }
        }
    }

    fn handle_line(
        &mut self,
        line: &str,
        session: &mut Session,
        status_ticks: &mut Option<Interval>,
    ) -> Vec<u8> {
        self.command_log.push(line);

        if session.awaiting_config {
            session.awaiting_config = false;
            if !is_bare_config(line.as_bytes()) {
                return error_frame(ERROR_CONFIGURATION_INVALID);
            }
            self.config = line.to_ascii_uppercase();
            return prompt();
        }

        if let Some(code) = self.failing_commands.get(line) {
            return error_frame(*code);
        }
        if let Some(reply) = self.garbled_replies.get(line) {
            return terminated(reply.clone());
        }

        match line {
            "S" => self.status_frame(),
            "L" => terminated(self.config.clone()),
            "L5A" => {
                session.awaiting_config = true;
                Vec::new()
            }
            "R" => {
                session.sequence = session.sequence.wrapping_add(1);
                self.record_frame(session.sequence)
            }
            "I" => terminated(format!("!{QUIESCENT_IMMEDIATE_STATUS:02X}")),
            "F" => {
                *status_ticks = Some(periodic(AUTO_STATUS_PERIOD));
                prompt()
            }
            "F5A" => {
                *status_ticks = None;
                prompt()
            }
            "Q" => prompt(),
            "" => Vec::new(),
            _ => error_frame(ERROR_UNKNOWN_COMMAND),
        }
    }

    fn status_frame(&self) -> Vec<u8> {
        terminated(format!(
            ":{clock:08X}{STATUS_CLOCK_ACTIVE:04X}{records:06X}{errors:06X}{bytes:06X}{UNIQUE_ID:02X}",
            clock = self.clock,
            records = 0,
            errors = 0,
            bytes = 0,
        ))
    }

    fn record_frame(&self, sequence: u16) -> Vec<u8> {
        terminated(co2_record(self.clock, sequence))
    }
}

struct Session {
    line: Vec<u8>,
    awaiting_config: bool,
    sequence: u16,
}

/// Builds a checksummed CO2 record with fourteen light measurements.
fn co2_record(clock: u32, sequence: u16) -> String {
    let mut data: Vec<u8> = vec![0x27, 0x04];
    data.extend(clock.to_be_bytes());
    for index in 0..14u16 {
        let light = 0x0600_u16
            .wrapping_add(index.wrapping_mul(0x10))
            .wrapping_add(sequence);
        data.extend(light.to_be_bytes());
    }
    data.extend(0x0CDE_u16.to_be_bytes());
    data.extend(0x0FFF_u16.to_be_bytes());
    let checksum = data.iter().fold(0u8, |sum, byte| sum.wrapping_add(*byte));
    data.push(checksum);
    format!("*{UNIQUE_ID:02X}{}", hex::encode_upper(data))
}

fn terminated(text: String) -> Vec<u8> {
    let mut bytes = text.into_bytes();
    bytes.push(TERMINATOR);
    bytes
}

fn prompt() -> Vec<u8> {
    vec![TERMINATOR]
}

fn error_frame(code: u8) -> Vec<u8> {
    terminated(format!("?{code:02X}"))
}

fn periodic(period: Duration) -> Interval {
    let mut ticks = interval_at(Instant::now() + period, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticks
}

async fn next_tick(ticks: &mut Option<Interval>) {
    match ticks {
        Some(ticks) => {
            ticks.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Host side of a [`SimulatedInstrument`].
#[derive(Debug)]
pub struct SimulatedTransport {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    inbound: mpsc::UnboundedReceiver<Vec<u8>>,
}

#[async_trait]
impl Transport for SimulatedTransport {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.outbound.send(bytes.to_vec()).map_err(|_error| {
            TransportError::Io(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
        })
    }

    async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        Ok(self.inbound.recv().await)
    }
}

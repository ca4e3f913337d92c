use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::{Instant, timeout_at};
use tracing::{debug, instrument, warn};

use crate::chunker::{Chunker, FrameKind, RawFrame};
use crate::codec::{InstrumentError, decode_bare_config};
use crate::error::{CommandError, TransportError};
use crate::protocol::{Command, CommandKind, ExpectedReply};
use crate::transport::Transport;
use crate::utils::printable;

/// Successful reply to one command.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Reply {
    /// The frame registered as the command's reply.
    Frame(RawFrame),
    /// A bare line, for commands answered by a prompt.
    Prompt(String),
}

/// Issues one command at a time and waits for its reply.
///
/// Frames that arrive while a command waits for a different reply are kept
/// and handed out through [`CommandEngine::take_unsolicited`].
#[derive(Debug)]
pub struct CommandEngine<T> {
    transport: T,
    chunker: Chunker,
    unsolicited: VecDeque<RawFrame>,
    pending: Option<CommandKind>,
}

impl<T: Transport> CommandEngine<T> {
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            chunker: Chunker::new(),
            unsolicited: VecDeque::new(),
            pending: None,
        }
    }

    /// Command currently awaiting its reply.
    ///
    /// Only observable when an `execute` future was dropped before it
    /// finished.
    #[must_use]
    pub fn pending(&self) -> Option<CommandKind> {
        self.pending
    }

    /// Writes `command` and waits up to `timeout` for its reply.
    ///
    /// # Errors
    ///
    /// Returns an error on timeout, on an instrument error frame, on a
    /// reply that cannot be decoded, or when the transport fails.
    #[instrument(skip(self, command), level = "debug", fields(command = %command.kind()))]
    pub async fn execute(
        &mut self,
        command: &Command,
        timeout: Duration,
    ) -> Result<Reply, CommandError> {
        let kind = command.kind();
        if let Some(abandoned) = self.pending.replace(kind) {
            warn!(%abandoned, "previous command was abandoned without a reply");
        }
        while let Some(stale) = self.chunker.next_frame() {
            self.unsolicited.push_back(stale);
        }

        let wire = command.wire_bytes();
        debug!(wire = %printable(&wire), "sending command");
        let result = self.await_reply(command, &wire, timeout).await;
        self.pending = None;
        result
    }

    async fn await_reply(
        &mut self,
        command: &Command,
        wire: &[u8],
        timeout: Duration,
    ) -> Result<Reply, CommandError> {
        let kind = command.kind();
        self.transport
            .write(wire)
            .await
            .map_err(|source| CommandError::Transport {
                command: kind,
                source,
            })?;

        let deadline = Instant::now() + timeout;
        loop {
            while let Some(frame) = self.chunker.next_frame() {
                if let Some(reply) = self.classify(kind, command.expected_reply(), frame)? {
                    debug!("reply received");
                    return Ok(reply);
                }
            }

            match timeout_at(deadline, self.transport.recv()).await {
                Err(_elapsed) => {
                    return Err(CommandError::Timeout {
                        command: kind,
                        timeout,
                    });
                }
                Ok(Ok(Some(bytes))) => self.chunker.feed(&bytes),
                Ok(Ok(None)) => return Err(CommandError::TransportClosed { command: kind }),
                Ok(Err(source)) => {
                    return Err(CommandError::Transport {
                        command: kind,
                        source,
                    });
                }
            }
        }
    }

    fn classify(
        &mut self,
        command: CommandKind,
        expected: ExpectedReply,
        frame: RawFrame,
    ) -> Result<Option<Reply>, CommandError> {
        match (frame.kind(), expected) {
            (FrameKind::Error, _) => {
                let error = InstrumentError::decode(&frame)
                    .map_err(|source| CommandError::ProtocolViolation { command, source })?;
                Err(CommandError::Instrument {
                    command,
                    code: error.code(),
                })
            }
            (kind, ExpectedReply::Frame(wanted)) if kind == wanted => Ok(Some(Reply::Frame(frame))),
            (FrameKind::Prompt, ExpectedReply::Prompt) => Ok(Some(Reply::Prompt(
                String::from_utf8_lossy(frame.bytes()).into_owned(),
            ))),
            (FrameKind::Prompt, ExpectedReply::Frame(_)) if frame.bytes().is_empty() => Ok(None),
            (FrameKind::Prompt, ExpectedReply::Frame(FrameKind::Config)) => {
                decode_bare_config(frame.bytes())
                    .map_err(|source| CommandError::ProtocolViolation { command, source })?;
                debug!("accepted unframed configuration line");
                Ok(Some(Reply::Frame(RawFrame::new(
                    FrameKind::Config,
                    frame.bytes().to_vec(),
                ))))
            }
            (FrameKind::Prompt, ExpectedReply::Frame(_)) => Err(CommandError::UnexpectedPrompt {
                command,
                line: printable(frame.bytes()),
            }),
            _ => {
                debug!(kind = %frame.kind(), "keeping unsolicited frame");
                self.unsolicited.push_back(frame);
                Ok(None)
            }
        }
    }

    /// Frames received outside any command's reply, oldest first.
    pub fn take_unsolicited(&mut self) -> Vec<RawFrame> {
        self.unsolicited.drain(..).collect()
    }

    /// Waits for the next inbound frame while no command is outstanding.
    ///
    /// Returns `None` once the transport has closed. Dropping the future
    /// before it completes loses no data.
    ///
    /// # Errors
    ///
    /// Returns an error when the transport fails.
    pub async fn receive(&mut self) -> Result<Option<RawFrame>, TransportError> {
        loop {
            if let Some(frame) = self.unsolicited.pop_front() {
                return Ok(Some(frame));
            }
            if let Some(frame) = self.chunker.next_frame() {
                return Ok(Some(frame));
            }
            match self.transport.recv().await? {
                Some(bytes) => self.chunker.feed(&bytes),
                None => return Ok(None),
            }
        }
    }
}

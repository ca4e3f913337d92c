use std::collections::HashMap;
use std::sync::LazyLock;

use serde::Serialize;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

use crate::chunker::FrameKind;

/// Line terminator for inbound frames and outbound commands.
pub const TERMINATOR: u8 = b'\r';

/// Known instrument commands.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, Display, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    /// Replace the instrument configuration (`L5A`).
    #[strum(to_string = "set_configuration")]
    SetConfiguration,
    /// Dump the instrument configuration (`L`).
    #[strum(to_string = "get_configuration")]
    GetConfiguration,
    /// Report pump/valve/power state (`I`).
    #[strum(to_string = "immediate_status")]
    ImmediateStatus,
    /// End the command session (`Q`).
    #[strum(to_string = "quit")]
    Quit,
    /// Take one sample now (`R`).
    #[strum(to_string = "take_sample")]
    TakeSample,
    /// Report clock and status word (`S`).
    #[strum(to_string = "device_status")]
    DeviceStatus,
    /// Emit status once per second (`F`).
    #[strum(to_string = "auto_status_on")]
    AutoStatusOn,
    /// Stop periodic status output (`F5A`).
    #[strum(to_string = "auto_status_off")]
    AutoStatusOff,
}

/// Reply the instrument produces for one command.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ExpectedReply {
    /// A frame of the given kind.
    Frame(FrameKind),
    /// A bare terminated line.
    Prompt,
}

/// Wire metadata for one command.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) struct CommandMetadata {
    token: &'static str,
    reply: ExpectedReply,
}

impl CommandMetadata {
    /// ASCII command token, terminator excluded.
    pub(crate) fn token(self) -> &'static str {
        self.token
    }

    /// Reply shape awaited after the command.
    pub(crate) fn reply(self) -> ExpectedReply {
        self.reply
    }
}

/// Command metadata keyed by command kind.
pub(crate) static COMMANDS_BY_KIND: LazyLock<HashMap<CommandKind, CommandMetadata>> =
    LazyLock::new(|| {
        CommandKind::iter()
            .map(|kind| (kind, metadata_for(kind)))
            .collect()
    });

/// Returns metadata for one command.
pub(crate) fn command_metadata(kind: CommandKind) -> CommandMetadata {
    *COMMANDS_BY_KIND
        .get(&kind)
        .unwrap_or(&metadata_for(kind))
}

fn metadata_for(kind: CommandKind) -> CommandMetadata {
    match kind {
        CommandKind::SetConfiguration => CommandMetadata {
            token: "L5A",
            reply: ExpectedReply::Prompt,
        },
        CommandKind::GetConfiguration => CommandMetadata {
            token: "L",
            reply: ExpectedReply::Frame(FrameKind::Config),
        },
        CommandKind::ImmediateStatus => CommandMetadata {
            token: "I",
            reply: ExpectedReply::Frame(FrameKind::ImmediateStatus),
        },
        CommandKind::Quit => CommandMetadata {
            token: "Q",
            reply: ExpectedReply::Prompt,
        },
        CommandKind::TakeSample => CommandMetadata {
            token: "R",
            reply: ExpectedReply::Frame(FrameKind::Record),
        },
        CommandKind::DeviceStatus => CommandMetadata {
            token: "S",
            reply: ExpectedReply::Frame(FrameKind::DeviceStatus),
        },
        CommandKind::AutoStatusOn => CommandMetadata {
            token: "F",
            reply: ExpectedReply::Prompt,
        },
        CommandKind::AutoStatusOff => CommandMetadata {
            token: "F5A",
            reply: ExpectedReply::Prompt,
        },
    }
}

/// One outbound command, with its payload where the command carries one.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Command {
    /// `L5A` followed by a full configuration line.
    SetConfiguration(String),
    GetConfiguration,
    ImmediateStatus,
    Quit,
    TakeSample,
    DeviceStatus,
    AutoStatusOn,
    AutoStatusOff,
}

impl Command {
    /// Returns the payload-free command kind.
    #[must_use]
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::SetConfiguration(_) => CommandKind::SetConfiguration,
            Self::GetConfiguration => CommandKind::GetConfiguration,
            Self::ImmediateStatus => CommandKind::ImmediateStatus,
            Self::Quit => CommandKind::Quit,
            Self::TakeSample => CommandKind::TakeSample,
            Self::DeviceStatus => CommandKind::DeviceStatus,
            Self::AutoStatusOn => CommandKind::AutoStatusOn,
            Self::AutoStatusOff => CommandKind::AutoStatusOff,
        }
    }

    /// Returns the ASCII token that starts the command.
    ///
    /// ```
    /// use sami::Command;
    ///
    /// assert_eq!("S", Command::DeviceStatus.token());
    /// assert_eq!("F5A", Command::AutoStatusOff.token());
    /// ```
    #[must_use]
    pub fn token(&self) -> &'static str {
        command_metadata(self.kind()).token()
    }

    /// Returns the reply shape the command waits for.
    #[must_use]
    pub fn expected_reply(&self) -> ExpectedReply {
        command_metadata(self.kind()).reply()
    }

    /// Encodes the command as written to the transport.
    ///
    /// ```
    /// use sami::Command;
    ///
    /// assert_eq!(b"L\r".to_vec(), Command::GetConfiguration.wire_bytes());
    /// assert_eq!(
    ///     b"L5A\rC000\r".to_vec(),
    ///     Command::SetConfiguration("C000".to_string()).wire_bytes()
    /// );
    /// ```
    #[must_use]
    pub fn wire_bytes(&self) -> Vec<u8> {
        let mut wire = self.token().as_bytes().to_vec();
        wire.push(TERMINATOR);
        if let Self::SetConfiguration(frame) = self {
            wire.extend_from_slice(frame.as_bytes());
            wire.push(TERMINATOR);
        }
        wire
    }
}

use std::fmt;

use serde::Serialize;

use super::FrameDecodeError;
use super::fields::{frame_text, hex_u8, sigil_body};
use crate::chunker::{FrameKind, RawFrame};

/// Error code reported in a `?` frame.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentErrorCode {
    CommandNotRecognized,
    CommandLineTooLong,
    CommandAborted,
    ValueOutOfRange,
    InstrumentBusy,
    ConfigurationInvalid,
    Unknown(u8),
}

impl InstrumentErrorCode {
    #[must_use]
    pub fn from_raw(code: u8) -> Self {
        match code {
            0x01 => Self::CommandNotRecognized,
            0x02 => Self::CommandLineTooLong,
            0x03 => Self::CommandAborted,
            0x04 => Self::ValueOutOfRange,
            0x05 => Self::InstrumentBusy,
            0x06 => Self::ConfigurationInvalid,
            other => Self::Unknown(other),
        }
    }

    #[must_use]
    pub fn raw(self) -> u8 {
        match self {
            Self::CommandNotRecognized => 0x01,
            Self::CommandLineTooLong => 0x02,
            Self::CommandAborted => 0x03,
            Self::ValueOutOfRange => 0x04,
            Self::InstrumentBusy => 0x05,
            Self::ConfigurationInvalid => 0x06,
            Self::Unknown(code) => code,
        }
    }

    /// Human-readable description.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::CommandNotRecognized => "command not recognized",
            Self::CommandLineTooLong => "command line too long",
            Self::CommandAborted => "command aborted",
            Self::ValueOutOfRange => "value out of range",
            Self::InstrumentBusy => "instrument busy",
            Self::ConfigurationInvalid => "configuration invalid",
            Self::Unknown(_) => "unknown error",
        }
    }
}

impl fmt::Display for InstrumentErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X} ({})", self.raw(), self.description())
    }
}

/// Decoded `?` error frame.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct InstrumentError {
    code: InstrumentErrorCode,
}

impl InstrumentError {
    #[must_use]
    pub fn new(code: InstrumentErrorCode) -> Self {
        Self { code }
    }

    #[must_use]
    pub fn code(&self) -> InstrumentErrorCode {
        self.code
    }

    /// Decodes an Error frame.
    ///
    /// # Errors
    ///
    /// Returns an error when the body is not two hex digits.
    pub fn decode(frame: &RawFrame) -> Result<Self, FrameDecodeError> {
        let text = frame_text(frame, FrameKind::Error)?;
        let body = sigil_body(text, FrameKind::Error, &[2])?;
        let code = hex_u8(body, "error_code", 0)?;
        Ok(Self::new(InstrumentErrorCode::from_raw(code)))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("?01", InstrumentErrorCode::CommandNotRecognized)]
    #[case("?05", InstrumentErrorCode::InstrumentBusy)]
    #[case("?2A", InstrumentErrorCode::Unknown(0x2A))]
    fn codes_decode(#[case] text: &str, #[case] expected: InstrumentErrorCode) {
        let frame = RawFrame::new(FrameKind::Error, text.as_bytes().to_vec());
        assert_eq!(expected, InstrumentError::decode(&frame).expect("decodes").code());
    }

    #[test]
    fn display_includes_code_and_description() {
        assert_eq!(
            "0x04 (value out of range)",
            InstrumentErrorCode::ValueOutOfRange.to_string()
        );
    }
}

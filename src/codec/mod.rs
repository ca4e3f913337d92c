mod config;
pub(crate) mod fields;
mod immediate;
mod instrument_error;
mod record;
mod sami_time;
mod status;

use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use crate::chunker::{FrameKind, RawFrame};

pub use self::config::{ConfigEncoder, InstrumentConfig};
pub use self::immediate::{ImmediateFlags, ImmediateStatus};
pub use self::instrument_error::{InstrumentError, InstrumentErrorCode};
pub use self::record::{RecordType, SampleRecord};
pub use self::sami_time::{SAMI_EPOCH_OFFSET_SECONDS, sami_seconds_from_utc, sami_seconds_to_utc};
pub use self::status::{DeviceCounters, DeviceStatus, ExternalDeviceFaults, StatusFlags};
pub(crate) use self::config::decode_bare_config;

/// Errors returned when a frame cannot be decoded.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum FrameDecodeError {
    #[error("expected a {expected} frame, got {actual}")]
    UnexpectedKind {
        expected: FrameKind,
        actual: FrameKind,
    },
    #[error("{kind} frame carries {actual} characters, expected {expected}")]
    LengthMismatch {
        kind: FrameKind,
        expected: usize,
        actual: usize,
    },
    #[error("field `{field}` at offset {offset} is not valid hexadecimal")]
    MalformedField { field: &'static str, offset: usize },
    #[error("{kind} frame is not ASCII text")]
    NonAscii { kind: FrameKind },
}

/// A decoded inbound frame.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecodedFrame {
    Record(SampleRecord),
    DeviceStatus(DeviceStatus),
    Config(InstrumentConfig),
    ImmediateStatus(ImmediateStatus),
    Error(InstrumentError),
    /// A bare line, carried verbatim.
    Prompt { text: String },
}

/// Decoders for every frame kind the chunker emits.
pub struct FrameCodec;

impl FrameCodec {
    /// Decodes `frame` according to its kind.
    ///
    /// # Errors
    ///
    /// Returns an error when a field is not hexadecimal or the frame length
    /// disagrees with its declared layout.
    ///
    /// ```
    /// use sami::{DecodedFrame, FrameCodec, FrameKind, RawFrame};
    ///
    /// let frame = RawFrame::new(FrameKind::Error, b"?04".to_vec());
    /// let DecodedFrame::Error(error) = FrameCodec::decode(&frame)? else {
    ///     panic!("expected an error frame");
    /// };
    /// assert_eq!(4, error.code().raw());
    /// # Ok::<(), sami::FrameDecodeError>(())
    /// ```
    #[instrument(skip_all, level = "trace", fields(kind = %frame.kind()))]
    pub fn decode(frame: &RawFrame) -> Result<DecodedFrame, FrameDecodeError> {
        match frame.kind() {
            FrameKind::Record => SampleRecord::decode(frame).map(DecodedFrame::Record),
            FrameKind::DeviceStatus => DeviceStatus::decode(frame).map(DecodedFrame::DeviceStatus),
            FrameKind::Config => InstrumentConfig::decode(frame).map(DecodedFrame::Config),
            FrameKind::ImmediateStatus => {
                ImmediateStatus::decode(frame).map(DecodedFrame::ImmediateStatus)
            }
            FrameKind::Error => InstrumentError::decode(frame).map(DecodedFrame::Error),
            FrameKind::Prompt => Ok(DecodedFrame::Prompt {
                text: fields::frame_text(frame, FrameKind::Prompt)?.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::test_fixtures::{CONFIG_FRAME, RECORD_FRAME, STATUS_FRAME};

    #[test]
    fn decode_dispatches_on_frame_kind() {
        let cases = [
            (FrameKind::Record, RECORD_FRAME),
            (FrameKind::DeviceStatus, STATUS_FRAME),
            (FrameKind::Config, CONFIG_FRAME),
            (FrameKind::ImmediateStatus, "!01"),
            (FrameKind::Error, "?01"),
            (FrameKind::Prompt, "ok"),
        ];
        for (kind, text) in cases {
            let decoded = FrameCodec::decode(&RawFrame::new(kind, text.as_bytes().to_vec()))
                .expect("fixture decodes");
            match kind {
                FrameKind::Record => assert_matches!(decoded, DecodedFrame::Record(_)),
                FrameKind::DeviceStatus => assert_matches!(decoded, DecodedFrame::DeviceStatus(_)),
                FrameKind::Config => assert_matches!(decoded, DecodedFrame::Config(_)),
                FrameKind::ImmediateStatus => {
                    assert_matches!(decoded, DecodedFrame::ImmediateStatus(_));
                }
                FrameKind::Error => assert_matches!(decoded, DecodedFrame::Error(_)),
                FrameKind::Prompt => assert_matches!(decoded, DecodedFrame::Prompt { .. }),
            }
        }
    }

    #[test]
    fn non_ascii_prompt_is_rejected() {
        let frame = RawFrame::new(FrameKind::Prompt, vec![0xC3, 0xA9]);
        assert_matches!(
            FrameCodec::decode(&frame),
            Err(FrameDecodeError::NonAscii {
                kind: FrameKind::Prompt
            })
        );
    }
}

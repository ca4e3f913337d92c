use std::fmt;

use serde::Serialize;
use serde_with::SerializeDisplay;
use time::OffsetDateTime;
use tracing::warn;

use super::FrameDecodeError;
use super::fields::{frame_text, hex_u8, hex_u16, hex_u32};
use super::sami_time::sami_seconds_to_utc;
use crate::chunker::{FrameKind, RawFrame};

const UNIQUE_ID_OFFSET: usize = 0;
const LENGTH_OFFSET: usize = 2;
const TYPE_OFFSET: usize = 4;
const TIME_OFFSET: usize = 6;
const MEASUREMENTS_OFFSET: usize = 14;
/// Length byte, type, time (4), battery (2), thermistor (2) and checksum.
const DATA_RECORD_OVERHEAD: u8 = 11;
/// Length byte, type, time (4) and checksum.
const CONTROL_RECORD_MIN: u8 = 7;

/// Record type byte.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, SerializeDisplay)]
pub enum RecordType {
    Co2,
    Blank,
    Ph,
    /// Any other measurement type below `0x80`.
    Data(u8),
    Launch,
    Start,
    Shutdown,
    RtsEnable,
    /// Any other control type at or above `0x80`.
    Control(u8),
}

impl RecordType {
    /// Classifies a wire type byte.
    ///
    /// ```
    /// use sami::RecordType;
    ///
    /// assert_eq!(RecordType::Co2, RecordType::from_byte(0x04));
    /// assert_eq!(RecordType::Control(0x90), RecordType::from_byte(0x90));
    /// assert!(RecordType::from_byte(0x80).is_control());
    /// ```
    #[must_use]
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x04 => Self::Co2,
            0x05 => Self::Blank,
            0x0A => Self::Ph,
            0x80 => Self::Launch,
            0x81 => Self::Start,
            0x83 => Self::Shutdown,
            0x85 => Self::RtsEnable,
            0x80..=0xFF => Self::Control(byte),
            _ => Self::Data(byte),
        }
    }

    /// Wire type byte.
    #[must_use]
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Co2 => 0x04,
            Self::Blank => 0x05,
            Self::Ph => 0x0A,
            Self::Launch => 0x80,
            Self::Start => 0x81,
            Self::Shutdown => 0x83,
            Self::RtsEnable => 0x85,
            Self::Data(byte) | Self::Control(byte) => byte,
        }
    }

    /// Control records carry no measurement payload.
    #[must_use]
    pub fn is_control(self) -> bool {
        self.as_byte() >= 0x80
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Co2 => f.write_str("co2"),
            Self::Blank => f.write_str("blank"),
            Self::Ph => f.write_str("ph"),
            Self::Data(byte) => write!(f, "data(0x{byte:02X})"),
            Self::Launch => f.write_str("launch"),
            Self::Start => f.write_str("start"),
            Self::Shutdown => f.write_str("shutdown"),
            Self::RtsEnable => f.write_str("rts_enable"),
            Self::Control(byte) => write!(f, "control(0x{byte:02X})"),
        }
    }
}

/// One decoded `*` record.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct SampleRecord {
    pub unique_id: u8,
    pub record_length: u8,
    pub record_type: RecordType,
    /// Seconds since 1904-01-01T00:00:00Z.
    pub record_time: u32,
    pub light_measurements: Vec<u16>,
    pub voltage_battery: u16,
    pub thermistor_raw: u16,
    pub checksum: u8,
    pub checksum_valid: bool,
}

impl SampleRecord {
    /// Decodes a Record frame.
    ///
    /// A checksum mismatch is logged and flagged in `checksum_valid`; it does
    /// not fail the decode.
    ///
    /// # Errors
    ///
    /// Returns an error when the body length disagrees with the declared
    /// record length or a field is not hexadecimal.
    pub fn decode(frame: &RawFrame) -> Result<Self, FrameDecodeError> {
        let text = frame_text(frame, FrameKind::Record)?;
        let body = text.get(1..).unwrap_or_default();

        let unique_id = hex_u8(body, "unique_id", UNIQUE_ID_OFFSET)?;
        let record_length = hex_u8(body, "record_length", LENGTH_OFFSET)?;
        let expected = 2 + 2 * usize::from(record_length);
        if body.len() != expected {
            return Err(FrameDecodeError::LengthMismatch {
                kind: FrameKind::Record,
                expected,
                actual: body.len(),
            });
        }

        let record_type = RecordType::from_byte(hex_u8(body, "record_type", TYPE_OFFSET)?);
        let minimum = if record_type.is_control() {
            CONTROL_RECORD_MIN
        } else {
            DATA_RECORD_OVERHEAD
        };
        if record_length < minimum {
            return Err(FrameDecodeError::LengthMismatch {
                kind: FrameKind::Record,
                expected: 2 + 2 * usize::from(minimum),
                actual: body.len(),
            });
        }

        let record_time = hex_u32(body, "record_time", TIME_OFFSET, 8)?;
        let checksum_offset = expected - 2;
        let checksum = hex_u8(body, "checksum", checksum_offset)?;

        let (light_measurements, voltage_battery, thermistor_raw) = if record_type.is_control() {
            (Vec::new(), 0, 0)
        } else {
            let count = usize::from((record_length - DATA_RECORD_OVERHEAD) / 2);
            let light_measurements = (0..count)
                .map(|index| hex_u16(body, "light_measurements", MEASUREMENTS_OFFSET + 4 * index))
                .collect::<Result<Vec<u16>, _>>()?;
            let battery_offset = checksum_offset - 8;
            (
                light_measurements,
                hex_u16(body, "voltage_battery", battery_offset)?,
                hex_u16(body, "thermistor_raw", battery_offset + 4)?,
            )
        };

        let computed = checksum_over(body, LENGTH_OFFSET, checksum_offset)?;
        let checksum_valid = computed == checksum;
        if !checksum_valid {
            warn!(
                unique_id,
                record_type = %record_type,
                expected = format_args!("0x{checksum:02X}"),
                computed = format_args!("0x{computed:02X}"),
                "record checksum mismatch"
            );
        }

        Ok(Self {
            unique_id,
            record_length,
            record_type,
            record_time,
            light_measurements,
            voltage_battery,
            thermistor_raw,
            checksum,
            checksum_valid,
        })
    }

    /// Record time as a UTC timestamp.
    #[must_use]
    pub fn recorded_at(&self) -> OffsetDateTime {
        sami_seconds_to_utc(self.record_time)
    }
}

/// Sums the bytes in `body[start..end]`, modulo 256.
fn checksum_over(body: &str, start: usize, end: usize) -> Result<u8, FrameDecodeError> {
    (start..end).step_by(2).try_fold(0u8, |sum, offset| {
        hex_u8(body, "checksum", offset).map(|byte| sum.wrapping_add(byte))
    })
}

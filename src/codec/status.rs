use serde::Serialize;
use time::OffsetDateTime;

use super::FrameDecodeError;
use super::fields::{frame_text, hex_u8, hex_u16, hex_u32, sigil_body};
use super::sami_time::sami_seconds_to_utc;
use crate::chunker::{FrameKind, RawFrame};

const TIME_ONLY_LEN: usize = 8;
const WITH_STATUS_LEN: usize = 12;
const FULL_LEN: usize = 32;

/// Decoded `:` device status.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct DeviceStatus {
    /// Instrument clock, seconds since 1904-01-01T00:00:00Z.
    pub time_offset: u32,
    pub status: Option<StatusFlags>,
    pub counters: Option<DeviceCounters>,
}

/// Record and memory counters carried by the full status form.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct DeviceCounters {
    pub data_records: u32,
    pub error_count: u32,
    pub bytes_stored: u32,
    pub unique_id: u8,
}

/// Status word bits.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct StatusFlags {
    pub raw: u16,
    pub clock_active: bool,
    pub recording_active: bool,
    pub record_end_on_time: bool,
    pub record_memory_full: bool,
    pub record_end_on_error: bool,
    pub data_download_ok: bool,
    pub flash_memory_open: bool,
    pub battery_error_fatal: bool,
    pub battery_low_measurement: bool,
    pub battery_low_blank: bool,
    pub battery_low_external: bool,
    pub external_device_faults: ExternalDeviceFaults,
    pub flash_erased: bool,
    pub power_on_invalid: bool,
}

/// Fault bits for the three external device ports.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, Serialize)]
pub struct ExternalDeviceFaults {
    pub device_1: bool,
    pub device_2: bool,
    pub device_3: bool,
}

impl ExternalDeviceFaults {
    /// Whether no external device reports a fault.
    #[must_use]
    pub fn is_empty(self) -> bool {
        !(self.device_1 || self.device_2 || self.device_3)
    }
}

impl StatusFlags {
    /// Expands a raw status word.
    ///
    /// ```
    /// use sami::StatusFlags;
    ///
    /// let flags = StatusFlags::from_word(0x1001);
    /// assert!(flags.clock_active);
    /// assert!(flags.external_device_faults.device_2);
    /// assert!(!flags.recording_active);
    /// ```
    #[must_use]
    pub fn from_word(raw: u16) -> Self {
        let bit = |mask: u16| raw & mask != 0;
        Self {
            raw,
            clock_active: bit(0x0001),
            recording_active: bit(0x0002),
            record_end_on_time: bit(0x0004),
            record_memory_full: bit(0x0008),
            record_end_on_error: bit(0x0010),
            data_download_ok: bit(0x0020),
            flash_memory_open: bit(0x0040),
            battery_error_fatal: bit(0x0080),
            battery_low_measurement: bit(0x0100),
            battery_low_blank: bit(0x0200),
            battery_low_external: bit(0x0400),
            external_device_faults: ExternalDeviceFaults {
                device_1: bit(0x0800),
                device_2: bit(0x1000),
                device_3: bit(0x2000),
            },
            flash_erased: bit(0x4000),
            power_on_invalid: bit(0x8000),
        }
    }
}

impl DeviceStatus {
    /// Decodes a DeviceStatus frame in any of its three lengths.
    ///
    /// # Errors
    ///
    /// Returns an error for other body lengths or non-hex fields.
    pub fn decode(frame: &RawFrame) -> Result<Self, FrameDecodeError> {
        let text = frame_text(frame, FrameKind::DeviceStatus)?;
        let body = sigil_body(
            text,
            FrameKind::DeviceStatus,
            &[TIME_ONLY_LEN, WITH_STATUS_LEN, FULL_LEN],
        )?;

        let time_offset = hex_u32(body, "time_offset", 0, 8)?;
        let status = if body.len() >= WITH_STATUS_LEN {
            Some(StatusFlags::from_word(hex_u16(body, "status", 8)?))
        } else {
            None
        };
        let counters = if body.len() == FULL_LEN {
            Some(DeviceCounters {
                data_records: hex_u32(body, "data_records", 12, 6)?,
                error_count: hex_u32(body, "error_count", 18, 6)?,
                bytes_stored: hex_u32(body, "bytes_stored", 24, 6)?,
                unique_id: hex_u8(body, "unique_id", 30)?,
            })
        } else {
            None
        };

        Ok(Self {
            time_offset,
            status,
            counters,
        })
    }

    /// Instrument clock as a UTC timestamp.
    #[must_use]
    pub fn instrument_time(&self) -> OffsetDateTime {
        sami_seconds_to_utc(self.time_offset)
    }
}

use serde::Serialize;

use super::FrameDecodeError;
use super::fields::{frame_text, hex_u8, sigil_body};
use crate::chunker::{FrameKind, RawFrame};

/// Decoded `!` reply to the immediate status command.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct ImmediateStatus {
    pub raw: u8,
    pub flags: ImmediateFlags,
}

/// Pump, valve and power state bits.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct ImmediateFlags {
    pub pump_on: bool,
    pub valve_on: bool,
    pub external_power_on: bool,
    pub debug_led: bool,
    pub debug_echo: bool,
}

impl ImmediateStatus {
    /// Decodes an ImmediateStatus frame.
    ///
    /// # Errors
    ///
    /// Returns an error when the body is not two hex digits.
    ///
    /// ```
    /// use sami::{FrameKind, ImmediateStatus, RawFrame};
    ///
    /// let status = ImmediateStatus::decode(&RawFrame::new(FrameKind::ImmediateStatus, b"!05".to_vec()))?;
    /// assert!(status.flags.pump_on);
    /// assert!(status.flags.external_power_on);
    /// assert!(!status.flags.valve_on);
    /// # Ok::<(), sami::FrameDecodeError>(())
    /// ```
    pub fn decode(frame: &RawFrame) -> Result<Self, FrameDecodeError> {
        let text = frame_text(frame, FrameKind::ImmediateStatus)?;
        let body = sigil_body(text, FrameKind::ImmediateStatus, &[2])?;
        let raw = hex_u8(body, "immediate_status", 0)?;
        let bit = |mask: u8| raw & mask != 0;
        Ok(Self {
            raw,
            flags: ImmediateFlags {
                pump_on: bit(0x01),
                valve_on: bit(0x02),
                external_power_on: bit(0x04),
                debug_led: bit(0x08),
                debug_echo: bit(0x10),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn all_bits_set() {
        let frame = RawFrame::new(FrameKind::ImmediateStatus, b"!1F".to_vec());
        let flags = ImmediateStatus::decode(&frame).expect("decodes").flags;
        assert!(flags.pump_on && flags.valve_on && flags.external_power_on);
        assert!(flags.debug_led && flags.debug_echo);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let frame = RawFrame::new(FrameKind::ImmediateStatus, b"!1".to_vec());
        assert_matches!(
            ImmediateStatus::decode(&frame),
            Err(FrameDecodeError::LengthMismatch { .. })
        );
    }
}

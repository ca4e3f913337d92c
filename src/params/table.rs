use std::sync::LazyLock;

use strum::IntoEnumIterator;

use super::{ParameterError, ParameterId, Value, ValueKind};
use crate::codec::FrameDecodeError;
use crate::codec::fields::{hex_slice, hex_u32};

/// Where a parameter lives inside the configuration frame.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum Layout {
    /// `width` hex characters at character `offset`.
    Field { offset: usize, width: usize },
    /// One bit of the byte whose two hex characters start at `offset`.
    Bit {
        offset: usize,
        mask: u8,
        inverted: bool,
    },
    /// The bits of `mask` in the byte at `offset`, read as an integer.
    Masked { offset: usize, mask: u8 },
}

/// Registry metadata for one parameter.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ParameterEntry {
    id: ParameterId,
    layout: Layout,
    kind: ValueKind,
    default: Value,
    read_only: bool,
}

impl ParameterEntry {
    #[must_use]
    pub fn id(&self) -> ParameterId {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Value reported before any configuration has been decoded.
    #[must_use]
    pub fn default_value(&self) -> &Value {
        &self.default
    }

    /// Host writes are rejected; only clock synchronisation writes these.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Largest integer the field can hold.
    #[must_use]
    pub fn max(&self) -> Option<u32> {
        match (self.kind, self.layout) {
            (ValueKind::Int, Layout::Field { width, .. }) => {
                Some(u32::MAX >> (32 - 4 * width.min(8)))
            }
            (ValueKind::Int, Layout::Masked { mask, .. }) => Some(u32::from(mask)),
            _ => None,
        }
    }

    pub(crate) fn layout(&self) -> Layout {
        self.layout
    }

    /// Checks that `value` is the declared type and fits the field.
    pub(crate) fn validate(&self, value: &Value) -> Result<(), ParameterError> {
        match (self.kind, value) {
            (ValueKind::Int, Value::Int(int)) => match (self.layout, self.max()) {
                (Layout::Masked { mask, .. }, _) if *int & !u32::from(mask) != 0 => {
                    Err(ParameterError::OutsideMask {
                        id: self.id,
                        value: *int,
                        mask,
                    })
                }
                (_, Some(max)) if *int > max => Err(ParameterError::OutOfRange {
                    id: self.id,
                    value: *int,
                    max,
                }),
                _ => Ok(()),
            },
            (ValueKind::Bool, Value::Bool(_)) => Ok(()),
            (ValueKind::Text, Value::Text(text)) => {
                let Layout::Field { width, .. } = self.layout else {
                    return Ok(());
                };
                if text.len() == width && hex_slice(text, 0, width).is_some() {
                    Ok(())
                } else {
                    Err(ParameterError::InvalidText { id: self.id, width })
                }
            }
            (expected, actual) => Err(ParameterError::WrongType {
                id: self.id,
                expected,
                actual: actual.kind(),
            }),
        }
    }

    /// Reads this parameter out of a full configuration text.
    pub(crate) fn read(&self, text: &str) -> Result<Value, FrameDecodeError> {
        let field: &'static str = self.id.into();
        match self.layout {
            Layout::Field { offset, width } => match self.kind {
                ValueKind::Text => hex_slice(text, offset, width)
                    .map(|digits| Value::Text(digits.to_ascii_uppercase()))
                    .ok_or(FrameDecodeError::MalformedField { field, offset }),
                _ => hex_u32(text, field, offset, width).map(Value::Int),
            },
            Layout::Bit {
                offset,
                mask,
                inverted,
            } => {
                let byte = hex_u32(text, field, offset, 2)?;
                let set = byte & u32::from(mask) != 0;
                Ok(Value::Bool(set != inverted))
            }
            Layout::Masked { offset, mask } => {
                let byte = hex_u32(text, field, offset, 2)?;
                Ok(Value::Int(byte & u32::from(mask)))
            }
        }
    }

    /// Validates `value` and writes it into `text` in place.
    ///
    /// Bit and masked parameters rewrite only their own bits of the shared
    /// byte.
    pub(crate) fn splice(&self, text: &mut String, value: &Value) -> Result<(), ParameterError> {
        self.validate(value)?;
        match (self.layout, value) {
            (Layout::Field { offset, width }, Value::Int(int)) => {
                text.replace_range(offset..offset + width, &format!("{int:0width$X}"));
            }
            (Layout::Field { offset, width }, Value::Text(hex)) => {
                text.replace_range(offset..offset + width, &hex.to_ascii_uppercase());
            }
            (
                Layout::Bit {
                    offset,
                    mask,
                    inverted,
                },
                Value::Bool(enabled),
            ) => {
                let current = shared_byte(text, offset);
                let updated = if *enabled != inverted {
                    current | mask
                } else {
                    current & !mask
                };
                text.replace_range(offset..offset + 2, &format!("{updated:02X}"));
            }
            (Layout::Masked { offset, mask }, Value::Int(bits)) => {
                let bits = u8::try_from(*bits & u32::from(mask)).unwrap_or_default();
                let updated = (shared_byte(text, offset) & !mask) | bits;
                text.replace_range(offset..offset + 2, &format!("{updated:02X}"));
            }
            (_, other) => {
                return Err(ParameterError::WrongType {
                    id: self.id,
                    expected: self.kind,
                    actual: other.kind(),
                });
            }
        }
        Ok(())
    }
}

fn shared_byte(text: &str, offset: usize) -> u8 {
    hex_slice(text, offset, 2)
        .and_then(|digits| u8::from_str_radix(digits, 16).ok())
        .unwrap_or_default()
}

static PARAMETERS: LazyLock<Vec<ParameterEntry>> =
    LazyLock::new(|| ParameterId::iter().map(entry_for).collect());

/// Registry entry for `id`.
#[must_use]
pub fn entry(id: ParameterId) -> &'static ParameterEntry {
    &PARAMETERS[id as usize]
}

/// Every registry entry, in layout order.
pub fn entries() -> impl Iterator<Item = &'static ParameterEntry> {
    PARAMETERS.iter()
}

const MODE_OFFSET: usize = 24;
const GLOBAL_OFFSET: usize = 76;
const BIT_SWITCHES_OFFSET: usize = 92;

const SERIAL_SETTINGS_OFFSET: usize = 96;

/// Configuration dump of a factory-configured unit.
pub(crate) const FACTORY_CONFIG: &str = concat!(
    "CAB39E84000000F401E13380570007080401000258030A0002580017000258011A003840001C07",
    "1020FFA8181C010038",
    "100101202564000433383335000200010200000000",
    "0000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000",
);

fn int(id: ParameterId, offset: usize, width: usize, default: u32) -> ParameterEntry {
    ParameterEntry {
        id,
        layout: Layout::Field { offset, width },
        kind: ValueKind::Int,
        default: Value::Int(default),
        read_only: false,
    }
}

fn flag(id: ParameterId, offset: usize, mask: u8, default: bool) -> ParameterEntry {
    ParameterEntry {
        id,
        layout: Layout::Bit {
            offset,
            mask,
            inverted: false,
        },
        kind: ValueKind::Bool,
        default: Value::Bool(default),
        read_only: false,
    }
}

/// Bits of a shared byte that no named flag covers, carried through encodes.
fn reserved(id: ParameterId, offset: usize, mask: u8) -> ParameterEntry {
    ParameterEntry {
        id,
        layout: Layout::Masked { offset, mask },
        kind: ValueKind::Int,
        default: Value::Int(0),
        read_only: true,
    }
}

fn entry_for(id: ParameterId) -> ParameterEntry {
    use ParameterId as P;

    match id {
        P::ProgramTime => ParameterEntry {
            read_only: true,
            ..int(id, 0, 8, 0)
        },
        P::StartOffset => int(id, 8, 8, 0x0000_00F4),
        P::RecordingTime => int(id, 16, 8, 0x01E1_3380),
        P::PmiSampleSchedule => flag(id, MODE_OFFSET, 0x01, true),
        P::SamiSampleSchedule => flag(id, MODE_OFFSET, 0x02, true),
        P::Slot1FollowsSamiSchedule => flag(id, MODE_OFFSET, 0x04, true),
        P::Slot1IndependentSchedule => flag(id, MODE_OFFSET, 0x08, false),
        P::Slot2FollowsSamiSchedule => flag(id, MODE_OFFSET, 0x10, true),
        P::Slot2IndependentSchedule => flag(id, MODE_OFFSET, 0x20, false),
        P::Slot3FollowsSamiSchedule => flag(id, MODE_OFFSET, 0x40, true),
        P::Slot3IndependentSchedule => flag(id, MODE_OFFSET, 0x80, false),
        P::TimerIntervalSami => int(id, 26, 6, 0x00_0708),
        P::DriverIdSami => int(id, 32, 2, 0x04),
        P::ParameterPointerSami => int(id, 34, 2, 0x01),
        P::TimerInterval1 => int(id, 36, 6, 0x00_0258),
        P::DriverId1 => int(id, 42, 2, 0x03),
        P::ParameterPointer1 => int(id, 44, 2, 0x0A),
        P::TimerInterval2 => int(id, 46, 6, 0x00_0258),
        P::DriverId2 => int(id, 52, 2, 0x00),
        P::ParameterPointer2 => int(id, 54, 2, 0x17),
        P::TimerInterval3 => int(id, 56, 6, 0x00_0258),
        P::DriverId3 => int(id, 62, 2, 0x01),
        P::ParameterPointer3 => int(id, 64, 2, 0x1A),
        P::TimerIntervalPrestart => int(id, 66, 6, 0x00_3840),
        P::DriverIdPrestart => int(id, 72, 2, 0x00),
        P::ParameterPointerPrestart => int(id, 74, 2, 0x1C),
        P::UseBaudRate57600 => flag(id, GLOBAL_OFFSET, 0x01, true),
        P::SendRecordType => flag(id, GLOBAL_OFFSET, 0x02, true),
        P::SendLiveRecords => flag(id, GLOBAL_OFFSET, 0x04, true),
        P::GlobalReservedBits => reserved(id, GLOBAL_OFFSET, 0xF8),
        P::PumpPulse => int(id, 78, 2, 0x10),
        P::PumpOnToMeasure => int(id, 80, 2, 0x20),
        P::SamplesPerMeasure => int(id, 82, 2, 0xFF),
        P::CyclesBetweenBlanks => int(id, 84, 2, 0xA8),
        P::NumReagentCycles => int(id, 86, 2, 0x18),
        P::NumBlankCycles => int(id, 88, 2, 0x1C),
        P::FlushPumpInterval => int(id, 90, 2, 0x01),
        P::BlankFlushOnStartEnable => ParameterEntry {
            layout: Layout::Bit {
                offset: BIT_SWITCHES_OFFSET,
                mask: 0x01,
                inverted: true,
            },
            ..flag(id, BIT_SWITCHES_OFFSET, 0x01, true)
        },
        P::PumpPulsePostMeasure => flag(id, BIT_SWITCHES_OFFSET, 0x02, false),
        P::BitSwitchReservedBits => reserved(id, BIT_SWITCHES_OFFSET, 0xFC),
        P::ExtraPumpCycles => int(id, 94, 2, 0x38),
        P::SerialSettings => ParameterEntry {
            id,
            layout: Layout::Field {
                offset: SERIAL_SETTINGS_OFFSET,
                width: 136,
            },
            kind: ValueKind::Text,
            default: Value::from(
                FACTORY_CONFIG
                    .get(SERIAL_SETTINGS_OFFSET..)
                    .unwrap_or_default(),
            ),
            read_only: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::chunker::CONFIG_FRAME_LEN;
    use crate::test_fixtures::CONFIG_FRAME;

    #[test]
    fn entries_are_indexed_by_id() {
        for id in ParameterId::iter() {
            assert_eq!(id, entry(id).id());
        }
    }

    #[test]
    fn fields_stay_inside_the_frame_and_do_not_overlap() {
        let mut owner: Vec<Option<ParameterId>> = vec![None; CONFIG_FRAME_LEN];
        for parameter in entries() {
            if let Layout::Field { offset, width } = parameter.layout() {
                assert!(offset + width <= CONFIG_FRAME_LEN, "{} overruns", parameter.id());
                for slot in &mut owner[offset..offset + width] {
                    assert_eq!(None, *slot, "{} overlaps", parameter.id());
                    *slot = Some(parameter.id());
                }
            }
        }
    }

    #[test]
    fn defaults_match_a_factory_configuration() {
        for parameter in entries().filter(|parameter| !parameter.is_read_only()) {
            assert_eq!(
                parameter.default_value(),
                &parameter.read(CONFIG_FRAME).expect("fixture field reads"),
                "{}",
                parameter.id()
            );
        }
    }

    #[test]
    fn int_range_follows_field_width() {
        assert_eq!(Some(0xFF), entry(ParameterId::PumpPulse).max());
        assert_eq!(Some(0x00FF_FFFF), entry(ParameterId::TimerIntervalSami).max());
        assert_eq!(Some(u32::MAX), entry(ParameterId::StartOffset).max());
        assert_eq!(None, entry(ParameterId::SendLiveRecords).max());
    }

    #[test]
    fn inverted_bit_reads_clear_as_enabled() {
        let parameter = entry(ParameterId::BlankFlushOnStartEnable);
        assert_eq!(Value::Bool(true), parameter.read(CONFIG_FRAME).expect("reads"));

        let mut text = CONFIG_FRAME.to_string();
        parameter.splice(&mut text, &Value::Bool(false)).expect("splices");
        assert_eq!("01", &text[92..94]);
    }

    #[test]
    fn bit_splice_preserves_neighbouring_bits() {
        let mut text = CONFIG_FRAME.to_string();
        entry(ParameterId::SendRecordType)
            .splice(&mut text, &Value::Bool(false))
            .expect("splices");
        assert_eq!("05", &text[76..78]);
    }

    #[rstest]
    #[case::enable(true, "02")]
    #[case::disable(false, "03")]
    fn blank_flush_leaves_post_measure_pump_alone(
        #[case] blank_flush: bool,
        #[case] byte: &str,
    ) {
        let post_measure = entry(ParameterId::PumpPulsePostMeasure);
        let mut text = CONFIG_FRAME.to_string();
        post_measure
            .splice(&mut text, &Value::Bool(true))
            .expect("splices");

        entry(ParameterId::BlankFlushOnStartEnable)
            .splice(&mut text, &Value::Bool(blank_flush))
            .expect("splices");
        assert_eq!(byte, &text[92..94]);
        assert_eq!(Value::Bool(true), post_measure.read(&text).expect("reads"));
    }

    #[test]
    fn reserved_bits_splice_around_named_flags() {
        let mut text = CONFIG_FRAME.to_string();
        entry(ParameterId::BitSwitchReservedBits)
            .splice(&mut text, &Value::Int(0xA8))
            .expect("splices");
        assert_eq!("A8", &text[92..94]);
        assert_eq!(
            Value::Bool(true),
            entry(ParameterId::BlankFlushOnStartEnable)
                .read(&text)
                .expect("reads")
        );

        entry(ParameterId::PumpPulsePostMeasure)
            .splice(&mut text, &Value::Bool(true))
            .expect("splices");
        assert_eq!("AA", &text[92..94]);
        assert_eq!(
            Value::Int(0xA8),
            entry(ParameterId::BitSwitchReservedBits)
                .read(&text)
                .expect("reads")
        );
    }

    #[test]
    fn wrong_width_text_is_rejected() {
        assert_matches!(
            entry(ParameterId::SerialSettings).validate(&Value::from("00")),
            Err(ParameterError::InvalidText {
                id: ParameterId::SerialSettings,
                width: 136
            })
        );
    }
}

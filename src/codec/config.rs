use std::collections::BTreeMap;

use serde::Serialize;
use tracing::instrument;

use super::FrameDecodeError;
use super::fields::frame_text;
use crate::chunker::{CONFIG_FRAME_LEN, FrameKind, RawFrame, is_bare_config};
use crate::params::{ParameterError, ParameterId, Value, entries, entry};

/// Decoded positional configuration frame.
///
/// Keeps the source text so that an encode over this configuration leaves
/// every unsupplied character untouched.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct InstrumentConfig {
    #[serde(skip)]
    text: String,
    values: BTreeMap<ParameterId, Value>,
}

impl InstrumentConfig {
    /// Decodes a Config frame.
    ///
    /// # Errors
    ///
    /// Returns an error when the frame is not 232 hexadecimal characters.
    pub fn decode(frame: &RawFrame) -> Result<Self, FrameDecodeError> {
        Self::parse(frame_text(frame, FrameKind::Config)?)
    }

    /// Parses configuration text without sigil checks.
    ///
    /// # Errors
    ///
    /// Returns an error when the text is not 232 hexadecimal characters.
    ///
    /// ```
    /// use sami::{InstrumentConfig, ParameterId, Value};
    ///
    /// let text = format!("{:0<232}", "C0000010");
    /// let config = InstrumentConfig::parse(&text)?;
    /// assert_eq!(&Value::Int(0xC000_0010), config.get(ParameterId::ProgramTime));
    /// # Ok::<(), sami::FrameDecodeError>(())
    /// ```
    pub fn parse(text: &str) -> Result<Self, FrameDecodeError> {
        if text.len() != CONFIG_FRAME_LEN {
            return Err(FrameDecodeError::LengthMismatch {
                kind: FrameKind::Config,
                expected: CONFIG_FRAME_LEN,
                actual: text.len(),
            });
        }
        if let Some(offset) = text.bytes().position(|byte| !byte.is_ascii_hexdigit()) {
            return Err(FrameDecodeError::MalformedField {
                field: "configuration",
                offset,
            });
        }

        let values = entries()
            .map(|parameter| Ok((parameter.id(), parameter.read(text)?)))
            .collect::<Result<BTreeMap<_, _>, FrameDecodeError>>()?;
        Ok(Self {
            text: text.to_ascii_uppercase(),
            values,
        })
    }

    /// Configuration text as reported by the instrument.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Value of one parameter.
    #[must_use]
    pub fn get(&self, id: ParameterId) -> &Value {
        self.values
            .get(&id)
            .unwrap_or_else(|| entry(id).default_value())
    }

    /// Every parameter value.
    #[must_use]
    pub fn values(&self) -> &BTreeMap<ParameterId, Value> {
        &self.values
    }

    /// Instrument program time, seconds since 1904.
    #[must_use]
    pub fn program_time(&self) -> u32 {
        self.get(ParameterId::ProgramTime)
            .as_int()
            .unwrap_or_default()
    }
}

/// Decodes an unframed line as configuration when it has the exact shape.
pub(crate) fn decode_bare_config(line: &[u8]) -> Result<InstrumentConfig, FrameDecodeError> {
    if !is_bare_config(line) {
        return Err(FrameDecodeError::LengthMismatch {
            kind: FrameKind::Config,
            expected: CONFIG_FRAME_LEN,
            actual: line.len(),
        });
    }
    let text = std::str::from_utf8(line).map_err(|_error| FrameDecodeError::NonAscii {
        kind: FrameKind::Config,
    })?;
    InstrumentConfig::parse(text)
}

/// Builds outbound configuration text.
pub struct ConfigEncoder;

impl ConfigEncoder {
    /// Splices `values` over `base`, or over an all-zero template.
    ///
    /// Characters not covered by a supplied value are copied from the base.
    /// Read-only parameters are written like any other; access control is the
    /// registry's job.
    ///
    /// # Errors
    ///
    /// Returns an error when a value has the wrong type or does not fit its
    /// field. Nothing is returned in that case.
    ///
    /// ```
    /// use std::collections::BTreeMap;
    ///
    /// use sami::{ConfigEncoder, ParameterId, Value};
    ///
    /// let values = BTreeMap::from([(ParameterId::PumpPulse, Value::Int(0x12))]);
    /// let text = ConfigEncoder::encode(&values, None)?;
    /// assert_eq!(232, text.len());
    /// assert_eq!("12", &text[78..80]);
    /// # Ok::<(), sami::ParameterError>(())
    /// ```
    #[instrument(skip_all, level = "debug", fields(values = values.len(), based = base.is_some()))]
    pub fn encode(
        values: &BTreeMap<ParameterId, Value>,
        base: Option<&InstrumentConfig>,
    ) -> Result<String, ParameterError> {
        let mut text = base.map_or_else(Self::template, |config| config.text().to_string());
        for (id, value) in values {
            entry(*id).splice(&mut text, value)?;
        }
        Ok(text)
    }

    /// All-zero configuration text.
    #[must_use]
    pub fn template() -> String {
        "0".repeat(CONFIG_FRAME_LEN)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::*;
    use crate::params::ValueKind;
    use crate::test_fixtures::CONFIG_FRAME;

    fn reference() -> InstrumentConfig {
        InstrumentConfig::decode(&RawFrame::new(
            FrameKind::Config,
            CONFIG_FRAME.as_bytes().to_vec(),
        ))
        .expect("fixture decodes")
    }

    #[test]
    fn reference_config_decodes_documented_fields() {
        let config = reference();
        assert_eq!(&Value::Int(0x10), config.get(ParameterId::PumpPulse));
        assert_eq!(&Value::Int(0xFF), config.get(ParameterId::SamplesPerMeasure));
        assert_eq!(&Value::Bool(true), config.get(ParameterId::SendLiveRecords));
        assert_eq!(0xCAB3_9E84, config.program_time());
    }

    #[test]
    fn encoding_reference_values_reproduces_the_frame() {
        let config = reference();
        assert_eq!(
            CONFIG_FRAME,
            ConfigEncoder::encode(config.values(), None).expect("encodes")
        );
    }

    #[test]
    fn reserved_bits_of_shared_bytes_survive_an_encode() {
        let text = format!(
            "{}FF{}FF{}",
            &CONFIG_FRAME[..76],
            &CONFIG_FRAME[78..92],
            &CONFIG_FRAME[94..]
        );
        let config = InstrumentConfig::parse(&text).expect("parses");
        assert_eq!(&Value::Int(0xF8), config.get(ParameterId::GlobalReservedBits));
        assert_eq!(&Value::Int(0xFC), config.get(ParameterId::BitSwitchReservedBits));
        assert_eq!(text, ConfigEncoder::encode(config.values(), None).expect("encodes"));
    }

    #[test]
    fn reserved_bits_reject_values_outside_their_mask() {
        let values = BTreeMap::from([(ParameterId::GlobalReservedBits, Value::Int(0x03))]);
        assert_matches!(
            ConfigEncoder::encode(&values, None),
            Err(ParameterError::OutsideMask {
                id: ParameterId::GlobalReservedBits,
                value: 0x03,
                mask: 0xF8
            })
        );
    }

    #[test]
    fn encoding_over_a_base_keeps_unsupplied_fields() {
        let config = reference();
        let values = BTreeMap::from([
            (ParameterId::PumpPulse, Value::Int(0x11)),
            (ParameterId::PumpPulsePostMeasure, Value::Bool(true)),
        ]);
        let text = ConfigEncoder::encode(&values, Some(&config)).expect("encodes");

        let changed: Vec<usize> = text
            .bytes()
            .zip(CONFIG_FRAME.bytes())
            .enumerate()
            .filter(|(_, (left, right))| left != right)
            .map(|(index, _)| index)
            .collect();
        assert_eq!(vec![79, 93], changed);
    }

    #[test]
    fn out_of_range_value_fails_the_whole_encode() {
        let values = BTreeMap::from([
            (ParameterId::PumpPulse, Value::Int(0x11)),
            (ParameterId::NumBlankCycles, Value::Int(0x100)),
        ]);
        assert_matches!(
            ConfigEncoder::encode(&values, Some(&reference())),
            Err(ParameterError::OutOfRange {
                id: ParameterId::NumBlankCycles,
                value: 0x100,
                max: 0xFF
            })
        );
    }

    #[test]
    fn bare_config_requires_exact_shape() {
        let bare = format!("E{}", &CONFIG_FRAME[1..]);
        let config = decode_bare_config(bare.as_bytes()).expect("bare line decodes");
        assert_eq!(0xEAB3_9E84, config.program_time());
        assert_matches!(
            decode_bare_config(b"ready"),
            Err(FrameDecodeError::LengthMismatch {
                kind: FrameKind::Config,
                ..
            })
        );
    }

    fn value_for(id: ParameterId) -> BoxedStrategy<Value> {
        let parameter = entry(id);
        match parameter.kind() {
            ValueKind::Int => {
                // Masked fields report their mask as the maximum.
                let max = parameter.max().unwrap_or(u32::MAX);
                (0..=max).prop_map(move |int| Value::Int(int & max)).boxed()
            }
            ValueKind::Bool => any::<bool>().prop_map(Value::Bool).boxed(),
            ValueKind::Text => "[0-9A-F]{136}".prop_map(Value::Text).boxed(),
        }
    }

    fn full_value_set() -> impl Strategy<Value = BTreeMap<ParameterId, Value>> {
        entries()
            .map(|parameter| {
                let id = parameter.id();
                value_for(id).prop_map(move |value| (id, value))
            })
            .collect::<Vec<_>>()
            .prop_map(|pairs| pairs.into_iter().collect())
    }

    proptest! {
        #[test]
        fn decode_after_encode_returns_the_values(values in full_value_set()) {
            let text = ConfigEncoder::encode(&values, None).expect("generated values fit");
            let decoded = InstrumentConfig::parse(&text).expect("encoded text parses");
            prop_assert_eq!(&values, decoded.values());
        }

        #[test]
        fn encode_after_decode_reproduces_any_configuration(text in "[0-9A-F]{232}") {
            let decoded = InstrumentConfig::parse(&text).expect("hex text parses");
            let encoded = ConfigEncoder::encode(decoded.values(), None).expect("decoded values fit");
            prop_assert_eq!(text, encoded);
        }
    }
}

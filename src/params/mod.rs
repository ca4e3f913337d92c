mod registry;
mod table;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_with::SerializeDisplay;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};
use thiserror::Error;

pub use self::registry::ParameterRegistry;
pub use self::table::{ParameterEntry, entries, entry};
pub(crate) use self::table::FACTORY_CONFIG;

/// Externally visible instrument parameters.
///
/// Names follow the snake_case form used on the host interface.
#[derive(
    Debug,
    Clone,
    Copy,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    EnumIter,
    EnumString,
    Display,
    IntoStaticStr,
    SerializeDisplay,
)]
pub enum ParameterId {
    #[strum(to_string = "program_time")]
    ProgramTime,
    #[strum(to_string = "start_offset")]
    StartOffset,
    #[strum(to_string = "recording_time")]
    RecordingTime,
    #[strum(to_string = "pmi_sample_schedule")]
    PmiSampleSchedule,
    #[strum(to_string = "sami_sample_schedule")]
    SamiSampleSchedule,
    #[strum(to_string = "slot1_follows_sami_schedule")]
    Slot1FollowsSamiSchedule,
    #[strum(to_string = "slot1_independent_schedule")]
    Slot1IndependentSchedule,
    #[strum(to_string = "slot2_follows_sami_schedule")]
    Slot2FollowsSamiSchedule,
    #[strum(to_string = "slot2_independent_schedule")]
    Slot2IndependentSchedule,
    #[strum(to_string = "slot3_follows_sami_schedule")]
    Slot3FollowsSamiSchedule,
    #[strum(to_string = "slot3_independent_schedule")]
    Slot3IndependentSchedule,
    #[strum(to_string = "timer_interval_sami")]
    TimerIntervalSami,
    #[strum(to_string = "driver_id_sami")]
    DriverIdSami,
    #[strum(to_string = "parameter_pointer_sami")]
    ParameterPointerSami,
    #[strum(to_string = "timer_interval_1")]
    TimerInterval1,
    #[strum(to_string = "driver_id_1")]
    DriverId1,
    #[strum(to_string = "parameter_pointer_1")]
    ParameterPointer1,
    #[strum(to_string = "timer_interval_2")]
    TimerInterval2,
    #[strum(to_string = "driver_id_2")]
    DriverId2,
    #[strum(to_string = "parameter_pointer_2")]
    ParameterPointer2,
    #[strum(to_string = "timer_interval_3")]
    TimerInterval3,
    #[strum(to_string = "driver_id_3")]
    DriverId3,
    #[strum(to_string = "parameter_pointer_3")]
    ParameterPointer3,
    #[strum(to_string = "timer_interval_prestart")]
    TimerIntervalPrestart,
    #[strum(to_string = "driver_id_prestart")]
    DriverIdPrestart,
    #[strum(to_string = "parameter_pointer_prestart")]
    ParameterPointerPrestart,
    #[strum(to_string = "use_baud_rate_57600")]
    UseBaudRate57600,
    #[strum(to_string = "send_record_type")]
    SendRecordType,
    #[strum(to_string = "send_live_records")]
    SendLiveRecords,
    /// Undocumented bits of the global configuration byte.
    #[strum(to_string = "global_reserved_bits")]
    GlobalReservedBits,
    #[strum(to_string = "pump_pulse")]
    PumpPulse,
    #[strum(to_string = "pump_on_to_measure")]
    PumpOnToMeasure,
    #[strum(to_string = "samples_per_measure")]
    SamplesPerMeasure,
    #[strum(to_string = "cycles_between_blanks")]
    CyclesBetweenBlanks,
    #[strum(to_string = "num_reagent_cycles")]
    NumReagentCycles,
    #[strum(to_string = "num_blank_cycles")]
    NumBlankCycles,
    #[strum(to_string = "flush_pump_interval")]
    FlushPumpInterval,
    /// Bit clear on the wire means enabled.
    #[strum(to_string = "blank_flush_on_start_enable")]
    BlankFlushOnStartEnable,
    #[strum(to_string = "pump_pulse_post_measure")]
    PumpPulsePostMeasure,
    /// Undocumented bits of the bit-switch byte.
    #[strum(to_string = "bit_switch_reserved_bits")]
    BitSwitchReservedBits,
    #[strum(to_string = "extra_pump_cycles")]
    ExtraPumpCycles,
    /// Opaque serial-port settings tail, kept as hexadecimal text.
    #[strum(to_string = "serial_settings")]
    SerialSettings,
}

impl ParameterId {
    /// Parses a host-facing parameter name.
    ///
    /// # Errors
    ///
    /// Returns an error when no parameter has that name.
    ///
    /// ```
    /// use sami::ParameterId;
    ///
    /// assert_eq!(ParameterId::PumpPulse, ParameterId::from_name("pump_pulse")?);
    /// assert!(ParameterId::from_name("pump_speed").is_err());
    /// # Ok::<(), sami::ParameterError>(())
    /// ```
    pub fn from_name(name: &str) -> Result<Self, ParameterError> {
        Self::from_str(name).map_err(|_error| ParameterError::UnknownName {
            name: name.to_string(),
        })
    }

    /// Registry entry describing this parameter.
    #[must_use]
    pub fn entry(self) -> &'static ParameterEntry {
        entry(self)
    }
}

/// Type tag of a parameter value.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Display, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    #[strum(to_string = "int")]
    Int,
    #[strum(to_string = "bool")]
    Bool,
    #[strum(to_string = "text")]
    Text,
}

/// One parameter value.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, derive_more::From)]
#[serde(untagged)]
pub enum Value {
    Int(u32),
    Bool(bool),
    Text(String),
}

impl Value {
    /// Type tag of this value.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Int(_) => ValueKind::Int,
            Self::Bool(_) => ValueKind::Bool,
            Self::Text(_) => ValueKind::Text,
        }
    }

    /// Integer payload, if this is an integer value.
    #[must_use]
    pub fn as_int(&self) -> Option<u32> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Boolean payload, if this is a boolean value.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Parses host text into the value type `id` declares.
    ///
    /// Integers accept decimal or `0x`-prefixed hexadecimal; booleans accept
    /// `true`/`false`/`1`/`0`.
    ///
    /// # Errors
    ///
    /// Returns an error when `raw` cannot be read as the declared type.
    ///
    /// ```
    /// use sami::{ParameterId, Value};
    ///
    /// assert_eq!(Value::Int(16), Value::parse_for(ParameterId::PumpPulse, "0x10")?);
    /// assert_eq!(Value::Bool(true), Value::parse_for(ParameterId::SendLiveRecords, "1")?);
    /// # Ok::<(), sami::ParameterError>(())
    /// ```
    pub fn parse_for(id: ParameterId, raw: &str) -> Result<Self, ParameterError> {
        let expected = id.entry().kind();
        let unparseable = || ParameterError::Unparseable {
            id,
            raw: raw.to_string(),
            expected,
        };
        let trimmed = raw.trim();
        match expected {
            ValueKind::Int => {
                let parsed = match trimmed
                    .strip_prefix("0x")
                    .or_else(|| trimmed.strip_prefix("0X"))
                {
                    Some(digits) => u32::from_str_radix(digits, 16),
                    None => trimmed.parse::<u32>(),
                };
                parsed.map(Self::Int).map_err(|_error| unparseable())
            }
            ValueKind::Bool => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "1" | "on" => Ok(Self::Bool(true)),
                "false" | "0" | "off" => Ok(Self::Bool(false)),
                _ => Err(unparseable()),
            },
            ValueKind::Text => Ok(Self::Text(trimmed.to_string())),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

/// Errors returned when reading or staging parameters.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum ParameterError {
    #[error("unknown parameter `{name}`")]
    UnknownName { name: String },
    #[error("parameter `{id}` expects a {expected} value, got {actual}")]
    WrongType {
        id: ParameterId,
        expected: ValueKind,
        actual: ValueKind,
    },
    #[error("value {value} for parameter `{id}` exceeds maximum {max}")]
    OutOfRange {
        id: ParameterId,
        value: u32,
        max: u32,
    },
    #[error("value {value:#04X} for parameter `{id}` sets bits outside mask {mask:#04X}")]
    OutsideMask {
        id: ParameterId,
        value: u32,
        mask: u8,
    },
    #[error("parameter `{id}` expects exactly {width} hexadecimal characters")]
    InvalidText { id: ParameterId, width: usize },
    #[error("parameter `{id}` is read-only")]
    ReadOnly { id: ParameterId },
    #[error("cannot parse `{raw}` as a {expected} value for parameter `{id}`")]
    Unparseable {
        id: ParameterId,
        raw: String,
        expected: ValueKind,
    },
    #[error("assignment `{raw}` must have the form name=value")]
    InvalidAssignment { raw: String },
}

/// A parsed `name=value` assignment.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Assignment {
    id: ParameterId,
    value: Value,
}

impl Assignment {
    /// Parameter being assigned.
    #[must_use]
    pub fn id(&self) -> ParameterId {
        self.id
    }

    /// Parsed value.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Splits the assignment into its parts.
    #[must_use]
    pub fn into_parts(self) -> (ParameterId, Value) {
        (self.id, self.value)
    }
}

impl FromStr for Assignment {
    type Err = ParameterError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let Some((name, value)) = raw.split_once('=') else {
            return Err(ParameterError::InvalidAssignment {
                raw: raw.to_string(),
            });
        };
        let id = ParameterId::from_name(name.trim())?;
        let value = Value::parse_for(id, value)?;
        Ok(Self { id, value })
    }
}

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use crate::codec::{InstrumentConfig, sami_seconds_to_utc};
use crate::params::{ParameterId, Value};
use crate::utils::format_timestamp;

use super::painter::Painter;
use super::table::Table;

/// Serial settings are long hex text; the table shows a prefix.
const TEXT_PREVIEW_LEN: usize = 24;

/// Renders parameter values as a grid.
pub(crate) struct ParamsView<'a> {
    values: &'a BTreeMap<ParameterId, Value>,
    painter: &'a Painter,
}

impl<'a> ParamsView<'a> {
    pub(crate) fn new(values: &'a BTreeMap<ParameterId, Value>, painter: &'a Painter) -> Self {
        Self { values, painter }
    }
}

impl Display for ParamsView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let rows = self
            .values
            .iter()
            .map(|(id, value)| {
                let entry = id.entry();
                let access = if entry.is_read_only() {
                    self.painter.muted("read-only")
                } else {
                    "read-write".to_string()
                };
                vec![
                    id.to_string(),
                    entry.kind().to_string(),
                    self.painter.value(preview(value)),
                    access,
                ]
            })
            .collect();
        write!(
            f,
            "{}",
            Table::grid(["parameter", "kind", "value", "access"], rows).align_right(2)
        )
    }
}

/// Renders a full configuration with its program time.
pub(crate) struct ConfigView<'a> {
    config: &'a InstrumentConfig,
    painter: &'a Painter,
}

impl<'a> ConfigView<'a> {
    pub(crate) fn new(config: &'a InstrumentConfig, painter: &'a Painter) -> Self {
        Self { config, painter }
    }
}

impl Display for ConfigView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.painter.heading("Configuration:"))?;
        write!(
            f,
            "\n{}",
            ProgramTimeView::new(self.config.program_time(), self.painter)
        )?;
        write!(f, "\n{}", ParamsView::new(self.config.values(), self.painter))
    }
}

/// Renders an instrument program time.
pub(crate) struct ProgramTimeView<'a> {
    program_time: u32,
    painter: &'a Painter,
}

impl<'a> ProgramTimeView<'a> {
    pub(crate) fn new(program_time: u32, painter: &'a Painter) -> Self {
        Self {
            program_time,
            painter,
        }
    }
}

impl Display for ProgramTimeView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.painter.muted("program_time"),
            self.painter
                .value(format_timestamp(sami_seconds_to_utc(self.program_time))),
            self.painter.muted(format!("(0x{:08X})", self.program_time))
        )
    }
}

fn preview(value: &Value) -> String {
    match value {
        Value::Text(text) => match text.get(..TEXT_PREVIEW_LEN) {
            Some(prefix) if prefix.len() < text.len() => format!("{prefix}…"),
            _ => text.clone(),
        },
        other => other.to_string(),
    }
}

use std::fmt::{self, Display, Formatter};

use crate::codec::SampleRecord;
use crate::utils::format_timestamp;

use super::painter::Painter;
use super::table::Table;

/// Renders one sample record as a key-value table.
pub(crate) struct RecordView<'a> {
    record: &'a SampleRecord,
    painter: &'a Painter,
}

impl<'a> RecordView<'a> {
    pub(crate) fn new(record: &'a SampleRecord, painter: &'a Painter) -> Self {
        Self { record, painter }
    }
}

impl Display for RecordView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let painter = self.painter;
        let record = self.record;
        let measurements = if record.light_measurements.is_empty() {
            painter.muted("<none>")
        } else {
            painter.value(
                record
                    .light_measurements
                    .iter()
                    .map(u16::to_string)
                    .collect::<Vec<_>>()
                    .join(" "),
            )
        };

        let table = Table::key_value(
            painter,
            vec![
                ("record_type", painter.value(record.record_type.to_string())),
                ("recorded_at", painter.value(format_timestamp(record.recorded_at()))),
                ("unique_id", painter.value(format!("0x{:02X}", record.unique_id))),
                ("light_measurements", measurements),
                ("voltage_battery", painter.value(record.voltage_battery.to_string())),
                ("thermistor_raw", painter.value(record.thermistor_raw.to_string())),
                ("checksum", painter.checksum(record.checksum, record.checksum_valid)),
            ],
        );
        write!(f, "{}", painter.heading("Sample record:"))?;
        write!(f, "\n{table}")
    }
}

/// Renders one sample as a single line for streaming output.
pub(crate) struct RecordLineView<'a> {
    index: usize,
    record: &'a SampleRecord,
    painter: &'a Painter,
}

impl<'a> RecordLineView<'a> {
    pub(crate) fn new(index: usize, record: &'a SampleRecord, painter: &'a Painter) -> Self {
        Self {
            index,
            record,
            painter,
        }
    }
}

impl Display for RecordLineView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let painter = self.painter;
        write!(
            f,
            "{} {} {} {} {}",
            painter.muted(format!("[{:04}]", self.index)),
            painter.value(self.record.record_type.to_string()),
            format_timestamp(self.record.recorded_at()),
            painter.muted(format!(
                "thermistor={} battery={}",
                self.record.thermistor_raw, self.record.voltage_battery
            )),
            painter.checksum(self.record.checksum, self.record.checksum_valid)
        )
    }
}

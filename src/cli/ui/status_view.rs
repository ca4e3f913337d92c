use std::fmt::{self, Display, Formatter};

use crate::codec::{DeviceStatus, ImmediateStatus, StatusFlags};
use crate::utils::format_timestamp;

use super::painter::Painter;
use super::table::Table;

/// Renders a device-status record as a key-value table.
pub(crate) struct StatusView<'a> {
    status: &'a DeviceStatus,
    painter: &'a Painter,
}

impl<'a> StatusView<'a> {
    pub(crate) fn new(status: &'a DeviceStatus, painter: &'a Painter) -> Self {
        Self { status, painter }
    }
}

impl Display for StatusView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let painter = self.painter;
        let mut rows = vec![
            (
                "instrument_time",
                painter.value(format_timestamp(self.status.instrument_time())),
            ),
            (
                "time_offset",
                painter.muted(format!("0x{:08X}", self.status.time_offset)),
            ),
        ];

        match &self.status.status {
            Some(flags) => {
                rows.push(("status_word", painter.value(format!("0x{:04X}", flags.raw))));
                rows.push(("flags", flag_summary(flags, painter)));
            }
            None => rows.push(("status_word", painter.muted("<not reported>"))),
        }

        if let Some(counters) = &self.status.counters {
            rows.push(("data_records", painter.value(counters.data_records.to_string())));
            rows.push(("error_count", painter.error_count(counters.error_count)));
            rows.push(("bytes_stored", painter.value(counters.bytes_stored.to_string())));
            rows.push(("unique_id", painter.value(format!("0x{:02X}", counters.unique_id))));
        }

        write!(f, "{}", painter.heading("Device status:"))?;
        write!(f, "\n{}", Table::key_value(painter, rows))
    }
}

/// Renders the immediate-status reply shown when autosample stops.
pub(crate) struct ImmediateStatusView<'a> {
    status: &'a ImmediateStatus,
    painter: &'a Painter,
}

impl<'a> ImmediateStatusView<'a> {
    pub(crate) fn new(status: &'a ImmediateStatus, painter: &'a Painter) -> Self {
        Self { status, painter }
    }
}

impl Display for ImmediateStatusView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let flags = &self.status.flags;
        let on_off = |on: bool| self.painter.switch(on);
        let table = Table::key_value(
            self.painter,
            vec![
                ("pump", on_off(flags.pump_on)),
                ("valve", on_off(flags.valve_on)),
                ("external_power", on_off(flags.external_power_on)),
                ("debug_led", on_off(flags.debug_led)),
                ("debug_echo", on_off(flags.debug_echo)),
            ],
        );
        write!(f, "{}", self.painter.heading("Immediate status:"))?;
        write!(f, "\n{table}")
    }
}

fn flag_summary(flags: &StatusFlags, painter: &Painter) -> String {
    let set: Vec<&str> = [
        (flags.clock_active, "clock_active"),
        (flags.recording_active, "recording_active"),
        (flags.record_end_on_time, "record_end_on_time"),
        (flags.record_memory_full, "record_memory_full"),
        (flags.record_end_on_error, "record_end_on_error"),
        (flags.data_download_ok, "data_download_ok"),
        (flags.flash_memory_open, "flash_memory_open"),
        (flags.battery_error_fatal, "battery_error_fatal"),
        (flags.battery_low_measurement, "battery_low_measurement"),
        (flags.battery_low_blank, "battery_low_blank"),
        (flags.battery_low_external, "battery_low_external"),
        (flags.external_device_faults.device_1, "external_device_1_fault"),
        (flags.external_device_faults.device_2, "external_device_2_fault"),
        (flags.external_device_faults.device_3, "external_device_3_fault"),
        (flags.flash_erased, "flash_erased"),
        (flags.power_on_invalid, "power_on_invalid"),
    ]
    .into_iter()
    .filter_map(|(set, name)| set.then_some(name))
    .collect();

    if set.is_empty() {
        painter.muted("<none>")
    } else if flags.battery_error_fatal || !flags.external_device_faults.is_empty() {
        painter.warning(set.join(", "))
    } else {
        painter.value(set.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::DeviceCounters;

    #[test]
    fn full_status_lists_flags_and_counters() {
        let status = DeviceStatus {
            time_offset: 0x003F_91BE,
            status: Some(StatusFlags::from_word(0x0001)),
            counters: Some(DeviceCounters {
                data_records: 12,
                error_count: 0,
                bytes_stored: 480,
                unique_id: 0x5B,
            }),
        };
        let painter = Painter::new(false);

        let rendered = StatusView::new(&status, &painter).to_string();

        assert!(rendered.starts_with("Device status:"));
        assert!(rendered.contains("1904-02-"));
        assert!(rendered.contains("clock_active"));
        assert!(!rendered.contains("recording_active"));
        assert!(rendered.contains("0x5B"));
    }

    #[test]
    fn time_only_status_marks_missing_word() {
        let status = DeviceStatus {
            time_offset: 0,
            status: None,
            counters: None,
        };
        let painter = Painter::new(false);

        let rendered = StatusView::new(&status, &painter).to_string();

        assert!(rendered.contains("<not reported>"));
        assert!(!rendered.contains("data_records"));
    }
}

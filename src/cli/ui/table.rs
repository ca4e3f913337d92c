use std::fmt::{self, Display, Formatter};

use tabled::builder::Builder;
use tabled::settings::object::Columns;
use tabled::settings::{Alignment, Style as TableStyle};

use super::painter::Painter;

/// Rows of instrument fields rendered as a rounded table.
#[derive(Debug)]
pub(crate) struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    right_aligned: Vec<usize>,
}

impl Table {
    pub(crate) fn grid(
        headers: impl IntoIterator<Item = impl Into<String>>,
        rows: Vec<Vec<String>>,
    ) -> Self {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows,
            right_aligned: Vec::new(),
        }
    }

    /// Two columns of decoded fields, the names muted.
    pub(crate) fn key_value(painter: &Painter, rows: Vec<(&str, String)>) -> Self {
        let records = rows
            .into_iter()
            .map(|(field, value)| vec![painter.muted(field), value])
            .collect();
        Self::grid(["field", "value"], records)
    }

    /// Right-aligns the numeric column at `index`.
    #[must_use]
    pub(crate) fn align_right(mut self, index: usize) -> Self {
        self.right_aligned.push(index);
        self
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut builder = Builder::default();
        builder.push_record(&self.headers);
        for row in &self.rows {
            builder.push_record(row);
        }
        let mut table = builder.build();
        table.with(TableStyle::rounded());
        for &index in &self.right_aligned {
            table.modify(Columns::new(index..=index), Alignment::right());
        }
        write!(f, "{table}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_lists_rows_below_the_header() {
        let table = Table::grid(
            ["parameter", "value"],
            vec![
                vec!["pump_pulse".into(), "16".into()],
                vec!["num_blank_cycles".into(), "4".into()],
            ],
        )
        .to_string();

        let position = |needle: &str| table.find(needle).expect("cell is rendered");
        assert!(table.lines().nth(1).is_some_and(|line| line.contains("parameter")));
        assert!(position("parameter") < position("pump_pulse"));
        assert!(position("pump_pulse") < position("num_blank_cycles"));
    }

    #[test]
    fn right_aligned_column_pads_on_the_left() {
        let table = Table::grid(
            ["parameter", "value"],
            vec![vec!["pump_pulse".into(), "16".into()]],
        )
        .align_right(1)
        .to_string();

        let row = table
            .lines()
            .find(|line| line.contains("pump_pulse"))
            .expect("row is rendered");
        assert!(row.contains("    16 │"));
    }

    #[test]
    fn key_value_renders_field_value_pairs() {
        let painter = Painter::new(false);
        let table = Table::key_value(
            &painter,
            vec![("state", "command".into()), ("unique_id", "0x5B".into())],
        )
        .to_string();

        assert!(table.contains("field"));
        assert!(table.contains("unique_id"));
        assert!(table.contains("0x5B"));
    }
}

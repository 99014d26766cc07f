use crate::storage::RawRow;
use tabled::{builder::Builder, settings::Style};

/// Rows of string cells under a fixed header
pub struct TableBuilder {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TableBuilder {
    pub fn new(header: Vec<String>) -> Self {
        Self {
            header,
            rows: Vec::new(),
        }
    }

    pub fn add_row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    pub fn build(&self) -> String {
        if self.header.is_empty() {
            return String::new();
        }

        let mut builder = Builder::default();
        builder.push_record(self.header.clone());
        for row in &self.rows {
            builder.push_record(row.clone());
        }

        let mut table = builder.build();
        table.with(Style::rounded());
        table.to_string()
    }
}

/// Render raw query rows; the header comes from the first row's columns
pub fn rows_table(rows: &[RawRow]) -> String {
    let Some(first) = rows.first() else {
        return String::new();
    };

    let header: Vec<String> = first.keys().cloned().collect();
    let mut builder = TableBuilder::new(header.clone());
    for row in rows {
        let cells = header
            .iter()
            .map(|column| row.get(column).map(|v| v.to_string()).unwrap_or_default())
            .collect();
        builder.add_row(cells);
    }
    builder.build()
}

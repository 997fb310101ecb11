use crate::codec;
use crate::storage::RawRecord;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Tabled)]
pub struct VariableRow {
    #[tabled(rename = "Type")]
    pub var_type: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Tag")]
    pub tag: String,
    #[tabled(rename = "Value")]
    pub value: String,
    #[tabled(rename = "Timestamp")]
    pub timestamp: i64,
}

impl From<&RawRecord> for VariableRow {
    fn from(record: &RawRecord) -> Self {
        Self {
            var_type: record.var_type.to_string(),
            name: record.name.clone(),
            tag: record.tag.clone(),
            value: codec::render_raw(&record.value),
            timestamp: record.timestamp,
        }
    }
}

pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TableBuilder {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }

        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

pub fn stats_table(stats: &[(&str, &str)]) -> String {
    let mut builder = TableBuilder::new();
    for (label, value) in stats {
        builder.add_row(label, value);
    }
    builder.build()
}

pub fn variables_table(records: &[RawRecord]) -> String {
    let rows: Vec<VariableRow> = records.iter().map(VariableRow::from).collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::var_type::VarType;
    use rusqlite::types::Value as SqlValue;

    #[test]
    fn test_stats_table_rows() {
        let out = stats_table(&[("Variables", "3"), ("int", "2")]);
        assert!(out.contains("Metric"));
        assert!(out.contains("Variables"));
        assert!(TableBuilder::new().build().is_empty());
    }

    #[test]
    fn test_variables_table_renders_raw_values() {
        let records = vec![RawRecord {
            var_type: VarType::String,
            name: "greeting".into(),
            tag: "npc".into(),
            value: SqlValue::Text("well met".into()),
            timestamp: 42,
        }];
        let out = variables_table(&records);
        assert!(out.contains("greeting"));
        assert!(out.contains("well met"));
        assert!(out.contains("42"));
    }
}

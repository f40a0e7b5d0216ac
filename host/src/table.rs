use serde_json::Value;

use crate::flatten::FlatRecord;

/// flat records plus the union of their columns, in first-seen order
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<FlatRecord>,
}

impl Table {
    pub fn from_records(rows: Vec<FlatRecord>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for key in row.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// row cells aligned to `columns`; missing cells are empty
    pub fn text_row(&self, row: &FlatRecord) -> Vec<String> {
        self.columns
            .iter()
            .map(|col| row.get(col).map(cell_text).unwrap_or_default())
            .collect()
    }
}

pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

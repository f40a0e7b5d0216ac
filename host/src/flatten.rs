//! ==============================================================================
//! flatten.rs - nested api records to flat table rows
//! ==============================================================================
//!
//! purpose:
//!     turns one json object from `data.result` into a flat column -> scalar
//!     mapping that can be exported as a table row.
//!
//! rules:
//!     - scalars pass through under their own key
//!     - arrays explode to `field_item1..N` (1-based)
//!     - objects explode to `field_subkey`
//!     - epoch fields become a local date/time column pair
//!     - optionally, `error` codes gain name + description columns
//!     - optionally, milli-unit readings (mA heater current, mV bus
//!       voltage) above 100 are scaled down to A / V
//!
//!     only one level is exploded; nested values inside an array or object
//!     are copied as-is, the same as the backend's own spreadsheet exports.
//!
//! relationships:
//!     - used by: export.rs, server.rs, dashboard.rs
//!     - uses: timefmt.rs (epoch rendering), error_codes.rs (code catalog)
//!
//! ==============================================================================

use crate::error_codes;
use crate::timefmt::{epoch_from_value, LocalClock};
use serde_json::{Map, Value};

pub type FlatRecord = Map<String, Value>;

/// epoch field -> (date column, time column)
const EPOCH_COLUMNS: &[(&str, &str, &str)] = &[
    ("timeStamp", "Device local Date", "Device local Time"),
    ("arrivalTime", "Arrival Date", "Arrival Time"),
    ("fwReleaseDate", "fwReleaseDate Date", "fwReleaseDate Time"),
    ("manufactureDate", "manufactureDate Date", "manufactureDate Time"),
];

pub const ERROR_CODE_COLUMN: &str = "Error Code";
pub const ERROR_NAME_COLUMN: &str = "Error Name";
pub const ERROR_DESCRIPTION_COLUMN: &str = "Description";

/// fields some firmware reports in milli-units
const MILLI_UNIT_FIELDS: &[&str] = &["heaterCurrent", "busVoltage"];
const MILLI_UNIT_THRESHOLD: f64 = 100.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct FlattenOptions {
    /// expand `error` into code / name / description columns
    pub error_metadata: bool,
    /// divide heaterCurrent / busVoltage readings above 100 by 1000
    pub scale_milli_units: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Flattener {
    clock: LocalClock,
    options: FlattenOptions,
}

impl Flattener {
    pub fn new(clock: LocalClock, options: FlattenOptions) -> Self {
        Self { clock, options }
    }

    pub fn with_error_metadata(mut self) -> Self {
        self.options.error_metadata = true;
        self
    }

    pub fn with_milli_unit_scaling(mut self) -> Self {
        self.options.scale_milli_units = true;
        self
    }

    pub fn record(&self, row: &Map<String, Value>) -> FlatRecord {
        let mut out = FlatRecord::new();

        for (col, value) in row {
            let scaled;
            let value = if self.options.scale_milli_units && MILLI_UNIT_FIELDS.contains(&col.as_str()) {
                scaled = scale_milli_units(value);
                &scaled
            } else {
                value
            };

            if let Some((date_col, time_col)) = epoch_columns(col) {
                // non-epoch values keep their original column
                match epoch_from_value(value).and_then(|e| self.clock.split(e)) {
                    Some((date, time)) => {
                        out.insert(date_col.to_string(), Value::String(date));
                        out.insert(time_col.to_string(), Value::String(time));
                    }
                    None => {
                        out.insert(col.clone(), value.clone());
                    }
                }
                continue;
            }

            if self.options.error_metadata && col == "error" {
                let (name, description) = error_codes::describe(value);
                out.insert(ERROR_CODE_COLUMN.to_string(), value.clone());
                out.insert(ERROR_NAME_COLUMN.to_string(), Value::from(name));
                out.insert(ERROR_DESCRIPTION_COLUMN.to_string(), Value::from(description));
                continue;
            }

            match value {
                Value::Array(items) => {
                    for (idx, item) in items.iter().enumerate() {
                        out.insert(format!("{}_item{}", col, idx + 1), item.clone());
                    }
                }
                Value::Object(fields) => {
                    for (sub_key, sub_value) in fields {
                        out.insert(format!("{}_{}", col, sub_key), sub_value.clone());
                    }
                }
                _ => {
                    out.insert(col.clone(), value.clone());
                }
            }
        }

        out
    }

    /// flatten every object in `rows`; anything that isn't an object is dropped
    pub fn records(&self, rows: &[Value]) -> Vec<FlatRecord> {
        let flat: Vec<FlatRecord> = rows
            .iter()
            .filter_map(Value::as_object)
            .map(|row| self.record(row))
            .collect();
        let skipped = rows.len() - flat.len();
        if skipped > 0 {
            tracing::debug!("[FLATTEN] Skipped {} non-object rows", skipped);
        }
        flat
    }
}

fn epoch_columns(col: &str) -> Option<(&'static str, &'static str)> {
    EPOCH_COLUMNS
        .iter()
        .find(|(field, _, _)| *field == col)
        .map(|(_, date, time)| (*date, *time))
}

fn scale_milli_units(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(scale_milli_units).collect()),
        Value::Number(n) => match n.as_f64() {
            Some(v) if v > MILLI_UNIT_THRESHOLD => serde_json::Number::from_f64(v / 1000.0)
                .map(Value::Number)
                .unwrap_or_else(|| value.clone()),
            _ => value.clone(),
        },
        _ => value.clone(),
    }
}

/// best-effort numeric view of a cell: numbers, numeric strings, bools
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

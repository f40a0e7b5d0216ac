//! range filters and server-side paging for the machine data table.
//!
//! parameters arrive as loose strings (query string or a DataTables json
//! body). empty or unparsable bounds are ignored, and so is a numeric or
//! zone-diff bound on a column no row carries. otherwise a row lacking a
//! value for an active bound does not match it.

use serde_json::{Map, Value};

use crate::flatten::{as_number, FlatRecord};

pub const NUMERIC_COLUMNS: &[&str] = &["aqi", "humidity", "roomTemperature", "busVoltage"];
pub const ZONES: [u8; 4] = [1, 2, 3, 4];

pub const ARRIVAL_DATE_COLUMN: &str = "Arrival Date";
pub const ARRIVAL_TIME_COLUMN: &str = "Arrival Time";

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NumericRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumericRange {
    fn from_params(params: &Map<String, Value>, prefix: &str) -> Self {
        Self {
            min: param(params, &format!("{}_min", prefix)).and_then(|s| s.parse().ok()),
            max: param(params, &format!("{}_max", prefix)).and_then(|s| s.parse().ok()),
        }
    }

    pub fn is_active(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    pub fn admits(&self, value: Option<f64>) -> bool {
        if !self.is_active() {
            return true;
        }
        let Some(v) = value else {
            return false;
        };
        self.min.map_or(true, |m| v >= m) && self.max.map_or(true, |m| v <= m)
    }
}

/// inclusive bounds compared as strings; fine for `YYYY-MM-DD` and `HH:MM`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextRange {
    pub min: Option<String>,
    pub max: Option<String>,
}

impl TextRange {
    pub fn new(min: Option<String>, max: Option<String>) -> Self {
        Self { min, max }
    }

    fn from_params(params: &Map<String, Value>, prefix: &str) -> Self {
        Self::new(
            param(params, &format!("{}_min", prefix)),
            param(params, &format!("{}_max", prefix)),
        )
    }

    pub fn is_active(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    pub fn admits(&self, value: Option<&str>) -> bool {
        if !self.is_active() {
            return true;
        }
        let Some(v) = value else {
            return false;
        };
        self.min.as_deref().map_or(true, |m| v >= m) && self.max.as_deref().map_or(true, |m| v <= m)
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryFilters {
    pub numeric: Vec<(&'static str, NumericRange)>,
    pub arrival_date: TextRange,
    pub arrival_time: TextRange,
    /// zone temperature minus required temperature, zones 1..4
    pub zone_diff: [NumericRange; 4],
}

impl QueryFilters {
    pub fn from_params(params: &Map<String, Value>) -> Self {
        Self {
            numeric: NUMERIC_COLUMNS
                .iter()
                .map(|col| (*col, NumericRange::from_params(params, col)))
                .collect(),
            arrival_date: TextRange::from_params(params, "arrivalDate"),
            arrival_time: TextRange::from_params(params, "arrivalTime"),
            zone_diff: ZONES.map(|z| NumericRange::from_params(params, &format!("zone{}_diff", z))),
        }
    }

    /// add `zoneN_diff` columns, then keep the rows every active bound admits
    pub fn apply(&self, rows: Vec<FlatRecord>) -> Vec<FlatRecord> {
        let rows: Vec<FlatRecord> = rows.into_iter().map(with_zone_diffs).collect();
        let filters = self.present_in(&rows);
        rows.into_iter().filter(|row| filters.admits(row)).collect()
    }

    /// these filters minus the numeric and zone-diff bounds on absent columns
    fn present_in(&self, rows: &[FlatRecord]) -> Self {
        let present = |col: &str| rows.iter().any(|row| row.contains_key(col));

        let mut kept = self.clone();
        kept.numeric.retain(|(col, _)| present(col));
        for (zone, range) in ZONES.iter().zip(kept.zone_diff.iter_mut()) {
            if !present(&zone_diff_column(*zone)) {
                *range = NumericRange::default();
            }
        }
        kept
    }

    pub fn admits(&self, row: &FlatRecord) -> bool {
        let text = |col: &str| row.get(col).and_then(Value::as_str);

        self.arrival_date.admits(text(ARRIVAL_DATE_COLUMN))
            && self.arrival_time.admits(text(ARRIVAL_TIME_COLUMN))
            && self
                .numeric
                .iter()
                .all(|(col, range)| range.admits(row.get(*col).and_then(as_number)))
            && ZONES.iter().zip(&self.zone_diff).all(|(zone, range)| {
                range.admits(row.get(&zone_diff_column(*zone)).and_then(as_number))
            })
    }
}

pub fn zone_diff_column(zone: u8) -> String {
    format!("zone{}_diff", zone)
}

/// `ZoneTemperature4_itemN - requiredTemperature_itemN` when both are numeric
pub fn with_zone_diffs(mut row: FlatRecord) -> FlatRecord {
    for zone in ZONES {
        let temp = row.get(&format!("ZoneTemperature4_item{}", zone)).and_then(as_number);
        let required = row.get(&format!("requiredTemperature_item{}", zone)).and_then(as_number);
        if let (Some(t), Some(r)) = (temp, required) {
            if let Some(diff) = serde_json::Number::from_f64(t - r) {
                row.insert(zone_diff_column(zone), Value::Number(diff));
            }
        }
    }
    row
}

/// DataTables server-side request: paging window, echo counter, filters
#[derive(Debug, Clone)]
pub struct TableQuery {
    pub draw: Value,
    pub start: usize,
    /// None means "all rows" (DataTables sends -1)
    pub length: Option<usize>,
    pub machine_id: Option<String>,
    pub filters: QueryFilters,
}

impl TableQuery {
    pub fn from_params(params: &Map<String, Value>) -> Self {
        let int = |key: &str| param(params, key).and_then(|s| s.parse::<i64>().ok());
        Self {
            draw: params.get("draw").cloned().unwrap_or(Value::from(1)),
            start: int("start").and_then(|v| usize::try_from(v).ok()).unwrap_or(0),
            length: match int("length") {
                Some(v) if v < 0 => None,
                Some(v) => usize::try_from(v).ok(),
                None => Some(10),
            },
            machine_id: param(params, "machine_id"),
            filters: QueryFilters::from_params(params),
        }
    }

    pub fn page<'a>(&self, rows: &'a [FlatRecord]) -> &'a [FlatRecord] {
        let start = self.start.min(rows.len());
        let end = match self.length {
            Some(len) => start.saturating_add(len).min(rows.len()),
            None => rows.len(),
        };
        &rows[start..end]
    }
}

/// trimmed, non-empty string form of a parameter
pub(crate) fn param(params: &Map<String, Value>, key: &str) -> Option<String> {
    let text = match params.get(key)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// lift a flat string map (query string) into the json map the parsers take
pub fn params_from_pairs<I, K, V>(pairs: I) -> Map<String, Value>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), Value::String(v.into())))
        .collect()
}

//! ==============================================================================
//! dashboard.rs - chart series for one machine
//! ==============================================================================
//!
//! purpose:
//!     turns flattened machine data into plain json series a front-end can
//!     hand to any chart library: per-zone temperature / required temperature
//!     / heater current, plus the room and power metrics.
//!
//! ordering:
//!     the backend returns newest first. every series here is reversed so
//!     index 0 is the oldest sample and lines read left to right.
//!
//! relationships:
//!     - used by: server.rs (GET /api/dashboard)
//!     - uses: filter.rs (TextRange, parameter parsing), flatten.rs
//!
//! ==============================================================================

use serde::Serialize;
use serde_json::{Map, Value};

use crate::filter::{param, TextRange, ZONES};
use crate::flatten::{as_number, FlatRecord};

pub const LOCAL_DATE_COLUMN: &str = "Device local Date";
pub const LOCAL_TIME_COLUMN: &str = "Device local Time";

pub const METRIC_COLUMNS: &[&str] = &[
    "timeInBedSensor",
    "busVoltage",
    "aqi",
    "humidity",
    "roomTemperature",
    "enclosureTemperature",
];

/// y axis used when a zone has no numeric samples
pub const DEFAULT_Y_RANGE: (f64, f64) = (0.0, 100.0);

#[derive(Debug, Clone, Default)]
pub struct DashboardQuery {
    pub machine_id: Option<String>,
    pub dates: TextRange,
    pub times: TextRange,
}

impl DashboardQuery {
    pub fn from_params(params: &Map<String, Value>) -> Self {
        Self {
            machine_id: param(params, "machine_id"),
            dates: TextRange::new(param(params, "start_date"), param(params, "end_date")),
            times: TextRange::new(param(params, "start_time"), param(params, "end_time")),
        }
    }

    fn admits(&self, row: &FlatRecord) -> bool {
        let text = |col: &str| row.get(col).and_then(Value::as_str);
        self.dates.admits(text(LOCAL_DATE_COLUMN)) && self.times.admits(text(LOCAL_TIME_COLUMN))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ZoneSeries {
    pub zone: u8,
    pub temperature: Vec<Value>,
    pub required: Vec<Value>,
    pub heater_current: Vec<Value>,
    pub y_min: f64,
    pub y_max: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricSeries {
    pub name: &'static str,
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSeries {
    pub machine_id: String,
    /// `Device local Time` of each sample
    pub labels: Vec<Value>,
    pub zones: Vec<ZoneSeries>,
    pub metrics: Vec<MetricSeries>,
}

pub fn build(machine_id: &str, rows: &[FlatRecord], query: &DashboardQuery) -> DashboardSeries {
    let mut selected: Vec<&FlatRecord> = rows.iter().filter(|row| query.admits(row)).collect();
    selected.reverse();

    let zones = ZONES
        .iter()
        .map(|zone| {
            let temperature = column(&selected, &format!("ZoneTemperature4_item{}", zone));
            let required = column(&selected, &format!("requiredTemperature_item{}", zone));
            let (y_min, y_max) = y_range(&temperature, &required);
            ZoneSeries {
                zone: *zone,
                heater_current: column(&selected, &format!("heaterCurrent_item{}", zone)),
                temperature,
                required,
                y_min,
                y_max,
            }
        })
        .collect();

    DashboardSeries {
        machine_id: machine_id.to_string(),
        labels: column(&selected, LOCAL_TIME_COLUMN),
        zones,
        metrics: METRIC_COLUMNS
            .iter()
            .map(|&name| MetricSeries { name, values: column(&selected, name) })
            .collect(),
    }
}

/// one value per row, Null where a row lacks the column.
/// empty when no row has it at all.
fn column(rows: &[&FlatRecord], name: &str) -> Vec<Value> {
    if !rows.iter().any(|row| row.contains_key(name)) {
        return Vec::new();
    }
    rows.iter()
        .map(|row| row.get(name).cloned().unwrap_or(Value::Null))
        .collect()
}

/// min/max over both numeric series, or the default when either has none
fn y_range(temperature: &[Value], required: &[Value]) -> (f64, f64) {
    let numeric = |values: &[Value]| -> Vec<f64> { values.iter().filter_map(as_number).collect() };
    let temps = numeric(temperature);
    let reqs = numeric(required);
    if temps.is_empty() || reqs.is_empty() {
        return DEFAULT_Y_RANGE;
    }

    let all = temps.iter().chain(reqs.iter()).copied();
    let min = all.clone().fold(f64::INFINITY, f64::min);
    let max = all.fold(f64::NEG_INFINITY, f64::max);
    (min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(v: Value) -> FlatRecord {
        v.as_object().cloned().unwrap()
    }

    // newest first, the way the backend sorts
    fn rows() -> Vec<FlatRecord> {
        vec![
            rec(json!({"Device local Date": "2024-07-02", "Device local Time": "10:00",
                       "ZoneTemperature4_item1": 33.5, "requiredTemperature_item1": 30, "aqi": 12})),
            rec(json!({"Device local Date": "2024-07-01", "Device local Time": "22:00",
                       "ZoneTemperature4_item1": "29", "requiredTemperature_item1": 30, "aqi": 15})),
            rec(json!({"Device local Date": "2024-06-30", "Device local Time": "09:00",
                       "ZoneTemperature4_item1": 25, "requiredTemperature_item1": 31})),
        ]
    }

    #[test]
    fn test_series_are_chronological() {
        let series = build("m", &rows(), &DashboardQuery::default());
        assert_eq!(series.labels, vec![json!("09:00"), json!("22:00"), json!("10:00")]);

        let aqi = series.metrics.iter().find(|m| m.name == "aqi").unwrap();
        assert_eq!(aqi.values, vec![Value::Null, json!(15), json!(12)]);
    }

    #[test]
    fn test_zone_y_range() {
        let series = build("m", &rows(), &DashboardQuery::default());
        let zone1 = &series.zones[0];
        assert_eq!((zone1.y_min, zone1.y_max), (25.0, 33.5));
        assert!(zone1.heater_current.is_empty());

        let zone2 = &series.zones[1];
        assert!(zone2.temperature.is_empty());
        assert_eq!((zone2.y_min, zone2.y_max), DEFAULT_Y_RANGE);
    }

    #[test]
    fn test_date_and_time_filters() {
        let params = json!({"start_date": "2024-07-01", "end_time": "12:00", "start_time": ""});
        let query = DashboardQuery::from_params(params.as_object().unwrap());
        let series = build("m", &rows(), &query);
        assert_eq!(series.labels, vec![json!("10:00")]);
    }

    #[test]
    fn test_empty_input_uses_defaults() {
        let series = build("m", &[], &DashboardQuery::default());
        assert!(series.labels.is_empty());
        assert_eq!(series.zones.len(), 4);
        assert!(series.zones.iter().all(|z| (z.y_min, z.y_max) == DEFAULT_Y_RANGE));
    }
}

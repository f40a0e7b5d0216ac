use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::flatten::FlatRecord;

/// the paged telemetry collections the backend exposes per machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    MachineData,
    MachineInactive,
    ErrorData,
}

pub const ERROR_FIELDS: &[&str] = &["machineId", "arrivalTime", "zoneValue", "error", "logCounter"];

impl Dataset {
    pub const ALL: [Dataset; 3] = [Dataset::MachineData, Dataset::MachineInactive, Dataset::ErrorData];

    pub fn path(&self) -> &'static str {
        match self {
            Dataset::MachineData => "/machine/single",
            Dataset::MachineInactive => "/machineInactive/singleMachineInactiveData",
            Dataset::ErrorData => "/machine/singleErrorData",
        }
    }

    pub fn sort_value(&self) -> &'static str {
        match self {
            Dataset::ErrorData => "arrivalTime",
            _ => "timeStamp",
        }
    }

    /// projection sent with each page; empty means every field
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            Dataset::ErrorData => ERROR_FIELDS,
            _ => &[],
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            Dataset::MachineData => "machine_data",
            Dataset::MachineInactive => "machine_inactive_data",
            Dataset::ErrorData => "error_data",
        }
    }

    pub fn request<'a>(&self, machine_id: &'a str, page: u32, limit: u32) -> PageRequest<'a> {
        PageRequest {
            machine_id,
            page,
            n_filter: Map::new(),
            sort_by: "DESC",
            sort_value: self.sort_value(),
            download: 0,
            fields: self.fields().to_vec(),
            limit,
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Dataset {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "machine" | "machine_data" => Ok(Dataset::MachineData),
            "inactive" | "machine_inactive_data" => Ok(Dataset::MachineInactive),
            "errors" | "error_data" => Ok(Dataset::ErrorData),
            other => Err(anyhow::anyhow!("unknown dataset: {}", other)),
        }
    }
}

/// body of one paged telemetry request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest<'a> {
    pub machine_id: &'a str,
    pub page: u32,
    pub n_filter: Map<String, Value>,
    pub sort_by: &'static str,
    pub sort_value: &'static str,
    pub download: u8,
    pub fields: Vec<&'a str>,
    pub limit: u32,
}

#[derive(Debug, Serialize)]
pub struct SignInRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// firmware (FOTA) vs configuration (COTA) over-the-air history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    Fota,
    Cota,
}

impl UpdateKind {
    pub fn path(&self) -> &'static str {
        match self {
            UpdateKind::Fota => "/fota/history",
            UpdateKind::Cota => "/device/cotaHistory",
        }
    }
}

/// `data.result` when `data` is an object, `data` itself when it's a list
pub fn extract_records(body: &Value) -> Vec<Value> {
    match body.get("data") {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::Object(obj)) => obj
            .get("result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// response shape expected by the DataTables server-side mode
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataTablesResponse {
    pub draw: Value,
    pub records_total: usize,
    pub records_filtered: usize,
    pub data: Vec<FlatRecord>,
}

impl DataTablesResponse {
    pub fn empty(draw: Value) -> Self {
        Self { draw, records_total: 0, records_filtered: 0, data: Vec::new() }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DeviceOverview {
    pub machine_id: String,
    pub zone_name: String,
    pub device_info: Option<FlatRecord>,
    pub fota_history: Vec<FlatRecord>,
    pub cota_history: Vec<FlatRecord>,
}

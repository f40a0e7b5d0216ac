//! ==============================================================================
//! api.rs - smart-mattress backend client
//! ==============================================================================
//!
//! purpose:
//!     signs in to the telemetry backend and exposes every endpoint the tools
//!     need: paged telemetry, the machine list, device details, over-the-air
//!     update history and zone (group) lookup.
//!
//! flow:
//!     ApiClient::sign_in() -> Session (carries the x-access-token)
//!     Session::fetch_all(dataset, machine) -> paginate.rs loop -> FetchOutcome
//!
//! relationships:
//!     - used by: main.rs (cli modes), export.rs, report.rs, server.rs
//!     - uses: paginate.rs (page loop), domain.rs (wire types), timefmt.rs
//!
//! ==============================================================================

use crate::config::{ApiConfig, FetchConfig};
use crate::domain::{
    extract_records, Dataset, DeviceOverview, PageRequest, SignInRequest, UpdateKind,
};
use crate::flatten::FlatRecord;
use crate::paginate::{paginate, FetchOutcome};
use crate::timefmt::{epoch_from_value, LocalClock};

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;

pub const TOKEN_HEADER: &str = "x-access-token";

const UPDATE_STATUSES: &[&str] = &["Completed", "Pending", "Cancelled"];
const UPDATE_HISTORY_LIMIT: u32 = 3000;
const GROUP_PAGE_LIMIT: u32 = 10;

// ==============================================================================
// unauthenticated client
// ==============================================================================

/// Clone-able handle; the inner reqwest client is a shared connection pool.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    email: String,
    password: String,
    page_limit: u32,
    max_pages: Option<u32>,
    clock: LocalClock,
}

impl ApiClient {
    pub fn new(api: &ApiConfig, fetch: &FetchConfig, clock: LocalClock) -> Result<Self> {
        if api.accept_invalid_certs {
            tracing::warn!("[API] TLS certificate verification is disabled");
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(fetch.timeout_seconds))
            .danger_accept_invalid_certs(api.accept_invalid_certs)
            .build()
            .context("failed to build http client")?;

        Ok(Self {
            http,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            email: api.email.clone(),
            password: api.password.clone(),
            page_limit: fetch.page_limit,
            max_pages: fetch.max_pages,
            clock,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST the configured credentials and keep the returned access token
    pub async fn sign_in(&self) -> Result<Session> {
        if self.email.is_empty() || self.password.is_empty() {
            bail!("no credentials configured (set api.email/api.password or TELEMETRY_EMAIL/TELEMETRY_PASSWORD)");
        }

        let body: Value = self
            .http
            .post(self.url("/user/signIn"))
            .json(&SignInRequest { email: &self.email, password: &self.password })
            .send()
            .await
            .context("sign-in request failed")?
            .error_for_status()
            .context("sign-in rejected")?
            .json()
            .await
            .context("sign-in response was not json")?;

        let token = body
            .get("accessToken")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| anyhow!("sign-in response carried no accessToken"))?;

        tracing::info!("[API] Signed in as {}", self.email);
        Ok(Session { api: self.clone(), token: token.to_string() })
    }
}

// ==============================================================================
// authenticated session
// ==============================================================================

#[derive(Clone)]
pub struct Session {
    api: ApiClient,
    token: String,
}

impl Session {
    pub fn clock(&self) -> &LocalClock {
        &self.api.clock
    }

    pub fn page_limit(&self) -> u32 {
        self.api.page_limit
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value> {
        self.api
            .http
            .post(self.api.url(path))
            .header(TOKEN_HEADER, &self.token)
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {} failed", path))?
            .error_for_status()
            .with_context(|| format!("POST {} returned an error status", path))?
            .json()
            .await
            .with_context(|| format!("POST {} returned invalid json", path))
    }

    async fn get(&self, path: &str) -> Result<Value> {
        self.api
            .http
            .get(self.api.url(path))
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await
            .with_context(|| format!("GET {} failed", path))?
            .error_for_status()
            .with_context(|| format!("GET {} returned an error status", path))?
            .json()
            .await
            .with_context(|| format!("GET {} returned invalid json", path))
    }

    /// one page of records for an arbitrary request body
    pub async fn fetch_page(&self, path: &str, request: &PageRequest<'_>) -> Result<Vec<Value>> {
        let body = self.post(path, request).await?;
        Ok(extract_records(&body))
    }

    /// every page of `dataset` for one machine
    pub async fn fetch_all(&self, dataset: Dataset, machine_id: &str) -> FetchOutcome<Value> {
        tracing::info!("[FETCH] {} for {}", dataset, machine_id);
        let limit = self.api.page_limit;

        let outcome = paginate(
            |page| {
                let request = dataset.request(machine_id, page, limit);
                async move { self.fetch_page(dataset.path(), &request).await }
            },
            self.api.max_pages,
        )
        .await;

        tracing::info!(
            "[FETCH] {} for {}: {} records over {} pages{}",
            dataset,
            machine_id,
            outcome.records.len(),
            outcome.pages,
            if outcome.aborted { " (incomplete)" } else { "" }
        );
        outcome
    }

    /// a single page; failures are logged and yield no records
    pub async fn fetch_single_page(&self, dataset: Dataset, machine_id: &str, page: u32) -> Vec<Value> {
        let request = dataset.request(machine_id, page, self.api.page_limit);
        match self.fetch_page(dataset.path(), &request).await {
            Ok(records) => records,
            Err(e) => {
                tracing::error!("[FETCH] {} page {} for {}: {:#}", dataset, page, machine_id, e);
                Vec::new()
            }
        }
    }

    pub async fn machine_ids(&self) -> Result<Vec<String>> {
        let body = self.get("/machine/allMachineId").await?;
        let ids = match body.get("data") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Object(obj) => obj.get("machineId").and_then(Value::as_str).map(str::to_string),
                    _ => None,
                })
                .collect(),
            _ => bail!("machine id list missing from response"),
        };
        Ok(ids)
    }

    /// `ids` when any are given, otherwise every machine on the account
    pub async fn machine_ids_or_all(&self, ids: &[String]) -> Result<Vec<String>> {
        if !ids.is_empty() {
            return Ok(ids.to_vec());
        }
        let all = self.machine_ids().await?;
        tracing::info!("[API] No machine given, using all {} on the account", all.len());
        Ok(all)
    }

    /// the current detail record for a machine (the `isLatest` one, else the
    /// highest `Id`), with release and manufacture dates made readable
    pub async fn device_info(&self, machine_id: &str) -> Result<Option<FlatRecord>> {
        let body = self
            .post("/machine/singleMachineDetails", &json!({ "machineId": machine_id }))
            .await?;
        let records = extract_records(&body);

        let Some(mut latest) = pick_latest(&records) else {
            return Ok(None);
        };
        for field in ["fwReleaseDate", "manufactureDate"] {
            let rendered = latest
                .get(field)
                .and_then(epoch_from_value)
                .filter(|e| *e != 0.0)
                .and_then(|e| self.api.clock.minutes(e));
            if let Some(rendered) = rendered {
                latest.insert(field.to_string(), Value::String(rendered));
            }
        }
        Ok(Some(latest))
    }

    /// FOTA or COTA history entries belonging to `machine_id`
    pub async fn update_history(&self, kind: UpdateKind, machine_id: &str) -> Result<Vec<FlatRecord>> {
        let payload = json!({
            "page": 1,
            "limit": UPDATE_HISTORY_LIMIT,
            "status": UPDATE_STATUSES,
            "sortBy": "DESC",
            "sortValue": "releasedId",
            "machineId": machine_id,
        });
        let body = self.post(kind.path(), &payload).await?;

        let entries = extract_records(&body)
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(obj) => Some(obj),
                _ => None,
            })
            .filter(|obj| obj.get("machineId").and_then(Value::as_str) == Some(machine_id))
            .map(|mut obj| {
                for field in ["releasedAt", "modifiedAt"] {
                    let converted = obj
                        .get(field)
                        .and_then(Value::as_str)
                        .and_then(|iso| self.api.clock.iso_to_local(iso).ok());
                    if let Some(local) = converted {
                        obj.insert(field.to_string(), Value::String(local));
                    }
                }
                obj
            })
            .collect();
        Ok(entries)
    }

    /// name of the zone whose grouping lists `machine_id`, or "" when none does
    pub async fn zone_name(&self, machine_id: &str) -> Result<String> {
        let body = self
            .post("/group", &json!({ "page": 1, "limit": GROUP_PAGE_LIMIT }))
            .await
            .context("failed to list groups")?;

        for group in extract_records(&body) {
            let Some(region_id) = group.get("regionId").filter(|r| !r.is_null()) else {
                continue;
            };
            let zone_name = group.get("zoneName").and_then(Value::as_str).unwrap_or_default();

            let grouping = match self
                .post("/group/viewGrouping", &json!({ "regionId": region_id }))
                .await
            {
                Ok(body) => extract_records(&body),
                Err(e) => {
                    tracing::warn!("[API] Grouping for region {} unavailable: {:#}", region_id, e);
                    continue;
                }
            };

            if grouping
                .iter()
                .any(|entry| entry.get("machineId").and_then(Value::as_str) == Some(machine_id))
            {
                tracing::debug!("[API] {} found in region {} ({})", machine_id, region_id, zone_name);
                return Ok(zone_name.to_string());
            }
        }

        tracing::debug!("[API] {} not found in any region", machine_id);
        Ok(String::new())
    }

    /// device info, update history and zone in one value. a part that fails
    /// is logged and left empty so the rest still renders.
    pub async fn device_overview(&self, machine_id: &str) -> DeviceOverview {
        let device_info = self.device_info(machine_id).await.unwrap_or_else(|e| {
            tracing::error!("[API] Device info for {}: {:#}", machine_id, e);
            None
        });
        let fota_history = self.history_or_empty(UpdateKind::Fota, machine_id).await;
        let cota_history = self.history_or_empty(UpdateKind::Cota, machine_id).await;
        let zone_name = self.zone_name(machine_id).await.unwrap_or_else(|e| {
            tracing::error!("[API] Zone lookup for {}: {:#}", machine_id, e);
            String::new()
        });

        DeviceOverview {
            machine_id: machine_id.to_string(),
            zone_name,
            device_info,
            fota_history,
            cota_history,
        }
    }

    async fn history_or_empty(&self, kind: UpdateKind, machine_id: &str) -> Vec<FlatRecord> {
        self.update_history(kind, machine_id).await.unwrap_or_else(|e| {
            tracing::error!("[API] {:?} history for {}: {:#}", kind, machine_id, e);
            Vec::new()
        })
    }
}

/// `isLatest == true` wins; otherwise the record with the largest `Id`
fn pick_latest(records: &[Value]) -> Option<FlatRecord> {
    let objects: Vec<&serde_json::Map<String, Value>> =
        records.iter().filter_map(Value::as_object).collect();

    objects
        .iter()
        .find(|obj| obj.get("isLatest").and_then(Value::as_bool) == Some(true))
        .or_else(|| {
            objects
                .iter()
                .max_by_key(|obj| obj.get("Id").and_then(Value::as_i64).unwrap_or(0))
        })
        .map(|obj| (*obj).clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_latest_prefers_flag() {
        let records = vec![
            json!({"Id": 9, "isLatest": false}),
            json!({"Id": 2, "isLatest": true}),
        ];
        assert_eq!(pick_latest(&records).unwrap()["Id"], json!(2));
    }

    #[test]
    fn test_pick_latest_falls_back_to_highest_id() {
        let records = vec![json!({"Id": 3}), json!({"Id": 11}), json!("noise")];
        assert_eq!(pick_latest(&records).unwrap()["Id"], json!(11));
        assert!(pick_latest(&[]).is_none());
    }

    #[tokio::test]
    async fn test_sign_in_requires_credentials() {
        let client = ApiClient::new(
            &ApiConfig::default(),
            &FetchConfig::default(),
            LocalClock::default(),
        )
        .unwrap();
        let err = client.sign_in().await.err().unwrap();
        assert!(err.to_string().contains("no credentials"));
    }
}

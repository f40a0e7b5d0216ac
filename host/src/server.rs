//! ==============================================================================
//! server.rs - json api over the flattened telemetry
//! ==============================================================================
//!
//! purpose:
//!     serves the same flattened tables the exporter writes, for a browser
//!     front-end: raw dataset dumps, a DataTables lazy-loading endpoint,
//!     chart series and a device overview.
//!
//! routes:
//!     GET       /health
//!     GET       /api/machines
//!     GET       /api/records/:dataset?machine_id=
//!     GET|POST  /api/machine_data           (DataTables server-side mode)
//!     GET       /api/dashboard?machine_id=&start_date=&end_date=&start_time=&end_time=
//!     GET       /api/device/:machine_id
//!
//! caching:
//!     every backend walk goes through cache.rs, keyed by dataset + machine.
//!     a miss signs in fresh, so an expired token never outlives an entry.
//!
//! ==============================================================================

use anyhow::{anyhow, bail, Result};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

use crate::api::ApiClient;
use crate::cache::{CachePolicy, TimedCache};
use crate::config::CacheConfig;
use crate::dashboard::{self, DashboardQuery};
use crate::domain::{DataTablesResponse, Dataset, DeviceOverview};
use crate::export::flattener_for;
use crate::filter::{params_from_pairs, TableQuery};
use crate::flatten::FlatRecord;

const MACHINES_KEY: &str = "machines";

// ==============================================================================
// shared state
// ==============================================================================

/// backend fetch counters, read by /health
#[derive(Clone, Default, Serialize)]
pub struct FetchStats {
    pub fetches: u64,
    pub failures: u64,
    /// unix timestamp (ms) of the last successful backend walk
    pub last_fetch_ms: u64,
}

#[derive(Clone)]
pub struct ServerState {
    api: ApiClient,
    records: Arc<TimedCache<Arc<Vec<FlatRecord>>>>,
    machines: Arc<TimedCache<Arc<Vec<String>>>>,
    stats: Arc<RwLock<FetchStats>>,
}

impl ServerState {
    pub fn new(api: ApiClient, cache: &CacheConfig) -> Self {
        let policy = CachePolicy::from(cache);
        Self {
            api,
            records: TimedCache::new(policy),
            machines: TimedCache::new(policy),
            stats: Arc::new(RwLock::new(FetchStats::default())),
        }
    }

    /// flattened records of one dataset, from cache or a full backend walk
    pub async fn records(&self, dataset: Dataset, machine_id: &str) -> Result<Arc<Vec<FlatRecord>>> {
        let key = format!("{}:{}", dataset.slug(), machine_id);
        let api = self.api.clone();
        let stats = Arc::clone(&self.stats);
        let machine_id = machine_id.to_string();

        self.records
            .get_or_fetch(&key, move || async move {
                let loaded = load_records(&api, dataset, &machine_id).await;
                record_fetch(&stats, loaded.is_ok()).await;
                loaded
            })
            .await
    }

    pub async fn machine_ids(&self) -> Result<Arc<Vec<String>>> {
        let api = self.api.clone();
        let stats = Arc::clone(&self.stats);

        self.machines
            .get_or_fetch(MACHINES_KEY, move || async move {
                let loaded = load_machine_ids(&api).await;
                record_fetch(&stats, loaded.is_ok()).await;
                loaded
            })
            .await
    }
}

async fn load_records(api: &ApiClient, dataset: Dataset, machine_id: &str) -> Result<Arc<Vec<FlatRecord>>> {
    let session = api.sign_in().await?;
    let outcome = session.fetch_all(dataset, machine_id).await;
    if outcome.aborted && outcome.records.is_empty() {
        bail!("no {} could be fetched for {}", dataset, machine_id);
    }
    let flattener = flattener_for(dataset, &session);
    Ok(Arc::new(flattener.records(&outcome.records)))
}

async fn load_machine_ids(api: &ApiClient) -> Result<Arc<Vec<String>>> {
    let session = api.sign_in().await?;
    Ok(Arc::new(session.machine_ids().await?))
}

async fn record_fetch(stats: &RwLock<FetchStats>, ok: bool) {
    let mut stats = stats.write().await;
    stats.fetches += 1;
    if ok {
        stats.last_fetch_ms = chrono::Utc::now().timestamp_millis().max(0) as u64;
    } else {
        stats.failures += 1;
    }
}

// ==============================================================================
// errors
// ==============================================================================

/// handler error rendered as `{"status": "error", "message": ...}`
pub struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl AppError {
    fn bad_request(message: &str) -> Self {
        Self { status: StatusCode::BAD_REQUEST, error: anyhow!(message.to_string()) }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("[SERVER] {:#}", self.error);
        }
        let body = Json(json!({ "status": "error", "message": format!("{:#}", self.error) }));
        (self.status, body).into_response()
    }
}

/// backend failures surface as 502: the fault is upstream of this server
impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        Self { status: StatusCode::BAD_GATEWAY, error: err.into() }
    }
}

// ==============================================================================
// web server
// ==============================================================================

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/machines", get(machines_handler))
        .route("/api/records/:dataset", get(records_handler))
        .route("/api/machine_data", get(machine_data_get).post(machine_data_post))
        .route("/api/dashboard", get(dashboard_handler))
        .route("/api/device/:machine_id", get(device_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_server(state: ServerState, bind: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("[SERVER] Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health_handler(State(state): State<ServerState>) -> Json<Value> {
    let stats = state.stats.read().await.clone();
    Json(json!({ "status": "ok", "backend": stats }))
}

async fn machines_handler(State(state): State<ServerState>) -> Result<Json<Vec<String>>, AppError> {
    let ids = state.machine_ids().await?;
    Ok(Json(ids.as_ref().clone()))
}

async fn records_handler(
    State(state): State<ServerState>,
    Path(dataset): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<FlatRecord>>, AppError> {
    let dataset: Dataset = dataset
        .parse()
        .map_err(|e: anyhow::Error| AppError { status: StatusCode::NOT_FOUND, error: e })?;
    let machine_id = machine_id_param(&params)?;

    let rows = state.records(dataset, &machine_id).await?;
    Ok(Json(rows.as_ref().clone()))
}

async fn machine_data_get(
    State(state): State<ServerState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<DataTablesResponse>, AppError> {
    table_page(&state, params_from_pairs(params)).await
}

/// DataTables posts its request as a json object; anything else counts as empty
async fn machine_data_post(
    State(state): State<ServerState>,
    body: Bytes,
) -> Result<Json<DataTablesResponse>, AppError> {
    let params: Map<String, Value> = serde_json::from_slice(&body).unwrap_or_default();
    table_page(&state, params).await
}

async fn table_page(state: &ServerState, params: Map<String, Value>) -> Result<Json<DataTablesResponse>, AppError> {
    let query = TableQuery::from_params(&params);
    let Some(machine_id) = query.machine_id.as_deref() else {
        return Ok(Json(DataTablesResponse::empty(query.draw)));
    };

    let rows = state.records(Dataset::MachineData, machine_id).await?;
    let records_total = rows.len();
    let filtered = query.filters.apply(rows.as_ref().clone());

    Ok(Json(DataTablesResponse {
        records_total,
        records_filtered: filtered.len(),
        data: query.page(&filtered).to_vec(),
        draw: query.draw,
    }))
}

async fn dashboard_handler(
    State(state): State<ServerState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<dashboard::DashboardSeries>, AppError> {
    let query = DashboardQuery::from_params(&params_from_pairs(params));
    let Some(machine_id) = query.machine_id.as_deref() else {
        return Err(AppError::bad_request("Machine ID not provided"));
    };

    let rows = state.records(Dataset::MachineData, machine_id).await?;
    Ok(Json(dashboard::build(machine_id, &rows, &query)))
}

async fn device_handler(
    State(state): State<ServerState>,
    Path(machine_id): Path<String>,
) -> Result<Json<DeviceOverview>, AppError> {
    let session = state.api.sign_in().await?;
    Ok(Json(session.device_overview(&machine_id).await))
}

fn machine_id_param(params: &HashMap<String, String>) -> Result<String, AppError> {
    params
        .get("machine_id")
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::bad_request("Machine ID not provided"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_machine_id_param() {
        let mut params = HashMap::new();
        assert!(machine_id_param(&params).is_err());
        params.insert("machine_id".to_string(), "  ".to_string());
        assert!(machine_id_param(&params).is_err());
        params.insert("machine_id".to_string(), " AA:BB ".to_string());
        assert_eq!(machine_id_param(&params).ok().as_deref(), Some("AA:BB"));
    }

    #[test]
    fn test_app_error_status() {
        let resp = AppError::bad_request("nope").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let upstream: AppError = anyhow!("backend down").into();
        assert_eq!(upstream.into_response().status(), StatusCode::BAD_GATEWAY);
    }
}

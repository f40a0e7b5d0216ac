//! end-to-end checks against an in-process fake of the telemetry backend.

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};

use mattress_telemetry::api::{ApiClient, Session};
use mattress_telemetry::config::{ApiConfig, CacheConfig, ExportConfig, ExportFormat, FetchConfig};
use mattress_telemetry::domain::{Dataset, UpdateKind};
use mattress_telemetry::export::{export_devices, export_machine, flattener_for};
use mattress_telemetry::report;
use mattress_telemetry::server::{router, ServerState};
use mattress_telemetry::timefmt::LocalClock;

const TOKEN: &str = "test-token";
const EMAIL: &str = "ops@example.com";
const PASSWORD: &str = "secret";

// 2024-07-01 12:00:00 UTC, 14:00 in Berlin
const NOON: i64 = 1_719_835_200;

// every dataset route answers 500 for this machine
const BROKEN: &str = "BAD";

// ==============================================================================
// fake backend
// ==============================================================================

fn authorized(headers: &HeaderMap) -> bool {
    headers.get("x-access-token").and_then(|v| v.to_str().ok()) == Some(TOKEN)
}

fn envelope(result: Value) -> Response {
    Json(json!({ "data": { "result": result } })).into_response()
}

async fn sign_in(Json(body): Json<Value>) -> Response {
    if body["email"] == EMAIL && body["password"] == PASSWORD {
        Json(json!({ "accessToken": TOKEN })).into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

async fn machine_data(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if body["machineId"] == BROKEN {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    if body["machineId"] != "AA" {
        return envelope(json!([]));
    }
    match body["page"].as_u64() {
        Some(1) => envelope(json!([
            {"Id": 5, "timeStamp": NOON + 7200, "aqi": 8},
            {"Id": 4, "timeStamp": NOON + 3600, "aqi": 12,
             "ZoneTemperature4": [31.5, 29], "requiredTemperature": [30, 31]},
        ])),
        Some(2) => envelope(json!([{"Id": 3, "timeStamp": NOON, "aqi": 20}])),
        _ => envelope(json!([])),
    }
}

async fn error_data(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if body["machineId"] == BROKEN {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    if body["machineId"] != "AA" {
        return envelope(json!([]));
    }
    match body["page"].as_u64() {
        Some(1) => envelope(json!([
            {"machineId": "AA", "arrivalTime": NOON, "error": 21, "logCounter": 1}
        ])),
        _ => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn inactive_data(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if body["machineId"] == BROKEN {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    match (body["machineId"].as_str(), body["page"].as_u64()) {
        (Some("AA"), Some(1)) => envelope(json!([
            {"Id": 9, "timeStamp": NOON - 3600, "heaterCurrent": [0, 0, 0, 0], "busVoltage": 24}
        ])),
        _ => envelope(json!([])),
    }
}

async fn machine_details(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if body["machineId"] != "AA" {
        return envelope(json!([]));
    }
    envelope(json!([
        {"Id": 40, "machineId": "AA", "fwVersion": "1.3", "isLatest": false,
         "fwReleaseDate": 0, "manufactureDate": 0},
        {"Id": 12, "machineId": "AA", "fwVersion": "1.4", "isLatest": true,
         "fwReleaseDate": NOON * 1000, "manufactureDate": 0},
    ]))
}

fn update_entry(machine_id: &str, released_id: u32) -> Value {
    json!({
        "machineId": machine_id,
        "releasedId": released_id,
        "releasedAt": "2024-07-01T12:00:00.000Z",
        "modifiedAt": "2024-01-01T08:30:00Z",
        "status": "completed"
    })
}

// FOTA answers with a bare list under `data`
async fn fota_history(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({ "data": [update_entry("AA", 3), update_entry("BB", 2), update_entry("AA", 1)] }))
        .into_response()
}

// COTA wraps the list in `data.result`
async fn cota_history(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    envelope(json!([update_entry("BB", 5), update_entry("AA", 4)]))
}

async fn groups(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    envelope(json!([
        {"regionId": null, "zoneName": "Unassigned"},
        {"regionId": 7, "zoneName": "Ward A"},
        {"regionId": 8, "zoneName": "Ward B"},
    ]))
}

// region 7 is down; region 8 lists AA
async fn view_grouping(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match body["regionId"].as_u64() {
        Some(7) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        Some(8) => envelope(json!([{"machineId": "CC"}, {"machineId": "AA"}])),
        _ => envelope(json!([])),
    }
}

async fn machine_ids(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({ "data": ["AA", "BB"] })).into_response()
}

fn fake_backend() -> Router {
    Router::new()
        .route("/user/signIn", post(sign_in))
        .route("/machine/single", post(machine_data))
        .route("/machine/singleErrorData", post(error_data))
        .route("/machineInactive/singleMachineInactiveData", post(inactive_data))
        .route("/machine/allMachineId", get(machine_ids))
        .route("/machine/singleMachineDetails", post(machine_details))
        .route("/fota/history", post(fota_history))
        .route("/device/cotaHistory", post(cota_history))
        .route("/group", post(groups))
        .route("/group/viewGrouping", post(view_grouping))
}

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn client(base_url: &str, password: &str) -> ApiClient {
    let api = ApiConfig {
        base_url: base_url.to_string(),
        email: EMAIL.to_string(),
        password: password.to_string(),
        accept_invalid_certs: false,
    };
    let fetch = FetchConfig { page_limit: 2, timeout_seconds: 5, max_pages: None };
    ApiClient::new(&api, &fetch, LocalClock::default()).unwrap()
}

// ==============================================================================
// client
// ==============================================================================

#[tokio::test]
async fn test_sign_in_rejects_bad_password() {
    let base = spawn(fake_backend()).await;
    assert!(client(&base, "wrong").sign_in().await.is_err());
    assert!(client(&base, PASSWORD).sign_in().await.is_ok());
}

#[tokio::test]
async fn test_fetch_all_walks_until_empty_page() {
    let base = spawn(fake_backend()).await;
    let session = client(&base, PASSWORD).sign_in().await.unwrap();

    let outcome = session.fetch_all(Dataset::MachineData, "AA").await;
    assert_eq!(outcome.records.len(), 3);
    assert_eq!(outcome.pages, 2);
    assert!(!outcome.aborted);

    let rows = flattener_for(Dataset::MachineData, &session).records(&outcome.records);
    assert_eq!(rows[2]["Device local Date"], json!("2024-07-01"));
    assert_eq!(rows[2]["Device local Time"], json!("14:00"));
    assert_eq!(rows[1]["ZoneTemperature4_item1"], json!(31.5));
    assert!(!rows[0].contains_key("timeStamp"));
}

#[tokio::test]
async fn test_failed_page_keeps_earlier_records() {
    let base = spawn(fake_backend()).await;
    let session = client(&base, PASSWORD).sign_in().await.unwrap();

    let outcome = session.fetch_all(Dataset::ErrorData, "AA").await;
    assert_eq!(outcome.records.len(), 1);
    assert!(outcome.aborted);

    let rows = flattener_for(Dataset::ErrorData, &session).records(&outcome.records);
    assert_eq!(rows[0]["Error Name"], json!("ERR_HEATER1_OPEN"));
    assert_eq!(rows[0]["Arrival Time"], json!("14:00"));
}

#[tokio::test]
async fn test_single_page_failure_is_empty() {
    let base = spawn(fake_backend()).await;
    let session = client(&base, PASSWORD).sign_in().await.unwrap();

    assert!(session.fetch_single_page(Dataset::MachineInactive, BROKEN, 1).await.is_empty());
    assert_eq!(session.fetch_single_page(Dataset::MachineData, "AA", 2).await.len(), 1);
    assert_eq!(session.machine_ids().await.unwrap(), vec!["AA", "BB"]);
}

// ==============================================================================
// device details
// ==============================================================================

async fn signed_in() -> Session {
    let base = spawn(fake_backend()).await;
    client(&base, PASSWORD).sign_in().await.unwrap()
}

fn temp_export(name: &str) -> ExportConfig {
    let dir = std::env::temp_dir().join(format!("telemetry-{}-{}", name, std::process::id()));
    ExportConfig { output_dir: dir, format: ExportFormat::Csv, scale_milli_units: true }
}

#[tokio::test]
async fn test_device_info_picks_latest_and_renders_dates() {
    let session = signed_in().await;

    let info = session.device_info("AA").await.unwrap().unwrap();
    assert_eq!(info["Id"], json!(12));
    assert_eq!(info["fwVersion"], json!("1.4"));
    assert_eq!(info["fwReleaseDate"], json!("2024-07-01 14:00"));
    // a zero date means "unknown" and stays as sent
    assert_eq!(info["manufactureDate"], json!(0));

    assert!(session.device_info("ZZ").await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_history_filters_and_converts() {
    let session = signed_in().await;

    let fota = session.update_history(UpdateKind::Fota, "AA").await.unwrap();
    assert_eq!(fota.len(), 2);
    assert_eq!(fota[0]["releasedId"], json!(3));
    assert_eq!(fota[0]["releasedAt"], json!("2024-07-01 14:00:00"));
    assert_eq!(fota[0]["modifiedAt"], json!("2024-01-01 09:30:00"));

    let cota = session.update_history(UpdateKind::Cota, "AA").await.unwrap();
    assert_eq!(cota.len(), 1);
    assert_eq!(cota[0]["releasedId"], json!(4));

    assert!(session.update_history(UpdateKind::Cota, "ZZ").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_zone_name_skips_unavailable_region() {
    let session = signed_in().await;

    assert_eq!(session.zone_name("AA").await.unwrap(), "Ward B");
    assert_eq!(session.zone_name("ZZ").await.unwrap(), "");
}

#[tokio::test]
async fn test_device_export_covers_every_machine() {
    let session = signed_in().await;
    let config = temp_export("devices");

    let ids = session.machine_ids_or_all(&[]).await.unwrap();
    assert_eq!(ids, vec!["AA", "BB"]);
    let given = vec!["BB".to_string()];
    assert_eq!(session.machine_ids_or_all(&given).await.unwrap(), given);

    let written = export_devices(&session, &ids, &config).await.unwrap();
    let dir = &config.output_dir;
    // BB has no details but does have update history
    assert_eq!(
        written,
        vec![
            dir.join("machine_AA_device_info.csv"),
            dir.join("machine_AA_fota_history.csv"),
            dir.join("machine_AA_cota_history.csv"),
            dir.join("machine_BB_fota_history.csv"),
            dir.join("machine_BB_cota_history.csv"),
        ]
    );

    std::fs::remove_dir_all(dir).ok();
}

// ==============================================================================
// exports and reports
// ==============================================================================

#[tokio::test]
async fn test_export_machine_writes_every_dataset() {
    let session = signed_in().await;
    let config = temp_export("machine");

    let written = export_machine(&session, "AA", &config).await.unwrap();
    let dir = &config.output_dir;
    assert_eq!(
        written,
        vec![
            dir.join("machine_AA_machine_data.csv"),
            dir.join("machine_AA_machine_inactive_data.csv"),
            dir.join("machine_AA_error_data.csv"),
        ]
    );

    let machine_csv = std::fs::read_to_string(&written[0]).unwrap();
    assert_eq!(machine_csv.lines().count(), 4);
    assert!(machine_csv.lines().next().unwrap().starts_with("Id,Device local Date,Device local Time,aqi"));

    // the error log's second page fails; the first page still lands
    let error_csv = std::fs::read_to_string(&written[2]).unwrap();
    assert_eq!(error_csv.lines().count(), 2);
    assert!(error_csv.contains("ERR_HEATER1_OPEN"));

    // a machine with nothing anywhere writes nothing
    assert!(export_machine(&session, "ZZ", &config).await.unwrap().is_empty());

    std::fs::remove_dir_all(dir).ok();
}

#[tokio::test]
async fn test_error_report_skips_failing_machine() {
    let session = signed_in().await;
    let today = chrono::NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
    let machines = vec!["AA".to_string(), BROKEN.to_string()];

    let daily = report::build(&session, &machines, today).await;
    assert_eq!(daily.failed_machines, vec![BROKEN.to_string()]);
    assert_eq!(daily.lines.len(), 1);
    assert!(daily.lines[0].contains("Code 21 - ERR_HEATER1_OPEN"));
    assert!(daily.lines[0].contains("Machine ID: AA"));

    let next_day = today.succ_opt().unwrap();
    assert!(report::build(&session, &machines[..1], next_day).await.is_empty());
}

// ==============================================================================
// json api
// ==============================================================================

async fn spawn_api() -> String {
    let backend = spawn(fake_backend()).await;
    let state = ServerState::new(client(&backend, PASSWORD), &CacheConfig::default());
    spawn(router(state)).await
}

#[tokio::test]
async fn test_machine_data_table_filters_and_pages() {
    let api = spawn_api().await;
    let http = reqwest::Client::new();

    let body: Value = http
        .post(format!("{}/api/machine_data", api))
        .json(&json!({"draw": 2, "machine_id": "AA", "start": 0, "length": 1, "aqi_min": "10"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["draw"], json!(2));
    assert_eq!(body["recordsTotal"], json!(3));
    assert_eq!(body["recordsFiltered"], json!(2));
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["Id"], json!(4));
    assert_eq!(body["data"][0]["zone1_diff"], json!(1.5));

    let empty: Value = http
        .get(format!("{}/api/machine_data?draw=7", api))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(empty["recordsTotal"], json!(0));
}

#[tokio::test]
async fn test_dashboard_series() {
    let api = spawn_api().await;

    let missing = reqwest::get(format!("{}/api/dashboard", api)).await.unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::BAD_REQUEST);

    let series: Value = reqwest::get(format!("{}/api/dashboard?machine_id=AA", api))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(series["labels"], json!(["14:00", "15:00", "16:00"]));
    assert_eq!(series["zones"][0]["y_min"], json!(30.0));
    assert_eq!(series["zones"][0]["y_max"], json!(31.5));
}

#[tokio::test]
async fn test_records_route_reports_upstream_failure() {
    let api = spawn_api().await;

    let failed = reqwest::get(format!("{}/api/records/inactive?machine_id={}", api, BROKEN)).await.unwrap();
    assert_eq!(failed.status(), reqwest::StatusCode::BAD_GATEWAY);
    let body: Value = failed.json().await.unwrap();
    assert_eq!(body["status"], json!("error"));

    let unknown = reqwest::get(format!("{}/api/records/nope?machine_id=AA", api)).await.unwrap();
    assert_eq!(unknown.status(), reqwest::StatusCode::NOT_FOUND);

    let machines: Value = reqwest::get(format!("{}/api/machines", api)).await.unwrap().json().await.unwrap();
    assert_eq!(machines, json!(["AA", "BB"]));
}

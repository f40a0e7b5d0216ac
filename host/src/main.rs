//! ==============================================================================
//! main.rs - telemetry tool entry point
//! ==============================================================================
//!
//! purpose:
//!     command line front for the telemetry library. every mode is the same
//!     pipeline with a different tail: sign in, page through the backend,
//!     flatten, then export / report / serve.
//!
//! modes:
//!     export [machine-id ...]      machine data, inactive data, error log -> files
//!     device [machine-id ...]      device info, FOTA and COTA history -> files
//!     machines                     list every machine id on the account
//!     error-report [machine-id ...] today's errors as a text report
//!     serve                        json api on server.bind
//!     restructure <file>           dict-literal dump -> table file
//!
//!     with no mode the tool asks for a machine id and runs `export`.
//!
//! architecture:
//!
//!     ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//!     │  config.rs   │───►│   api.rs     │───►│ paginate.rs  │
//!     │ (toml + env) │    │ (sign in)    │    │ (page loop)  │
//!     └──────────────┘    └──────────────┘    └──────┬───────┘
//!                                                    │ raw json
//!                                             ┌──────┴───────┐
//!                                             │  flatten.rs  │
//!                                             │ (+timefmt)   │
//!                                             └──────┬───────┘
//!                           ┌────────────────────────┼─────────────────┐
//!                           ▼                        ▼                 ▼
//!                    ┌────────────┐          ┌─────────────┐    ┌────────────┐
//!                    │ export.rs  │          │  server.rs  │    │ report.rs  │
//!                    │ (csv/json) │          │ (axum+cache)│    │ (text)     │
//!                    └────────────┘          └─────────────┘    └────────────┘
//!
//! ==============================================================================

use anyhow::{bail, Context, Result};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use mattress_telemetry::api::{ApiClient, Session};
use mattress_telemetry::config::AppConfig;
use mattress_telemetry::export;
use mattress_telemetry::report;
use mattress_telemetry::server::{self, ServerState};
use mattress_telemetry::timefmt::LocalClock;

const USAGE: &str = "\
usage: mattress-telemetry [mode] [args]

modes:
  export [machine-id ...]        export machine, inactive and error data
  device [machine-id ...]        export device info and FOTA/COTA history
                                 (every machine on the account when none given)
  machines                       list machine ids
  error-report [machine-id ...]  report errors that arrived today (UTC)
  serve                          start the json api
  restructure <file>             turn a dict-literal dump into a table
  help                           show this message

with no mode, prompts for a machine id and exports it.";

// ==============================================================================
// main entry point
// ==============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mode = args.first().map(String::as_str).unwrap_or("export");
    let rest = args.get(1..).unwrap_or_default();

    if matches!(mode, "help" | "-h" | "--help") {
        println!("{}", USAGE);
        return Ok(());
    }

    // startup banner
    println!("===========================================================");
    println!("  Smart Mattress Telemetry");
    println!("  sign in -> paginate -> flatten -> export");
    println!("===========================================================");

    // step 1: load configuration
    let config = AppConfig::load_or_default();
    config.print_summary();

    // step 2: logging (RUST_LOG wins over the configured level)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    // step 3: display timezone and http client
    let clock = LocalClock::from_name(&config.time.timezone)?;
    let api = ApiClient::new(&config.api, &config.fetch, clock)?;

    // step 4: run the selected mode
    let outcome = match mode {
        "export" => run_export(&api, &config, rest).await,
        "device" => run_device(&api, &config, rest).await,
        "machines" => run_machines(&api).await,
        "error-report" => run_error_report(&api, &config, rest).await,
        "serve" => run_serve(api, &config).await,
        "restructure" => run_restructure(&clock, &config, rest),
        other => {
            eprintln!("{}", USAGE);
            bail!("unknown mode: {}", other)
        }
    };

    if let Err(e) = &outcome {
        eprintln!("[ERROR] Fatal: {:#}", e);
    }
    outcome
}

// ==============================================================================
// modes
// ==============================================================================

async fn sign_in(api: &ApiClient) -> Result<Session> {
    println!("\n[STARTUP] Signing in...");
    let session = api.sign_in().await.context("login failed")?;
    println!("[STARTUP] ✓ Access token obtained");
    Ok(session)
}

async fn run_export(api: &ApiClient, config: &AppConfig, ids: &[String]) -> Result<()> {
    let ids = if ids.is_empty() { vec![prompt_machine_id().await?] } else { ids.to_vec() };
    let session = sign_in(api).await?;

    for machine_id in &ids {
        let written = export::export_machine(&session, machine_id, &config.export).await?;
        if written.is_empty() {
            println!("[EXPORT] No data for {}", machine_id);
        }
        for path in written {
            println!("[EXPORT] ✓ {}", path.display());
        }
    }
    Ok(())
}

async fn run_device(api: &ApiClient, config: &AppConfig, args: &[String]) -> Result<()> {
    let session = sign_in(api).await?;
    let machine_ids = session.machine_ids_or_all(args).await?;
    println!("[EXPORT] Device details for {} machines", machine_ids.len());

    for path in export::export_devices(&session, &machine_ids, &config.export).await? {
        println!("[EXPORT] ✓ {}", path.display());
    }
    Ok(())
}

async fn run_machines(api: &ApiClient) -> Result<()> {
    let session = sign_in(api).await?;
    let ids = session.machine_ids().await?;
    println!("\n[MACHINES] {} machines", ids.len());
    for id in ids {
        println!("  {}", id);
    }
    Ok(())
}

async fn run_error_report(api: &ApiClient, config: &AppConfig, args: &[String]) -> Result<()> {
    let session = sign_in(api).await?;

    let machine_ids = if args.is_empty() {
        session.machine_ids_or_all(&config.report.machine_ids).await?
    } else {
        args.to_vec()
    };

    let today = chrono::Utc::now().date_naive();
    let daily = report::build(&session, &machine_ids, today).await;
    daily.log();
    if let Some(path) = &config.report.output_file {
        daily.write_to(path)?;
    }
    Ok(())
}

async fn run_serve(api: ApiClient, config: &AppConfig) -> Result<()> {
    // fail fast on bad credentials instead of on the first request
    sign_in(&api).await?;

    let state = ServerState::new(api, &config.cache);
    println!("[STARTUP] ✓ API live at http://{}", config.server.bind);
    server::run_server(state, &config.server.bind).await
}

fn run_restructure(clock: &LocalClock, config: &AppConfig, args: &[String]) -> Result<()> {
    let Some(input) = args.first() else {
        bail!("restructure needs an input file");
    };
    for path in export::restructure_file(Path::new(input), clock, &config.export)? {
        println!("[EXPORT] ✓ {}", path.display());
    }
    Ok(())
}

async fn prompt_machine_id() -> Result<String> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(b"Enter Machine ID: ").await?;
    stdout.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    let id = line.trim();
    if id.is_empty() {
        bail!("no machine id given");
    }
    Ok(id.to_string())
}

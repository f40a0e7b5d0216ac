//! ==============================================================================
//! report.rs - daily error report
//! ==============================================================================
//!
//! purpose:
//!     scans the newest page of each machine's error log and lists every
//!     error that arrived today (UTC). the result is plain text: logged, and
//!     written to a file when one is configured.
//!
//! relationships:
//!     - used by: main.rs (error-report mode)
//!     - uses: api.rs (Session::fetch_page), error_codes.rs
//!
//! ==============================================================================

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde_json::Value;
use std::path::Path;

use crate::api::Session;
use crate::domain::Dataset;
use crate::error_codes;
use crate::table::cell_text;
use crate::timefmt::{epoch_from_value, normalize_epoch};

pub const REPORT_SUBJECT: &str = "Daily Error Report";
const TIMESTAMP_FIELD: &str = "timeStamp";

#[derive(Debug, Clone)]
pub struct DailyErrorReport {
    pub date: NaiveDate,
    pub lines: Vec<String>,
    /// machines whose error log couldn't be fetched
    pub failed_machines: Vec<String>,
}

impl DailyErrorReport {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn body(&self) -> String {
        let mut body = format!("{} {}\n\n", REPORT_SUBJECT, self.date);
        if self.lines.is_empty() {
            body.push_str("No errors for today.\n");
        }
        for line in &self.lines {
            body.push_str(line);
            body.push('\n');
        }
        if !self.failed_machines.is_empty() {
            body.push_str(&format!("\nUnreachable: {}\n", self.failed_machines.join(", ")));
        }
        body
    }

    pub fn log(&self) {
        if self.is_empty() {
            tracing::info!("[REPORT] No errors for today ({})", self.date);
        }
        for line in &self.lines {
            tracing::info!("[REPORT] {}", line);
        }
        for machine in &self.failed_machines {
            tracing::warn!("[REPORT] {} skipped, error log unavailable", machine);
        }
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(path, self.body())
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        tracing::info!("[REPORT] Written to {}", path.display());
        Ok(())
    }
}

/// report lines for the entries of one error page that arrived on `today`
pub fn error_lines(items: &[Value], today: NaiveDate) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| {
            let arrived = item
                .get("arrivalTime")
                .and_then(epoch_from_value)
                .and_then(normalize_epoch)?;
            if arrived.date_naive() != today {
                return None;
            }

            let code = item.get("error").unwrap_or(&Value::Null);
            let (name, _) = error_codes::describe(code);
            let code_text = match cell_text(code) {
                c if c.is_empty() => "N/A".to_string(),
                c => c,
            };
            let machine = item.get("machineId").map(cell_text).unwrap_or_default();
            let stamp = item
                .get(TIMESTAMP_FIELD)
                .and_then(epoch_from_value)
                .filter(|e| *e != 0.0)
                .and_then(normalize_epoch)
                .map(|ts| ts.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "N/A".to_string());

            Some(format!(
                "Error on {}: Code {} - {}, Details: Machine ID: {}, TimeStamp: {}",
                arrived.date_naive(),
                code_text,
                name,
                machine,
                stamp
            ))
        })
        .collect()
}

/// newest error page of every machine, reduced to today's entries
pub async fn build(session: &Session, machine_ids: &[String], today: NaiveDate) -> DailyErrorReport {
    let dataset = Dataset::ErrorData;
    let mut report = DailyErrorReport { date: today, lines: Vec::new(), failed_machines: Vec::new() };

    for machine_id in machine_ids {
        let mut request = dataset.request(machine_id, 1, session.page_limit());
        request.fields.push(TIMESTAMP_FIELD);

        match session.fetch_page(dataset.path(), &request).await {
            Ok(items) => {
                tracing::debug!("[REPORT] {} error entries for {}", items.len(), machine_id);
                report.lines.extend(error_lines(&items, today));
            }
            Err(e) => {
                tracing::error!("[REPORT] Error log for {} failed: {:#}", machine_id, e);
                report.failed_machines.push(machine_id.clone());
            }
        }
    }
    report
}

//! ==============================================================================
//! export.rs - flattened tables to files
//! ==============================================================================
//!
//! purpose:
//!     writes Tables to disk, one file per sheet, in the configured format.
//!     empty sheets are skipped rather than written as header-only files.
//!
//! design:
//!     TableWriter is the seam between "what a table is" and "how it lands on
//!     disk". csv and json implement it today; main.rs and the export
//!     pipelines only see `dyn TableWriter`.
//!
//! relationships:
//!     - used by: main.rs (export / device / restructure modes)
//!     - uses: api.rs (Session), flatten.rs, literal.rs, table.rs
//!
//! ==============================================================================

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::api::Session;
use crate::config::{ExportConfig, ExportFormat};
use crate::domain::Dataset;
use crate::flatten::{FlattenOptions, Flattener};
use crate::literal::parse_dict_literal;
use crate::table::Table;
use crate::timefmt::LocalClock;

pub trait TableWriter: Send + Sync {
    fn extension(&self) -> &'static str;
    fn write(&self, table: &Table, out: &mut dyn Write) -> Result<()>;
}

pub struct CsvTableWriter;

impl TableWriter for CsvTableWriter {
    fn extension(&self) -> &'static str {
        "csv"
    }

    fn write(&self, table: &Table, out: &mut dyn Write) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(out);
        wtr.write_record(&table.columns)?;
        for row in &table.rows {
            wtr.write_record(table.text_row(row))?;
        }
        wtr.flush()?;
        Ok(())
    }
}

pub struct JsonTableWriter;

impl TableWriter for JsonTableWriter {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn write(&self, table: &Table, out: &mut dyn Write) -> Result<()> {
        serde_json::to_writer_pretty(&mut *out, &table.rows)?;
        out.write_all(b"\n")?;
        Ok(())
    }
}

pub fn writer_for(format: ExportFormat) -> Box<dyn TableWriter> {
    match format {
        ExportFormat::Csv => Box::new(CsvTableWriter),
        ExportFormat::Json => Box::new(JsonTableWriter),
    }
}

/// file stem for a machine, e.g. `machine_68B6B354E8B2`
pub fn machine_stem(machine_id: &str) -> String {
    let cleaned: String = machine_id.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    format!("machine_{}", cleaned)
}

/// write each non-empty sheet to `<dir>/<stem>_<sheet>.<ext>`
pub fn write_sheets(
    dir: &Path,
    stem: &str,
    sheets: &[(&str, Table)],
    writer: &dyn TableWriter,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output dir {}", dir.display()))?;

    let mut written = Vec::new();
    for (sheet, table) in sheets {
        if table.is_empty() {
            tracing::info!("[EXPORT] {} is empty, skipped", sheet);
            continue;
        }
        let path = dir.join(format!("{}_{}.{}", stem, sheet, writer.extension()));
        let file = File::create(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        let mut out = BufWriter::new(file);
        writer
            .write(table, &mut out)
            .with_context(|| format!("failed to write {}", path.display()))?;
        out.flush()?;

        tracing::info!("[EXPORT] {} rows -> {}", table.len(), path.display());
        written.push(path);
    }
    Ok(written)
}

/// fetch, flatten and write every telemetry dataset for one machine
pub async fn export_machine(
    session: &Session,
    machine_id: &str,
    config: &ExportConfig,
) -> Result<Vec<PathBuf>> {
    let mut sheets = Vec::new();
    for dataset in Dataset::ALL {
        let outcome = session.fetch_all(dataset, machine_id).await;
        let flattener = flattener_for(dataset, session);
        sheets.push((dataset.slug(), Table::from_records(flattener.records(&outcome.records))));
    }

    let writer = writer_for(config.format);
    write_sheets(&config.output_dir, &machine_stem(machine_id), &sheets, writer.as_ref())
}

/// device info plus FOTA/COTA history for one machine
pub async fn export_device(
    session: &Session,
    machine_id: &str,
    config: &ExportConfig,
) -> Result<Vec<PathBuf>> {
    let overview = session.device_overview(machine_id).await;
    if overview.zone_name.is_empty() {
        tracing::info!("[EXPORT] {} is not assigned to a zone", machine_id);
    } else {
        tracing::info!("[EXPORT] {} is in zone {}", machine_id, overview.zone_name);
    }

    let sheets = [
        ("device_info", Table::from_records(overview.device_info.into_iter().collect())),
        ("fota_history", Table::from_records(overview.fota_history)),
        ("cota_history", Table::from_records(overview.cota_history)),
    ];
    let writer = writer_for(config.format);
    write_sheets(&config.output_dir, &machine_stem(machine_id), &sheets, writer.as_ref())
}

/// `export_device` for each machine in turn. a machine whose sheets can't
/// be written stops the run; backend gaps only leave its sheets empty.
pub async fn export_devices(
    session: &Session,
    machine_ids: &[String],
    config: &ExportConfig,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for machine_id in machine_ids {
        let paths = export_device(session, machine_id, config).await?;
        if paths.is_empty() {
            tracing::info!("[EXPORT] No device data for {}", machine_id);
        }
        written.extend(paths);
    }
    Ok(written)
}

/// re-tabulate an older raw export: one `{'k': v}` dict literal per line.
/// each parsed line is flattened like a live record, so epochs become local
/// date/time columns and zone lists become `_itemN` columns.
pub fn restructure_file(input: &Path, clock: &LocalClock, config: &ExportConfig) -> Result<Vec<PathBuf>> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;

    let mut flattener = Flattener::new(*clock, FlattenOptions::default());
    if config.scale_milli_units {
        flattener = flattener.with_milli_unit_scaling();
    }
    let rows = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| flattener.record(&parse_dict_literal(line, clock)))
        .collect();

    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string());
    let writer = writer_for(config.format);
    write_sheets(&config.output_dir, &stem, &[("restructured", Table::from_records(rows))], writer.as_ref())
}

/// error logs carry catalog names; the other datasets don't have an `error` field
pub fn flattener_for(dataset: Dataset, session: &Session) -> Flattener {
    let options = FlattenOptions { error_metadata: dataset == Dataset::ErrorData, ..FlattenOptions::default() };
    Flattener::new(*session.clock(), options)
}

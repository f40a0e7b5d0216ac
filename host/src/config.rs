//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `telemetry.toml`.
//!     loads configuration from file or falls back to defaults, then applies
//!     environment overrides for the backend url and credentials.
//!
//! structure:
//!     - ApiConfig: backend base url, sign-in credentials, tls leniency.
//!     - FetchConfig: page size, request timeout, optional page cap.
//!     - TimeConfig: display timezone for epoch fields.
//!     - ExportConfig: output directory and file format.
//!     - ServerConfig / CacheConfig: JSON api bind address and cache timings.
//!     - ReportConfig: machines scanned by the daily error report.
//!     - LoggingConfig: default log level when RUST_LOG is unset.
//!
//! ==============================================================================

use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const ENV_EMAIL: &str = "TELEMETRY_EMAIL";
pub const ENV_PASSWORD: &str = "TELEMETRY_PASSWORD";
pub const ENV_BASE_URL: &str = "TELEMETRY_BASE_URL";

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub time: TimeConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    /// the backend has historically been reached with certificate checks off
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    pub page_limit: u32,
    pub timeout_seconds: u64,
    #[serde(default)]
    pub max_pages: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TimeConfig {
    pub timezone: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    pub output_dir: PathBuf,
    pub format: ExportFormat,
    /// restructure: report mA heater current and mV bus voltage as A / V
    #[serde(default = "default_scale_milli_units")]
    pub scale_milli_units: bool,
}

fn default_scale_milli_units() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    pub timeout_seconds: u64,
    pub prewarm_window_seconds: u64,
    /// upper bound on cached keys; machine ids come straight from requests
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_max_entries() -> usize {
    256
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ReportConfig {
    #[serde(default)]
    pub machine_ids: Vec<String>,
    #[serde(default)]
    pub output_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api-prod.variowell-iot.com/smart-mattress/api".to_string(),
            email: String::new(),
            password: String::new(),
            accept_invalid_certs: false,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { page_limit: 100, timeout_seconds: 30, max_pages: None }
    }
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self { timezone: "Europe/Berlin".to_string() }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            format: ExportFormat::Csv,
            scale_milli_units: default_scale_milli_units(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "0.0.0.0:3000".to_string() }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { timeout_seconds: 300, prewarm_window_seconds: 60, max_entries: default_max_entries() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

/// `config/` next to the working directory, then one level up, so both the
/// repository root and the `host/` package directory find the shared file
fn search_paths() -> [PathBuf; 2] {
    [
        PathBuf::from("config").join("telemetry.toml"),
        PathBuf::from("..").join("config").join("telemetry.toml"),
    ]
}

impl AppConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;

        Ok(config)
    }

    /// Load with default fallback, then apply environment overrides.
    ///
    /// Runs before the tracing subscriber exists (the log level lives in
    /// here), so progress goes to stdout like the rest of the startup banner.
    pub fn load_or_default() -> Self {
        let mut config = None;
        for path in &search_paths() {
            if path.exists() {
                match Self::load(path) {
                    Ok(loaded) => {
                        println!("[CONFIG] Loaded from {}", path.display());
                        config = Some(loaded);
                        break;
                    }
                    Err(e) => {
                        println!("[CONFIG] Warning: Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        let mut config = config.unwrap_or_else(|| {
            println!("[CONFIG] Warning: No config file found - using defaults");
            Self::default()
        });
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Overlay credentials and base url from the environment.
    /// Takes a lookup function so tests don't touch process state.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_EMAIL).filter(|v| !v.is_empty()) {
            self.api.email = v;
        }
        if let Some(v) = lookup(ENV_PASSWORD).filter(|v| !v.is_empty()) {
            self.api.password = v;
        }
        if let Some(v) = lookup(ENV_BASE_URL).filter(|v| !v.is_empty()) {
            self.api.base_url = v;
        }
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("┌─────────────────────────────────────────┐");
        println!("│        TELEMETRY CONFIGURATION          │");
        println!("├─────────────────────────────────────────┤");
        println!("│ Backend: {}", self.api.base_url);
        println!("│ Account: {}", if self.api.email.is_empty() { "<unset>" } else { &self.api.email });
        println!("│ Page Size: {}", self.fetch.page_limit);
        println!("│ Timezone: {}", self.time.timezone);
        println!("│ Output: {} ({:?})", self.export.output_dir.display(), self.export.format);
        println!("│ Log Level: {}", self.logging.level);
        println!("└─────────────────────────────────────────┘");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_fills_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [api]
            base_url = "http://localhost:9000/api"
            email = "ops@example.com"

            [fetch]
            page_limit = 50
            timeout_seconds = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.api.base_url, "http://localhost:9000/api");
        assert_eq!(config.fetch.page_limit, 50);
        assert_eq!(config.fetch.max_pages, None);
        assert_eq!(config.time.timezone, "Europe/Berlin");
        assert_eq!(config.cache.timeout_seconds, 300);
        assert_eq!(config.export.format, ExportFormat::Csv);
    }

    #[test]
    fn test_env_overrides_credentials() {
        let mut config = AppConfig::default();
        config.apply_env(|key| match key {
            ENV_EMAIL => Some("env@example.com".to_string()),
            ENV_PASSWORD => Some("secret".to_string()),
            ENV_BASE_URL => Some(String::new()),
            _ => None,
        });

        assert_eq!(config.api.email, "env@example.com");
        assert_eq!(config.api.password, "secret");
        // empty override leaves the default in place
        assert!(config.api.base_url.starts_with("https://"));
    }

    #[test]
    fn test_shipped_config_parses() {
        let config = AppConfig::from_toml(include_str!("../../config/telemetry.toml")).unwrap();
        assert_eq!(config.time.timezone, "Europe/Berlin");
        assert_eq!(config.cache.prewarm_window_seconds, 60);
        assert_eq!(config.cache.max_entries, 256);
        assert!(config.export.scale_milli_units);
        assert!(config.report.output_file.is_none());
    }

    #[test]
    fn test_export_format_parses_lowercase() {
        let config = AppConfig::from_toml(
            r#"
            [export]
            output_dir = "out"
            format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.export.format, ExportFormat::Json);
        assert_eq!(config.export.output_dir, PathBuf::from("out"));
        assert!(config.export.scale_milli_units);
    }

    #[test]
    fn test_shared_config_found_from_package_dir() {
        // cargo runs tests from the package directory, host/
        let package_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        assert!(package_dir.ends_with("host"));
        assert!(search_paths().iter().any(|p| package_dir.join(p).is_file()));
    }
}

//! Run configuration
//!
//! Layered: built-in defaults, then the TOML file, then `CLICKHOUSE_*`
//! environment variables (a `.env` file is loaded by `main`), then CLI flags
//! applied by the command handlers.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::TableRef;
use crate::ingest::{ColumnSpec, DuplicatePolicy};
use crate::services::planner::DEFAULT_BATCH_SIZE;
use crate::services::reconcile::DEFAULT_CHUNK_SIZE;
use crate::services::report::AcceptancePolicy;

pub const APP_DIR: &str = "admission-sync";
pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub target: TargetConfig,
    pub source: SourceConfig,
    pub update: UpdateConfig,
    pub acceptance: AcceptancePolicy,
    pub output: OutputConfig,
}

/// ClickHouse connection and the table being reconciled
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub host: String,
    pub port: u16,
    pub secure: bool,
    pub username: String,
    pub password: String,
    pub database: String,
    pub table: String,
    pub id_column: String,
    pub connect_timeout_secs: u64,
    /// Forwarded as the `mutations_sync` setting on updates
    pub mutations_sync: Option<u8>,
    /// Extra columns fetched for side-by-side sample review
    pub compare_columns: Vec<String>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8123,
            secure: false,
            username: "default".to_string(),
            password: String::new(),
            database: "default".to_string(),
            table: "admission_hubei_wide_2024".to_string(),
            id_column: "id".to_string(),
            connect_timeout_secs: 10,
            mutations_sync: None,
            compare_columns: vec![
                "college_name".to_string(),
                "major_name".to_string(),
                "min_score_2024".to_string(),
            ],
        }
    }
}

impl TargetConfig {
    pub fn base_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}:{}/", scheme, self.host, self.port)
    }

    pub fn table_ref(&self) -> TableRef {
        TableRef::new(&self.database, &self.table, &self.id_column)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Worksheet name; first sheet when unset
    pub sheet: Option<String>,
    /// Fixed header row; auto-detected when unset
    pub header_offset: Option<usize>,
    /// Only rows whose source region equals this are kept
    pub region: Option<String>,
    pub duplicate_policy: DuplicatePolicy,
    /// Replaces the built-in admission column vocabulary when present
    pub columns: Option<ColumnSpec>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            sheet: None,
            header_offset: None,
            region: Some("湖北".to_string()),
            duplicate_policy: DuplicatePolicy::default(),
            columns: None,
        }
    }
}

impl SourceConfig {
    pub fn column_spec(&self) -> ColumnSpec {
        self.columns.clone().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Target column written by `update`
    pub column: String,
    pub batch_size: usize,
    pub query_chunk_size: usize,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            column: "major_min_score_2024".to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            query_chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    /// File name prefix for CSV artifacts
    pub prefix: String,
    pub sample_rows: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            prefix: "hubei_score".to_string(),
            sample_rows: 200,
        }
    }
}

/// `<config dir>/admission-sync/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

impl Config {
    /// Load from an explicit path, or from the default location when it
    /// exists, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => {
                    log::debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Overlay `CLICKHOUSE_*` variables; `lookup` returns a variable's value
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let target = &mut self.target;

        if let Some(host) = lookup("CLICKHOUSE_HOST") {
            target.host = host;
        }
        if let Some(port) = lookup("CLICKHOUSE_PORT") {
            target.port = port
                .trim()
                .parse()
                .with_context(|| format!("CLICKHOUSE_PORT is not a valid port: {}", port))?;
        }
        if let Some(user) = lookup("CLICKHOUSE_USERNAME") {
            target.username = user;
        }
        if let Some(password) = lookup("CLICKHOUSE_PASSWORD") {
            target.password = password;
        }
        if let Some(database) = lookup("CLICKHOUSE_DATABASE") {
            target.database = database;
        }

        Ok(())
    }
}

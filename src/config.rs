// Configuration for tablemark
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

// Payload caps for the JSON columns of a template row
pub const MAX_REGIONS_BYTES: usize = 5 * 1024 * 1024;
pub const MAX_COLUMN_LINES_BYTES: usize = 1024 * 1024;
pub const MAX_PARAMS_BYTES: usize = 1024 * 1024;

pub const MAX_TEMPLATE_NAME_LEN: usize = 255;
pub const DEFAULT_KEEP_BACKUPS: usize = 5;
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_RENDER_SCALE: f64 = 2.0;
pub const DEFAULT_ROW_TOLERANCE: u32 = 3;

pub const CONFIG_FILE_NAME: &str = "tablemark.toml";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,
    #[serde(default = "default_keep_backups")]
    pub keep_backups: usize,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default = "default_render_scale")]
    pub render_scale: f64,
    #[serde(default)]
    pub limits: PayloadLimits,
    #[serde(default)]
    pub extractor: ExtractorConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct PayloadLimits {
    #[serde(default = "default_regions_bytes")]
    pub regions_bytes: usize,
    #[serde(default = "default_column_lines_bytes")]
    pub column_lines_bytes: usize,
    #[serde(default = "default_params_bytes")]
    pub params_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExtractorConfig {
    #[serde(default = "default_extractor_program")]
    pub program: String,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_keep_backups() -> usize { DEFAULT_KEEP_BACKUPS }
fn default_busy_timeout_ms() -> u64 { DEFAULT_BUSY_TIMEOUT_MS }
fn default_render_scale() -> f64 { DEFAULT_RENDER_SCALE }
fn default_regions_bytes() -> usize { MAX_REGIONS_BYTES }
fn default_column_lines_bytes() -> usize { MAX_COLUMN_LINES_BYTES }
fn default_params_bytes() -> usize { MAX_PARAMS_BYTES }
fn default_extractor_program() -> String { "camelot".to_string() }

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tablemark")
        .join("templates.db")
}

impl Default for PayloadLimits {
    fn default() -> Self {
        Self {
            regions_bytes: MAX_REGIONS_BYTES,
            column_lines_bytes: MAX_COLUMN_LINES_BYTES,
            params_bytes: MAX_PARAMS_BYTES,
        }
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            program: default_extractor_program(),
            extra_args: Vec::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            backup_dir: None,
            keep_backups: DEFAULT_KEEP_BACKUPS,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            render_scale: DEFAULT_RENDER_SCALE,
            limits: PayloadLimits::default(),
            extractor: ExtractorConfig::default(),
        }
    }
}

impl Config {
    /// Load from `TABLEMARK_CONFIG`, else `./tablemark.toml`, else defaults.
    /// `TABLEMARK_DB_PATH` overrides the database location either way.
    pub fn load() -> Result<Self> {
        let path = env::var_os("TABLEMARK_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));

        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };

        if let Some(db) = env::var_os("TABLEMARK_DB_PATH") {
            config.database_path = PathBuf::from(db);
        }
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

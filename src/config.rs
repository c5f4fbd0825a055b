use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub data: DataConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub reload: ReloadConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    pub dir: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    /// Zero-based row holding the real header; rows above it are title/date lines.
    #[serde(default = "default_header_row")]
    pub header_row: usize,
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_include_globs() -> Vec<String> {
    vec![
        "*.xlsx".to_string(),
        "*.xlsm".to_string(),
        "*.xls".to_string(),
        "*.ods".to_string(),
    ]
}

fn default_header_row() -> usize {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_verify_sources")]
    pub verify_sources: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: None,
            verify_sources: true,
        }
    }
}

fn default_verify_sources() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_final_limit")]
    pub final_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            final_limit: default_final_limit(),
        }
    }
}

fn default_final_limit() -> usize {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReloadConfig {
    /// Seconds between scheduled reloads. `0` disables the scheduler.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    86_400
}

impl ReloadConfig {
    pub fn is_enabled(&self) -> bool {
        self.interval_secs > 0
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

impl Config {
    /// In-code configuration reading spreadsheets from `dir` with every
    /// other setting at its default. Caching and the scheduler are off.
    pub fn for_data_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            data: DataConfig {
                dir: dir.into(),
                include_globs: default_include_globs(),
                exclude_globs: Vec::new(),
                header_row: default_header_row(),
                follow_symlinks: false,
            },
            cache: CacheConfig::default(),
            retrieval: RetrievalConfig::default(),
            reload: ReloadConfig { interval_secs: 0 },
            server: ServerConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.data.include_globs.is_empty() {
        anyhow::bail!("data.include_globs must not be empty");
    }

    if config.retrieval.final_limit < 1 {
        anyhow::bail!("retrieval.final_limit must be >= 1");
    }

    if config.reload.is_enabled() && config.reload.interval_secs < 60 {
        anyhow::bail!(
            "reload.interval_secs must be 0 (disabled) or >= 60, got {}",
            config.reload.interval_secs
        );
    }

    if config.server.bind.trim().is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    Ok(())
}

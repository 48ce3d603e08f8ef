// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PATH: &str = "INGEST_CONFIG_PATH";
pub const DEFAULT_PATH: &str = "config/ingest.toml";

pub const DEFAULT_ENDPOINT: &str = "https://api.currentsapi.services/v1/latest-news";
/// Top of every even hour.
pub const DEFAULT_SCHEDULE: &str = "0 0 */2 * * *";

/// Feed filter, cadence and timeouts of the news ingestion job.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    pub endpoint: String,
    pub category: String,
    pub country: String,
    pub schedule: String,
    pub timeout_secs: u64,
    pub run_at_startup: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            category: "politics".to_string(),
            country: "US".to_string(),
            schedule: DEFAULT_SCHEDULE.to_string(),
            timeout_secs: 15,
            run_at_startup: true,
        }
    }
}

impl IngestConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Load ingest config from an explicit TOML path.
pub fn load_from(path: &Path) -> Result<IngestConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading ingest config from {}", path.display()))?;
    parse(&content).with_context(|| format!("parsing ingest config {}", path.display()))
}

/// Load ingest config with fallbacks:
/// 1) $INGEST_CONFIG_PATH, as resolved by `lookup`
/// 2) config/ingest.toml
/// 3) built-in defaults
pub fn load_default_with<F>(lookup: F) -> Result<IngestConfig>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(p) = lookup(ENV_PATH).filter(|p| !p.trim().is_empty()) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        } else {
            return Err(anyhow!("{ENV_PATH} points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from(DEFAULT_PATH);
    if toml_p.exists() {
        return load_from(&toml_p);
    }
    Ok(IngestConfig::default())
}

fn parse(s: &str) -> Result<IngestConfig> {
    let mut cfg: IngestConfig = toml::from_str(s)?;
    cfg.category = cfg.category.trim().to_string();
    cfg.country = cfg.country.trim().to_string();
    cfg.schedule = cfg.schedule.trim().to_string();
    if cfg.timeout_secs == 0 {
        cfg.timeout_secs = IngestConfig::default().timeout_secs;
    }
    Ok(cfg)
}

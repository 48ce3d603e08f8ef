// src/config.rs
//! Process configuration, resolved once at startup and injected everywhere else.

use anyhow::{anyhow, Context, Result};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tracing::{info, warn};

use crate::auth;
use crate::elections::DEFAULT_FEC_BASE_URL;
use crate::ingest::config::{self as ingest_config, IngestConfig};

pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_NEWS_API_KEY: &str = "NEWS_API_KEY";
pub const ENV_FEC_API_KEY: &str = "FEC_API_KEY";
pub const ENV_FEC_BASE_URL: &str = "FEC_BASE_URL";
pub const ENV_FEC_TIMEOUT: &str = "FEC_TIMEOUT_SECS";
pub const ENV_PORT: &str = "PORT";
pub const ENV_BIND_ADDR: &str = "BIND_ADDR";
pub const ENV_FETCH_TIMEOUT: &str = "NEWS_FETCH_TIMEOUT_SECS";
pub const ENV_DB_TIMEOUT: &str = "DATABASE_TIMEOUT_SECS";
pub const ENV_JWT_SECRET: &str = "JWT_SECRET";
pub const ENV_JWT_EXPIRES_IN: &str = "JWT_EXPIRES_IN";
pub const ENV_SEED_TEST_USER: &str = "SEED_TEST_USER";

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_JWT_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: SocketAddr,
    pub database_url: String,
    pub database_timeout: Duration,
    pub news_api_key: Option<String>,
    pub fec_api_key: Option<String>,
    pub fec_base_url: String,
    pub fec_timeout: Duration,
    /// `None` means a random per-process secret: tokens die with the process.
    pub jwt_secret: Option<String>,
    pub jwt_ttl: Duration,
    pub seed_test_user: bool,
    pub ingest: IngestConfig,
}

impl Config {
    /// Read configuration from the process environment (after `.env`, if any).
    ///
    /// Fails when `DATABASE_URL` is missing: the service must not serve traffic
    /// without its store.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with an injectable variable source. The
    /// ingest config path is resolved through `lookup` as well.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let database_url = get(ENV_DATABASE_URL)
            .ok_or_else(|| anyhow!("{ENV_DATABASE_URL} must be set"))?;

        let port: u16 = match get(ENV_PORT) {
            Some(p) => p
                .parse()
                .with_context(|| format!("invalid {ENV_PORT} value `{p}`"))?,
            None => {
                info!("{ENV_PORT} not set, using default: {DEFAULT_PORT}");
                DEFAULT_PORT
            }
        };
        let ip: IpAddr = match get(ENV_BIND_ADDR) {
            Some(a) => a
                .parse()
                .with_context(|| format!("invalid {ENV_BIND_ADDR} value `{a}`"))?,
            None => IpAddr::from([0, 0, 0, 0]),
        };

        let mut ingest = ingest_config::load_default_with(&get)?;
        if let Some(t) = get(ENV_FETCH_TIMEOUT) {
            match t.parse::<u64>() {
                Ok(secs) if secs > 0 => ingest.timeout_secs = secs,
                _ => warn!(
                    "Invalid {ENV_FETCH_TIMEOUT} value `{t}`, keeping {}s",
                    ingest.timeout_secs
                ),
            }
        }

        let secs = |key: &str| {
            get(key)
                .and_then(|t| t.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
        };
        let database_timeout = secs(ENV_DB_TIMEOUT).unwrap_or(DEFAULT_TIMEOUT);
        let fec_timeout = secs(ENV_FEC_TIMEOUT).unwrap_or(DEFAULT_TIMEOUT);

        let jwt_ttl = match get(ENV_JWT_EXPIRES_IN) {
            Some(raw) => auth::parse_ttl(&raw)
                .ok_or_else(|| anyhow!("invalid {ENV_JWT_EXPIRES_IN} value `{raw}`"))?,
            None => DEFAULT_JWT_TTL,
        };
        let seed_test_user = get(ENV_SEED_TEST_USER)
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let news_api_key = get(ENV_NEWS_API_KEY);
        let fec_api_key = get(ENV_FEC_API_KEY);
        let jwt_secret = get(ENV_JWT_SECRET);

        // Only presence + length; never the secret itself.
        info!(
            news_key_len = news_api_key.as_ref().map_or(0, String::len),
            fec_key_len = fec_api_key.as_ref().map_or(0, String::len),
            jwt_secret_len = jwt_secret.as_ref().map_or(0, String::len),
            "credentials resolved"
        );

        Ok(Self {
            bind: SocketAddr::new(ip, port),
            database_url,
            database_timeout,
            news_api_key,
            fec_api_key,
            fec_base_url: get(ENV_FEC_BASE_URL)
                .unwrap_or_else(|| DEFAULT_FEC_BASE_URL.to_string()),
            fec_timeout,
            jwt_secret,
            jwt_ttl,
            seed_test_user,
            ingest,
        })
    }
}

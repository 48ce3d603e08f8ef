// src/ingest/providers/currents.rs
//! Latest-news feed (Currents API shape): `{ "status": "ok", "news": [ {..}, .. ] }`.

use async_trait::async_trait;
use metrics::histogram;
use serde::Deserialize;
use std::time::Duration;

use crate::error::{FetchError, ValidationError};
use crate::ingest::config::IngestConfig;
use crate::ingest::types::{FeedBatch, NewsFeed, RawItem};

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    status: Option<String>,
    news: Option<Vec<serde_json::Value>>,
}

pub struct CurrentsFeed {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http {
        client: reqwest::Client,
        endpoint: String,
        api_key: String,
        category: String,
        country: String,
    },
}

impl CurrentsFeed {
    /// Serve a fixed JSON body instead of calling the network.
    pub fn from_fixture(body: &str) -> Self {
        Self {
            mode: Mode::Fixture(body.to_string()),
        }
    }

    pub fn from_config(cfg: &IngestConfig, api_key: impl Into<String>) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("election-hub/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4).min(cfg.timeout()))
            .timeout(cfg.timeout())
            .build()?;
        Ok(Self {
            mode: Mode::Http {
                client,
                endpoint: cfg.endpoint.clone(),
                api_key: api_key.into(),
                category: cfg.category.clone(),
                country: cfg.country.clone(),
            },
        })
    }

    /// Parse a feed body. Envelope problems fail the fetch; a bad item only fails itself.
    pub fn parse_body(body: &str) -> Result<FeedBatch, FetchError> {
        let t0 = std::time::Instant::now();
        let env: Envelope = serde_json::from_str(body)?;

        if let Some(status) = env.status.as_deref() {
            if !status.eq_ignore_ascii_case("ok") {
                return Err(FetchError::Payload(format!("feed status `{status}`")));
            }
        }
        let news = env
            .news
            .ok_or_else(|| FetchError::Payload("missing `news` array".to_string()))?;

        let out: FeedBatch = news
            .into_iter()
            .map(|v| {
                serde_json::from_value::<RawItem>(v)
                    .map_err(|e| ValidationError::Shape(e.to_string()))
            })
            .collect();

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("news_parse_ms").record(ms);
        Ok(out)
    }
}

#[async_trait]
impl NewsFeed for CurrentsFeed {
    async fn fetch_latest(&self) -> Result<FeedBatch, FetchError> {
        match &self.mode {
            Mode::Fixture(s) => Self::parse_body(s),

            Mode::Http {
                client,
                endpoint,
                api_key,
                category,
                country,
            } => {
                let t0 = std::time::Instant::now();
                let resp = client
                    .get(endpoint)
                    .header(reqwest::header::AUTHORIZATION, api_key)
                    .query(&[("category", category.as_str()), ("country", country.as_str())])
                    .send()
                    .await?;

                let status = resp.status();
                if !status.is_success() {
                    return Err(FetchError::Status {
                        status: status.as_u16(),
                    });
                }
                let body = resp.text().await?;
                histogram!("news_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
                Self::parse_body(&body)
            }
        }
    }

    fn name(&self) -> &'static str {
        "currents"
    }
}

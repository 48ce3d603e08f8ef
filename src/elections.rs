// src/elections.rs
//! Pass-through client for the FEC elections endpoint.

use anyhow::{bail, Context, Result};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_FEC_BASE_URL: &str = "https://api.open.fec.gov/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Office {
    House,
    Senate,
    President,
}

impl Office {
    pub fn as_str(&self) -> &'static str {
        match self {
            Office::House => "house",
            Office::Senate => "senate",
            Office::President => "president",
        }
    }
}

impl fmt::Display for Office {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Office {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "house" => Ok(Office::House),
            "senate" => Ok(Office::Senate),
            "president" => Ok(Office::President),
            _ => Err(QueryError::InvalidOffice),
        }
    }
}

/// Reasons a results query is rejected before any upstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("Invalid office type. Use 'house', 'senate', or 'president'.")]
    InvalidOffice,
    #[error("Must include 'state' parameter for Senate elections.")]
    SenateNeedsState,
    #[error("Must include both 'state' and 'district' parameters for House elections.")]
    HouseNeedsDistrict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsQuery {
    pub cycle: String,
    pub office: Office,
    pub state: Option<String>,
    pub district: Option<String>,
}

impl ResultsQuery {
    pub fn parse(
        cycle: &str,
        office: &str,
        state: Option<String>,
        district: Option<String>,
    ) -> Result<Self, QueryError> {
        let office: Office = office.parse()?;
        let state = state.filter(|s| !s.trim().is_empty());
        let district = district.filter(|d| !d.trim().is_empty());

        match office {
            Office::Senate if state.is_none() => return Err(QueryError::SenateNeedsState),
            Office::House if state.is_none() || district.is_none() => {
                return Err(QueryError::HouseNeedsDistrict)
            }
            _ => {}
        }

        Ok(Self {
            cycle: cycle.to_string(),
            office,
            state,
            district,
        })
    }

    fn query_pairs<'a>(&'a self, api_key: &'a str) -> Vec<(&'static str, &'a str)> {
        let mut q = vec![
            ("cycle", self.cycle.as_str()),
            ("office", self.office.as_str()),
            ("api_key", api_key),
        ];
        if let Some(s) = &self.state {
            q.push(("state", s.as_str()));
        }
        if let Some(d) = &self.district {
            q.push(("district", d.as_str()));
        }
        q
    }
}

pub struct FecClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl FecClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("election-hub/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("building FEC http client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Upstream JSON is returned untouched.
    pub async fn election_results(&self, q: &ResultsQuery) -> Result<serde_json::Value> {
        let Some(key) = self.api_key.as_deref() else {
            bail!("FEC_API_KEY is not configured");
        };
        let url = format!("{}/elections/", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&q.query_pairs(key))
            .send()
            .await
            .context("FEC request")?
            .error_for_status()
            .context("FEC status")?;
        resp.json().await.context("FEC body")
    }
}

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::config::IngestConfig;

#[derive(Debug, Deserialize)]
struct AppListResp {
    #[serde(default)]
    applist: AppList,
}

#[derive(Debug, Default, Deserialize)]
struct AppList {
    #[serde(default)]
    apps: Vec<CatalogEntry>,
}

/// One row of the public app list. Only lives long enough to be filtered.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogEntry {
    pub appid: i64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
}

// The app list carries `"name": null` for some delisted apps.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Deserialize)]
struct AppDetailsWrapper {
    #[serde(default)]
    success: bool,
    data: Option<AppData>,
}

#[derive(Debug, Deserialize)]
struct AppData {
    name: Option<String>,
    #[serde(default)]
    short_description: Option<String>,
    #[serde(default)]
    release_date: Option<ReleaseDate>,
    #[serde(default)]
    is_free: Option<bool>,
    #[serde(default)]
    price_overview: Option<PriceOverview>,
    #[serde(default)]
    categories: Option<Vec<DescriptionEntry>>, // {id, description}
    #[serde(default)]
    genres: Option<Vec<DescriptionEntry>>, // {id, description}
}

#[derive(Debug, Deserialize)]
struct ReleaseDate {
    #[serde(default)]
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PriceOverview {
    #[serde(rename = "final")]
    final_price: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct DescriptionEntry {
    description: Option<String>,
}

/// Detail payload for one app, with optional fields already defaulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailRecord {
    pub appid: i64,
    pub name: String,
    pub description: String,
    pub release_date: String,
    /// Final price in minor currency units.
    pub price_cents: i64,
    pub is_free: bool,
    pub categories: Vec<String>,
    pub genres: Vec<String>,
}

/// Why a single app produced no record. Never escapes the fetcher.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(StatusCode),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("app not resolved by the store")]
    Unresolved,
    #[error("retrieval task failed: {0}")]
    TaskFailed(String),
}

impl FetchError {
    /// Stable short label used in logs and drop counters.
    pub fn reason(&self) -> &'static str {
        match self {
            FetchError::Transport(_) => "transport",
            FetchError::Status(_) => "status",
            FetchError::Timeout(_) => "timeout",
            FetchError::Malformed(_) => "malformed",
            FetchError::Unresolved => "unresolved",
            FetchError::TaskFailed(_) => "task_failed",
        }
    }
}

/// Source of the candidate app list.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn list_apps(&self, limit: usize) -> Result<Vec<CatalogEntry>>;
}

/// Source of per-app detail records.
#[async_trait]
pub trait DetailSource: Send + Sync {
    async fn fetch_details(&self, appid: i64) -> Result<DetailRecord, FetchError>;
}

/// Steam Web API client for the app list and the store appdetails endpoint.
#[derive(Clone)]
pub struct SteamClient {
    client: Client,
    app_list_url: String,
    app_details_url: String,
    country: Option<String>,
    language: Option<String>,
}

impl SteamClient {
    pub fn new(cfg: &IngestConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(cfg.request_timeout)
            .build()
            .context("failed to build steam http client")?;
        Ok(Self {
            client,
            app_list_url: cfg.app_list_url.clone(),
            app_details_url: cfg.app_details_url.clone(),
            country: cfg.country.clone(),
            language: cfg.language.clone(),
        })
    }

    fn detail_query(&self, appid: i64) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("appids", appid.to_string())];
        if let Some(cc) = &self.country {
            pairs.push(("cc", cc.clone()));
        }
        if let Some(l) = &self.language {
            pairs.push(("l", l.clone()));
        }
        pairs
    }
}

#[async_trait]
impl CatalogSource for SteamClient {
    #[instrument(skip(self))]
    async fn list_apps(&self, limit: usize) -> Result<Vec<CatalogEntry>> {
        let resp = self
            .client
            .get(&self.app_list_url)
            .header("Accept", "application/json")
            .send()
            .await
            .context("steam app list request failed")?;
        if resp.status() != StatusCode::OK {
            warn!(
                status = resp.status().as_u16(),
                "steam app list returned non-200; treating as empty"
            );
            return Ok(Vec::new());
        }
        let body = resp
            .json::<AppListResp>()
            .await
            .context("failed to decode steam app list")?;
        let total = body.applist.apps.len();
        let apps: Vec<CatalogEntry> = body.applist.apps.into_iter().take(limit).collect();
        info!(total, kept = apps.len(), "steam app list fetched");
        Ok(apps)
    }
}

#[async_trait]
impl DetailSource for SteamClient {
    async fn fetch_details(&self, appid: i64) -> Result<DetailRecord, FetchError> {
        let resp = self
            .client
            .get(&self.app_details_url)
            .header("Accept", "application/json")
            .query(&self.detail_query(appid))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }
        let body = resp.bytes().await?;
        parse_app_details(appid, &body)
    }
}

/// Parse an appdetails body (`{"<appid>": {"success": .., "data": {..}}}`) into a record.
pub fn parse_app_details(appid: i64, body: &[u8]) -> Result<DetailRecord, FetchError> {
    let root: Value = serde_json::from_slice(body)?;
    // Steam answers `null`, or `{"<appid>": null}`, for throttled or unknown ids.
    let Some(entry) = root.get(appid.to_string()).filter(|v| !v.is_null()) else {
        return Err(FetchError::Unresolved);
    };
    let wrapper: AppDetailsWrapper = serde_json::from_value(entry.clone())?;
    if !wrapper.success {
        return Err(FetchError::Unresolved);
    }
    let data = wrapper.data.ok_or(FetchError::Unresolved)?;
    Ok(DetailRecord {
        appid,
        name: data.name.unwrap_or_else(|| appid.to_string()),
        description: data.short_description.unwrap_or_default(),
        release_date: data.release_date.and_then(|r| r.date).unwrap_or_default(),
        price_cents: data
            .price_overview
            .and_then(|po| po.final_price)
            .unwrap_or(0),
        is_free: data.is_free.unwrap_or(false),
        categories: descriptions(data.categories),
        genres: descriptions(data.genres),
    })
}

fn descriptions(entries: Option<Vec<DescriptionEntry>>) -> Vec<String> {
    entries
        .unwrap_or_default()
        .into_iter()
        .filter_map(|e| e.description)
        .collect()
}

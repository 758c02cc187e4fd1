use std::path::PathBuf;
use std::time::Duration;

use crate::util::env::{env_flag, env_opt, env_parse};

pub const DEFAULT_APP_LIST_URL: &str = "https://api.steampowered.com/ISteamApps/GetAppList/v2/";
pub const DEFAULT_APP_DETAILS_URL: &str = "https://store.steampowered.com/api/appdetails";
pub const DEFAULT_CATALOG_LIMIT: usize = 100;
/// Approximates Steam's ~200 requests / 5 minutes ceiling without explicit spacing.
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_DB_PATH: &str = "data/steam_games.db";

/// Configuration for one ingest run. Built once and handed to the fetcher and store.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub app_list_url: String,
    pub app_details_url: String,
    /// Only this many catalog entries are considered.
    pub catalog_limit: usize,
    /// Permit count bounding in-flight detail requests.
    pub max_concurrency: usize,
    pub request_timeout: Duration,
    /// Optional `cc` query parameter (price region).
    pub country: Option<String>,
    /// Optional `l` query parameter (description language).
    pub language: Option<String>,
    pub database_path: PathBuf,
    pub user_agent: String,
    pub dry_run: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            app_list_url: DEFAULT_APP_LIST_URL.to_string(),
            app_details_url: DEFAULT_APP_DETAILS_URL.to_string(),
            catalog_limit: DEFAULT_CATALOG_LIMIT,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            country: None,
            language: None,
            database_path: PathBuf::from(DEFAULT_DB_PATH),
            user_agent: format!("steam-catalog-ingest/{}", env!("CARGO_PKG_VERSION")),
            dry_run: false,
        }
    }
}

impl IngestConfig {
    /// Defaults overridden by `STEAM_*` environment variables (.env included).
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            app_list_url: env_opt("STEAM_APP_LIST_URL").unwrap_or(d.app_list_url),
            app_details_url: env_opt("STEAM_APP_DETAILS_URL").unwrap_or(d.app_details_url),
            catalog_limit: env_parse("STEAM_CATALOG_LIMIT", d.catalog_limit),
            max_concurrency: env_parse("STEAM_MAX_CONCURRENCY", d.max_concurrency).max(1),
            request_timeout: Duration::from_secs(env_parse(
                "STEAM_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )),
            country: env_opt("STEAM_COUNTRY"),
            language: env_opt("STEAM_LANGUAGE"),
            database_path: env_opt("STEAM_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(d.database_path),
            user_agent: env_opt("STEAM_USER_AGENT").unwrap_or(d.user_agent),
            dry_run: env_flag("STEAM_DRY_RUN", false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = IngestConfig::default();
        assert_eq!(cfg.catalog_limit, 100);
        assert_eq!(cfg.max_concurrency, 5);
        assert_eq!(cfg.request_timeout, Duration::from_secs(20));
        assert!(cfg.country.is_none());
        assert!(!cfg.dry_run);
    }
}

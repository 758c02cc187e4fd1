use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::IngestConfig;
use crate::database_ops::db::Db;
use crate::database_ops::steam::fetcher::{FetchStats, RateLimitedFetcher};
use crate::database_ops::steam::provider::{CatalogSource, DetailSource, SteamClient};
use crate::database_ops::store::{persist_all, PersistSummary};
use crate::normalization::candidate::eligible_app_ids;
use crate::normalization::game::{normalize, NormalizedGame};

/// What one run saw and wrote.
#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub listed: usize,
    pub eligible: usize,
    pub fetch: FetchStats,
    pub persisted: PersistSummary,
    pub dry_run: bool,
}

/// List -> filter -> fetch -> normalize -> store, against whatever sources are given.
pub async fn run_pipeline<C, S>(
    catalog: &C,
    details: Arc<S>,
    db: &Db,
    cfg: &IngestConfig,
) -> Result<IngestSummary>
where
    C: CatalogSource,
    S: DetailSource + 'static,
{
    let started_at = Utc::now();
    info!(limit = cfg.catalog_limit, max_concurrency = cfg.max_concurrency, "ingest run start");

    let entries = catalog
        .list_apps(cfg.catalog_limit)
        .await
        .context("failed to list catalog")?;
    let appids = eligible_app_ids(&entries);
    info!(listed = entries.len(), eligible = appids.len(), "catalog filtered");
    if appids.is_empty() {
        warn!("no eligible apps; nothing to fetch");
    }

    let fetcher = RateLimitedFetcher::new(details, cfg.max_concurrency, cfg.request_timeout);
    let report = fetcher.fetch_all(&appids).await;

    let normalized: Vec<NormalizedGame> = report.records.into_iter().map(normalize).collect();
    let persisted = persist_all(db, &normalized).await?;

    let summary = IngestSummary {
        started_at,
        finished_at: Utc::now(),
        listed: entries.len(),
        eligible: appids.len(),
        fetch: report.stats,
        persisted,
        dry_run: cfg.dry_run,
    };
    info!(
        elapsed_ms = (summary.finished_at - summary.started_at).num_milliseconds(),
        fetched = summary.fetch.fetched,
        dropped = summary.fetch.dropped_total(),
        games_inserted = summary.persisted.games_inserted,
        "ingest run complete"
    );
    Ok(summary)
}

/// Open the store, then run against the live Steam endpoints.
///
/// The store is opened before any remote call so an unusable database aborts the
/// run without fetching. Dry runs write to a throwaway in-memory store instead.
pub async fn run_ingest(cfg: &IngestConfig) -> Result<(IngestSummary, Db)> {
    let db = if cfg.dry_run {
        info!("dry run: persisting to an in-memory store");
        Db::in_memory().await?
    } else {
        Db::open(&cfg.database_path).await?
    };
    let client = SteamClient::new(cfg)?;
    let summary = run_pipeline(&client, Arc::new(client.clone()), &db, cfg).await?;
    Ok((summary, db))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database_ops::db::TableCounts;
    use crate::database_ops::steam::provider::{
        parse_app_details, CatalogEntry, DetailRecord, FetchError,
    };
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::HashMap;

    struct FixedCatalog(Vec<CatalogEntry>);

    #[async_trait]
    impl CatalogSource for FixedCatalog {
        async fn list_apps(&self, limit: usize) -> Result<Vec<CatalogEntry>> {
            Ok(self.0.iter().take(limit).cloned().collect())
        }
    }

    struct FailingCatalog;

    #[async_trait]
    impl CatalogSource for FailingCatalog {
        async fn list_apps(&self, _limit: usize) -> Result<Vec<CatalogEntry>> {
            Err(anyhow::anyhow!("connection refused"))
        }
    }

    /// Serves canned appdetails bodies; ids without a body fail with a 500.
    struct CannedDetails(HashMap<i64, Value>);

    #[async_trait]
    impl DetailSource for CannedDetails {
        async fn fetch_details(&self, appid: i64) -> Result<DetailRecord, FetchError> {
            match self.0.get(&appid) {
                Some(body) => parse_app_details(appid, body.to_string().as_bytes()),
                None => Err(FetchError::Status(reqwest::StatusCode::INTERNAL_SERVER_ERROR)),
            }
        }
    }

    fn entry(appid: i64, name: &str) -> CatalogEntry {
        CatalogEntry {
            appid,
            name: name.to_string(),
        }
    }

    fn scenario() -> (FixedCatalog, Arc<CannedDetails>) {
        let catalog = FixedCatalog(vec![entry(1, "Foo"), entry(2, "Foo Demo"), entry(3, "Bar")]);
        let mut bodies = HashMap::new();
        bodies.insert(
            1,
            json!({ "1": { "success": true, "data": {
                "name": "Foo",
                "is_free": true,
                "categories": [{ "description": "Single-player" }],
                "genres": [{ "description": "Action" }]
            } } }),
        );
        (catalog, Arc::new(CannedDetails(bodies)))
    }

    #[tokio::test]
    async fn end_to_end_scenario() {
        let db = Db::in_memory().await.unwrap();
        let (catalog, details) = scenario();

        let summary = run_pipeline(&catalog, details, &db, &IngestConfig::default())
            .await
            .unwrap();

        assert_eq!(summary.listed, 3);
        assert_eq!(summary.eligible, 2);
        assert_eq!(summary.fetch.fetched, 1);
        assert_eq!(summary.fetch.dropped.get("status"), Some(&1));
        assert_eq!(
            db.table_counts().await.unwrap(),
            TableCounts {
                games: 1,
                categories: 1,
                genres: 1,
                game_categories: 1,
                game_genres: 1,
            }
        );
        let (appid, is_free): (i64, bool) = sqlx::query_as("SELECT appid, is_free FROM games")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(appid, 1);
        assert!(is_free);
        let category: String = sqlx::query_scalar("SELECT name FROM categories")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(category, "Single-player");
    }

    #[tokio::test]
    async fn rerun_leaves_store_unchanged() {
        let db = Db::in_memory().await.unwrap();
        let (catalog, details) = scenario();
        let cfg = IngestConfig::default();

        run_pipeline(&catalog, details.clone(), &db, &cfg).await.unwrap();
        let first = db.table_counts().await.unwrap();
        let again = run_pipeline(&catalog, details, &db, &cfg).await.unwrap();

        assert_eq!(db.table_counts().await.unwrap(), first);
        assert_eq!(again.persisted.games_inserted, 0);
        assert_eq!(again.persisted.games_existing, 1);
    }

    #[tokio::test]
    async fn catalog_limit_truncates_before_filtering() {
        let db = Db::in_memory().await.unwrap();
        let (catalog, details) = scenario();
        let cfg = IngestConfig {
            catalog_limit: 1,
            ..IngestConfig::default()
        };

        let summary = run_pipeline(&catalog, details, &db, &cfg).await.unwrap();

        assert_eq!(summary.listed, 1);
        assert_eq!(summary.eligible, 1);
        assert_eq!(db.table_counts().await.unwrap().games, 1);
    }

    #[tokio::test]
    async fn listing_failure_writes_nothing() {
        let db = Db::in_memory().await.unwrap();
        let (_, details) = scenario();

        let err = run_pipeline(&FailingCatalog, details, &db, &IngestConfig::default())
            .await
            .unwrap_err();

        assert!(format!("{err:#}").contains("failed to list catalog"));
        assert_eq!(db.table_counts().await.unwrap(), TableCounts::default());
    }
}

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::provider::{DetailRecord, DetailSource, FetchError};

/// Outcome counters for one fan-out. Drops are keyed by `FetchError::reason`.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct FetchStats {
    pub requested: usize,
    pub fetched: usize,
    pub dropped: BTreeMap<&'static str, usize>,
}

impl FetchStats {
    pub fn dropped_total(&self) -> usize {
        self.dropped.values().sum()
    }

    fn record_drop(&mut self, err: &FetchError) {
        *self.dropped.entry(err.reason()).or_insert(0) += 1;
    }
}

#[derive(Debug, Default)]
pub struct FetchReport {
    /// Successfully retrieved records, one per distinct appid, in completion order.
    pub records: Vec<DetailRecord>,
    pub stats: FetchStats,
}

/// Retrieves detail records with at most `max_concurrency` requests in flight.
pub struct RateLimitedFetcher<S> {
    source: Arc<S>,
    permits: Arc<Semaphore>,
    request_timeout: Duration,
}

impl<S> RateLimitedFetcher<S>
where
    S: DetailSource + 'static,
{
    pub fn new(source: Arc<S>, max_concurrency: usize, request_timeout: Duration) -> Self {
        Self {
            source,
            permits: Arc::new(Semaphore::new(max_concurrency.max(1))),
            request_timeout,
        }
    }

    /// Fetch every appid and join. Per-app failures are logged and counted, never returned.
    pub async fn fetch_all(&self, appids: &[i64]) -> FetchReport {
        let mut seen = HashSet::new();
        let unique: Vec<i64> = appids.iter().copied().filter(|id| seen.insert(*id)).collect();

        let mut report = FetchReport::default();
        report.stats.requested = unique.len();

        let mut tasks = JoinSet::new();
        for appid in unique {
            let source = self.source.clone();
            let permits = self.permits.clone();
            let timeout = self.request_timeout;
            tasks.spawn(async move {
                // Held until this block returns, whatever the outcome.
                let _permit = match permits.acquire_owned().await {
                    Ok(p) => p,
                    Err(e) => return (appid, Err(FetchError::TaskFailed(e.to_string()))),
                };
                let res = match tokio::time::timeout(timeout, source.fetch_details(appid)).await {
                    Ok(res) => res,
                    Err(_) => Err(FetchError::Timeout(timeout)),
                };
                (appid, res)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(record))) => {
                    report.stats.fetched += 1;
                    if report.stats.fetched % 10 == 0 {
                        debug!(fetched = report.stats.fetched, "detail fetch progress");
                    }
                    report.records.push(record);
                }
                Ok((appid, Err(err))) => {
                    match err {
                        FetchError::Unresolved => {
                            debug!(appid, reason = err.reason(), "app dropped: {err}")
                        }
                        _ => warn!(appid, reason = err.reason(), "app dropped: {err}"),
                    }
                    report.stats.record_drop(&err);
                }
                Err(join_err) => {
                    // The panicking task's appid is lost with it.
                    let err = FetchError::TaskFailed(join_err.to_string());
                    warn!(reason = err.reason(), "app dropped: {err}");
                    report.stats.record_drop(&err);
                }
            }
        }

        info!(
            requested = report.stats.requested,
            fetched = report.stats.fetched,
            dropped = report.stats.dropped_total(),
            "detail fetch complete"
        );
        report
    }
}

use anyhow::Result;
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use steam_catalog_ingest::cli::db_counts;
use steam_catalog_ingest::util::env as env_util;
use steam_catalog_ingest::util::tracing::{init_tracing, LogFormat};
use steam_catalog_ingest::{run_ingest, IngestConfig};

/// One-shot Steam catalog ingest. Every flag is optional; unset flags fall back
/// to STEAM_* environment variables, then built-in defaults.
#[derive(Parser, Debug)]
#[command(name = "steam_ingest", version, about = "Ingest Steam app details into SQLite")]
struct Cli {
    /// SQLite database file
    #[arg(long)]
    db_path: Option<PathBuf>,
    /// Number of catalog entries to consider
    #[arg(long)]
    limit: Option<usize>,
    /// Maximum detail requests in flight
    #[arg(long)]
    concurrency: Option<usize>,
    /// Per-request timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Store region code (`cc`)
    #[arg(long)]
    country: Option<String>,
    /// Store language (`l`)
    #[arg(long)]
    language: Option<String>,
    #[arg(long)]
    app_list_url: Option<String>,
    #[arg(long)]
    app_details_url: Option<String>,
    /// Fetch and normalize, but write to an in-memory store only
    #[arg(long, action = ArgAction::SetTrue)]
    dry_run: bool,
    /// Print table row counts after the run
    #[arg(long, action = ArgAction::SetTrue)]
    counts: bool,
    /// Log line format: full, compact or json
    #[arg(long)]
    log_format: Option<LogFormat>,
}

impl Cli {
    fn into_config(self) -> IngestConfig {
        let mut cfg = IngestConfig::from_env();
        if let Some(v) = self.db_path {
            cfg.database_path = v;
        }
        if let Some(v) = self.limit {
            cfg.catalog_limit = v;
        }
        if let Some(v) = self.concurrency {
            cfg.max_concurrency = v.max(1);
        }
        if let Some(v) = self.timeout_secs {
            cfg.request_timeout = Duration::from_secs(v);
        }
        if self.country.is_some() {
            cfg.country = self.country;
        }
        if self.language.is_some() {
            cfg.language = self.language;
        }
        if let Some(v) = self.app_list_url {
            cfg.app_list_url = v;
        }
        if let Some(v) = self.app_details_url {
            cfg.app_details_url = v;
        }
        cfg.dry_run |= self.dry_run;
        cfg
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_util::init_env();
    let cli = Cli::parse();
    let log_format = cli
        .log_format
        .unwrap_or_else(|| env_util::env_parse("STEAM_LOG_FORMAT", LogFormat::default()));
    init_tracing("info", log_format)?;

    let show_counts = cli.counts;
    let cfg = cli.into_config();
    info!(db = %cfg.database_path.display(), dry_run = cfg.dry_run, "steam_ingest starting");

    let (summary, db) = run_ingest(&cfg).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if show_counts {
        print!("{}", db_counts::run(&db).await?);
    }
    db.pool.close().await;
    Ok(())
}

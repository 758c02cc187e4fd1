pub mod cli;
pub mod config;
pub mod database_ops;
pub mod normalization;
pub mod orchestrator;

pub mod util {
    pub mod env;
    pub mod tracing;
}

pub use config::IngestConfig;
pub use orchestrator::{run_ingest, run_pipeline, IngestSummary};

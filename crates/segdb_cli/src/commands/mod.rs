//! CLI command implementations.

pub mod compact;
pub mod generate;
pub mod get_id;
pub mod get_segments;
pub mod insert_segment;
pub mod segment_stats;

use clap::ValueEnum;
use segdb_core::{open_store, EngineConfig, KvEngine, SegmentStore, StoreStrategy};
use std::path::Path;
use std::sync::Arc;

/// How query results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lines.
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Opens the engine at `path`, or an in-memory engine when no path is given.
pub fn open_engine(path: Option<&Path>) -> Result<Arc<KvEngine>, Box<dyn std::error::Error>> {
    let engine = match path {
        Some(dir) => KvEngine::open_dir(dir, EngineConfig::default())?,
        None => {
            tracing::warn!("no --path given, using a temporary in-memory store");
            KvEngine::open_in_memory()?
        }
    };
    Ok(Arc::new(engine))
}

/// Opens the segment store selected by `strategy`.
pub fn open(
    path: Option<&Path>,
    strategy: StoreStrategy,
) -> Result<Arc<dyn SegmentStore>, Box<dyn std::error::Error>> {
    let store = open_store(strategy, open_engine(path)?);
    tracing::info!("Using {} store", store.name());
    Ok(store)
}

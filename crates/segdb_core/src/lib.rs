//! # SegDB Core
//!
//! Device segment memberships with expiry, stored on an embedded ordered
//! key-value engine, plus a concurrent bulk populator for load generation.
//!
//! Each device is one record holding a completion flag and an ordered map of
//! `segment_id -> [expiry, flags, partner]`. Because the expiry leads each
//! entry's value, pruning expired entries, reading active ones and counting
//! both are value-range operations on a single map, and every write to a
//! device is one atomic transaction.
//!
//! ## Example
//!
//! ```rust
//! use segdb_core::{open_store, id_for, KvEngine, Segment, StoreStrategy};
//! use std::sync::Arc;
//!
//! let engine = Arc::new(KvEngine::open_in_memory()?);
//! let store = open_store(StoreStrategy::Native, engine);
//!
//! let device = id_for(1);
//! store.insert_segment_and_remove_expired(&device, &Segment::expiring_in(7, "p.com", 1, 30))?;
//!
//! let active = store.get_active_segments(&device)?;
//! assert_eq!(active.len(), 1);
//! assert_eq!(active[0].segment_id, 7);
//! # Ok::<(), segdb_core::CoreError>(())
//! ```
//!
//! ## Crate layout
//!
//! - [`engine`]: records, operations, the framed log and [`KvEngine`]
//! - [`store`]: the [`SegmentStore`] contract and its two strategies
//! - [`populator`]: range partitioning, synthesis and [`BulkPopulator`]
//! - [`metrics`] and [`monitor`]: latency accounting and periodic reporting

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
mod config;
pub mod engine;
mod error;
pub mod metrics;
mod model;
pub mod monitor;
pub mod populator;
pub mod store;

pub use config::{default_threads, EngineConfig, MonitorConfig, PopulatorConfig, StoreStrategy};
pub use engine::{KvEngine, StatsSnapshot};
pub use error::{CoreError, CoreResult};
pub use metrics::{CounterMetric, MonitorMetric, TimingMetric, TimingSample};
pub use model::{
    id_for, DeviceRecord, Segment, DAYS_TO_KEEP_SEGMENTS, DEFAULT_PARTNER_ID, MAX_SEGMENT_ID,
};
pub use monitor::MonitorService;
pub use populator::{BulkPopulator, PopulationReport};
pub use store::{
    open_store, MappedSegmentStore, NativeSegmentStore, SegmentCounts, SegmentStore,
};

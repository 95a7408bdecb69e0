//! Engine, store, monitor and populator configuration.

use crate::error::{CoreError, CoreResult};
use crate::model::MAX_SEGMENT_ID;
use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::time::Duration;

/// Configuration for opening a [`KvEngine`](crate::engine::KvEngine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Whether to sync the log after every committed write (safer but slower).
    pub sync_on_commit: bool,

    /// Namespace prefix of every record key.
    pub namespace: String,

    /// Set name that device records are stored under.
    pub set_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sync_on_commit: false,
            namespace: "test".to_string(),
            set_name: "devices".to_string(),
        }
    }
}

impl EngineConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to sync the log on every commit.
    #[must_use]
    pub fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the namespace.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Sets the set name for device records.
    #[must_use]
    pub fn set_name(mut self, set_name: impl Into<String>) -> Self {
        self.set_name = set_name.into();
        self
    }
}

/// Which [`SegmentStore`](crate::store::SegmentStore) implementation to use.
///
/// Both strategies implement the same contract against the same persisted
/// layout and are interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreStrategy {
    /// Builds engine operations directly.
    #[default]
    Native,
    /// Goes through the declarative record mapping.
    Mapper,
}

impl FromStr for StoreStrategy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "native" => Ok(Self::Native),
            "mapper" => Ok(Self::Mapper),
            other => Err(CoreError::configuration(format!(
                "unknown algorithm '{other}', expected 'native' or 'mapper'"
            ))),
        }
    }
}

impl fmt::Display for StoreStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => f.write_str("native"),
            Self::Mapper => f.write_str("mapper"),
        }
    }
}

/// Configuration for the [`MonitorService`](crate::monitor::MonitorService).
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Time between two snapshot lines.
    pub interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
        }
    }
}

impl MonitorConfig {
    /// Sets the sampling interval.
    #[must_use]
    pub const fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Configuration for a [`BulkPopulator`](crate::populator::BulkPopulator) run.
#[derive(Debug, Clone)]
pub struct PopulatorConfig {
    /// Size of the segment id space; ids are drawn from `[0, num_segments)`.
    pub num_segments: u64,

    /// Total number of devices to generate.
    pub num_devices: u64,

    /// Mean number of segments per device.
    pub avg_segments_per_device: u64,

    /// Number of worker threads.
    pub num_threads: usize,

    /// Upper bound on how long to wait for the workers.
    pub wait_limit: Duration,

    /// Base seed for reproducible runs; workers use `seed + worker_index`.
    pub seed: Option<u64>,

    /// Monitor settings for the run.
    pub monitor: MonitorConfig,
}

impl PopulatorConfig {
    /// Default mean number of segments per device.
    pub const DEFAULT_AVG_SEGMENTS_PER_DEVICE: u64 = 100;

    /// Creates a configuration for `num_devices` devices over `num_segments` segment ids.
    #[must_use]
    pub fn new(num_devices: u64, num_segments: u64) -> Self {
        Self {
            num_segments,
            num_devices,
            avg_segments_per_device: Self::DEFAULT_AVG_SEGMENTS_PER_DEVICE,
            num_threads: default_threads(),
            wait_limit: Duration::from_secs(24 * 60 * 60),
            seed: None,
            monitor: MonitorConfig::default(),
        }
    }

    /// Sets the mean number of segments per device.
    #[must_use]
    pub const fn avg_segments_per_device(mut self, avg: u64) -> Self {
        self.avg_segments_per_device = avg;
        self
    }

    /// Sets the worker count.
    #[must_use]
    pub const fn num_threads(mut self, threads: usize) -> Self {
        self.num_threads = threads;
        self
    }

    /// Sets the wait limit.
    #[must_use]
    pub const fn wait_limit(mut self, limit: Duration) -> Self {
        self.wait_limit = limit;
        self
    }

    /// Sets the base seed.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the monitor configuration.
    #[must_use]
    pub fn monitor(mut self, monitor: MonitorConfig) -> Self {
        self.monitor = monitor;
        self
    }

    /// Checks the parameters before any store interaction.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Configuration`] if there are no worker threads or
    /// the segment id space is empty or reaches past [`MAX_SEGMENT_ID`].
    pub fn validate(&self) -> CoreResult<()> {
        if self.num_threads == 0 {
            return Err(CoreError::configuration("num_threads must be at least 1"));
        }
        if self.num_segments == 0 {
            return Err(CoreError::configuration("num_segments must be at least 1"));
        }
        if self.num_segments - 1 > MAX_SEGMENT_ID {
            return Err(CoreError::configuration(format!(
                "num_segments must be at most {}",
                MAX_SEGMENT_ID + 1
            )));
        }
        Ok(())
    }
}

/// Available parallelism, falling back to a single thread.
#[must_use]
pub fn default_threads() -> usize {
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

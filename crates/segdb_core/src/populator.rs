//! Concurrent synthetic data generation.
//!
//! A [`BulkPopulator`] splits the device id space `[0, num_devices)` into one
//! contiguous range per worker thread. Each worker synthesizes devices with
//! its own random generator and writes them one at a time through a shared
//! [`SegmentStore`], timing every write. Failed writes are counted and
//! skipped. A [`MonitorService`] reports progress while the workers run.
//!
//! The synthesis helpers are plain functions over an injected [`Rng`], so
//! they can be driven by a seeded generator in tests.

use crate::clock::{days_to_millis, now_millis};
use crate::config::PopulatorConfig;
use crate::error::CoreResult;
use crate::metrics::{CounterMetric, MonitorMetric, TimingMetric, TimingSample};
use crate::model::{id_for, DeviceRecord, Segment, DAYS_TO_KEEP_SEGMENTS, DEFAULT_PARTNER_ID};
use crate::monitor::{stdout_sink, LineSink, MonitorService};
use crate::store::SegmentStore;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Upper bound on segments synthesized for one device.
pub const MAX_SEGMENTS_PER_DEVICE: u64 = 1000;

/// Splits `[0, num_devices)` into `num_threads` contiguous ranges.
///
/// Each range takes `remaining / threads_left` ids, so later ranges absorb
/// the remainder. With fewer devices than threads the leading ranges are
/// empty. `num_threads == 0` yields no ranges.
#[must_use]
pub fn partition(num_devices: u64, num_threads: usize) -> Vec<Range<u64>> {
    let threads = num_threads as u64;
    let mut remaining = num_devices;
    (0..threads)
        .map(|i| {
            let take = remaining / (threads - i);
            let start = num_devices - remaining;
            remaining -= take;
            start..start + take
        })
        .collect()
}

/// Draws a segment count from a normal distribution with mean `avg` and
/// standard deviation `avg / 2`, clamped to `[0, MAX_SEGMENTS_PER_DEVICE]`.
pub fn segment_count<R: Rng + ?Sized>(rng: &mut R, avg: u64) -> u64 {
    let z: f64 = rng.sample(StandardNormal);
    let drawn = avg as f64 + (avg / 2) as f64 * z;
    // `as` saturates and truncates toward zero.
    (drawn as i64).clamp(0, MAX_SEGMENTS_PER_DEVICE as i64) as u64
}

/// Draws an expiry uniformly from `[now - range / 4, now + range)`, where
/// `range` is [`DAYS_TO_KEEP_SEGMENTS`] in milliseconds.
pub fn choose_expiry<R: Rng + ?Sized>(rng: &mut R, now: i64) -> i64 {
    let range = days_to_millis(DAYS_TO_KEEP_SEGMENTS);
    let past = range / 4;
    now - past + rng.gen_range(0..range + past)
}

/// Builds the synthetic device for seed `n`.
///
/// Segment ids are uniform over `[0, num_segments)`; a repeated id
/// overwrites the earlier draw, so a device may hold fewer segments than
/// were drawn.
pub fn synthesize_device<R: Rng + ?Sized>(
    rng: &mut R,
    n: u64,
    config: &PopulatorConfig,
    now: i64,
) -> DeviceRecord {
    let mut device = DeviceRecord::new(id_for(n));
    device.finished = rng.gen();

    let count = segment_count(rng, config.avg_segments_per_device);
    for _ in 0..count {
        let segment_id = rng.gen_range(0..config.num_segments);
        let expiry = choose_expiry(rng, now);
        device.insert_segment(Segment::new(segment_id, Some(expiry), 0, DEFAULT_PARTNER_ID));
    }
    device
}

/// Outcome of a [`BulkPopulator::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulationReport {
    /// Devices written successfully.
    pub devices_inserted: u64,
    /// Segment entries stored across all written devices.
    pub segments_created: u64,
    /// Devices whose write failed.
    pub device_inserts_failed: u64,
    /// Lifetime write latency figures.
    pub timing: TimingSample,
    /// Wall time of the run.
    pub elapsed: Duration,
    /// `false` if the wait limit expired before every worker finished.
    pub completed: bool,
}

/// Shared state of one run.
struct RunContext<'a> {
    store: &'a dyn SegmentStore,
    config: &'a PopulatorConfig,
    timer: Arc<TimingMetric>,
    devices_inserted: Arc<CounterMetric>,
    segments_created: Arc<CounterMetric>,
    device_inserts_failed: Arc<CounterMetric>,
    cancel: AtomicBool,
}

impl RunContext<'_> {
    fn worker(&self, index: usize, devices: Range<u64>) {
        tracing::debug!(worker = index, start = devices.start, end = devices.end, "worker started");

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(index as u64)),
            None => StdRng::from_entropy(),
        };
        let now = now_millis();

        for n in devices {
            if self.cancel.load(Ordering::Relaxed) {
                tracing::debug!(worker = index, next = n, "worker cancelled");
                return;
            }

            let device = synthesize_device(&mut rng, n, self.config, now);
            let start = Instant::now();
            match self.store.save_device(&device) {
                Ok(()) => {
                    self.timer.record(start.elapsed());
                    self.devices_inserted.increment();
                    self.segments_created.add(device.segment_count() as u64);
                }
                Err(e) => {
                    self.device_inserts_failed.increment();
                    tracing::warn!(device = %device.id, error = %e, "device insert failed");
                }
            }
        }
    }
}

/// Populates a [`SegmentStore`] with synthetic devices.
pub struct BulkPopulator {
    store: Arc<dyn SegmentStore>,
    config: PopulatorConfig,
    sink: LineSink,
}

impl BulkPopulator {
    /// Creates a populator, checking `config` first.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Configuration`](crate::CoreError::Configuration)
    /// if the configuration is invalid.
    pub fn new(store: Arc<dyn SegmentStore>, config: PopulatorConfig) -> CoreResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            sink: stdout_sink(),
        })
    }

    /// Sends monitor output to `sink` instead of standard output.
    #[must_use]
    pub fn with_sink(mut self, sink: LineSink) -> Self {
        self.sink = sink;
        self
    }

    /// Returns the run configuration.
    #[must_use]
    pub fn config(&self) -> &PopulatorConfig {
        &self.config
    }

    /// Generates and writes every device, then prints the run summary.
    ///
    /// Blocks until all workers finish or the wait limit expires. In the
    /// latter case workers are told to stop after their current device and
    /// the partial counts are returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the monitor or a worker thread cannot be started.
    /// Individual write failures are counted, not returned.
    pub fn run(&self) -> CoreResult<PopulationReport> {
        let config = &self.config;
        tracing::info!(
            devices = config.num_devices,
            segments = config.num_segments,
            avg_segments = config.avg_segments_per_device,
            threads = config.num_threads,
            store = self.store.name(),
            "populating"
        );

        let ctx = RunContext {
            store: self.store.as_ref(),
            config,
            timer: Arc::new(TimingMetric::new("timer", "device write latency")),
            devices_inserted: Arc::new(CounterMetric::new("devicesInserted", "devices written")),
            segments_created: Arc::new(CounterMetric::new("segmentsCreated", "segments written")),
            device_inserts_failed: Arc::new(CounterMetric::new(
                "deviceInsertsFailed",
                "device writes that failed",
            )),
            cancel: AtomicBool::new(false),
        };

        let metrics: Vec<Arc<dyn MonitorMetric>> = vec![
            ctx.timer.clone(),
            ctx.devices_inserted.clone(),
            ctx.segments_created.clone(),
            ctx.device_inserts_failed.clone(),
        ];
        let monitor = MonitorService::start(&config.monitor, metrics, self.sink.clone())?;

        let started = Instant::now();
        let completed = thread::scope(|scope| -> CoreResult<bool> {
            let ranges = partition(config.num_devices, config.num_threads);
            let workers = ranges.len();
            let (done_tx, done_rx) = mpsc::channel::<()>();

            for (index, devices) in ranges.into_iter().enumerate() {
                let done = done_tx.clone();
                let ctx = &ctx;
                thread::Builder::new()
                    .name(format!("populator-{index}"))
                    .spawn_scoped(scope, move || {
                        ctx.worker(index, devices);
                        let _ = done.send(());
                    })?;
            }
            drop(done_tx);

            let deadline = started.checked_add(config.wait_limit);
            let mut finished = 0;
            while finished < workers {
                let wait = deadline.map_or(Duration::MAX, |d| {
                    d.saturating_duration_since(Instant::now())
                });
                match done_rx.recv_timeout(wait) {
                    Ok(()) => finished += 1,
                    Err(RecvTimeoutError::Timeout) => {
                        tracing::warn!(
                            finished,
                            workers,
                            "wait limit reached, stopping workers"
                        );
                        ctx.cancel.store(true, Ordering::Relaxed);
                        return Ok(false);
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            Ok(true)
        });
        let elapsed = started.elapsed();

        if completed.is_err() {
            ctx.cancel.store(true, Ordering::Relaxed);
        }
        monitor.stop();
        let completed = completed?;

        let report = PopulationReport {
            devices_inserted: ctx.devices_inserted.get(),
            segments_created: ctx.segments_created.get(),
            device_inserts_failed: ctx.device_inserts_failed.get(),
            timing: ctx.timer.totals(),
            elapsed,
            completed,
        };
        tracing::info!(
            inserted = report.devices_inserted,
            failed = report.device_inserts_failed,
            segments = report.segments_created,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "population finished"
        );
        Ok(report)
    }
}

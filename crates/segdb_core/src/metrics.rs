//! Run metrics sampled by the [`MonitorService`](crate::monitor::MonitorService).

use crate::clock::as_micros;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// A metric the monitor can render.
pub trait MonitorMetric: Send + Sync {
    /// Short metric name.
    fn name(&self) -> &str;

    /// One-line description.
    fn description(&self) -> &str;

    /// Renders the current value.
    ///
    /// May update internal state, e.g. the "since last sample" window of a
    /// [`TimingMetric`].
    fn sample(&self) -> String;
}

/// Formats `n` with `,` thousands separators.
#[must_use]
pub fn format_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Latency figures of a [`TimingMetric`], all latencies in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimingSample {
    /// Operations recorded over the metric's lifetime.
    pub total_count: u64,
    /// Lifetime average latency.
    pub avg_latency: u64,
    /// Operations recorded since the previous sample.
    pub delta_count: u64,
    /// Average latency since the previous sample; `0` when there were none.
    pub delta_latency: u64,
}

impl fmt::Display for TimingSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Avg latency: {}us, iterations: {}, last latency: {}us, last iterations: {}",
            format_thousands(self.avg_latency),
            format_thousands(self.total_count),
            format_thousands(self.delta_latency),
            format_thousands(self.delta_count),
        )
    }
}

/// Accumulates operation counts and latencies from many threads.
///
/// Recording is two relaxed atomic adds. Sampling reads both totals and
/// diffs them against the totals of the previous sample.
#[derive(Debug)]
pub struct TimingMetric {
    name: String,
    description: String,
    count: AtomicU64,
    micros: AtomicU64,
    /// `(count, micros)` at the previous sample.
    last: Mutex<(u64, u64)>,
}

impl TimingMetric {
    /// Creates an empty metric.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            count: AtomicU64::new(0),
            micros: AtomicU64::new(0),
            last: Mutex::new((0, 0)),
        }
    }

    /// Records one operation that took `elapsed`.
    pub fn record(&self, elapsed: Duration) {
        self.micros.fetch_add(as_micros(elapsed), Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Operations recorded so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Lifetime figures without advancing the sample window.
    #[must_use]
    pub fn totals(&self) -> TimingSample {
        let count = self.count();
        let micros = self.micros.load(Ordering::Relaxed);
        TimingSample {
            total_count: count,
            avg_latency: micros / count.max(1),
            delta_count: 0,
            delta_latency: 0,
        }
    }

    /// Takes a sample and starts a new delta window.
    pub fn take_sample(&self) -> TimingSample {
        let mut last = self.last.lock();
        let count = self.count();
        let micros = self.micros.load(Ordering::Relaxed);

        let delta_count = count.saturating_sub(last.0);
        let delta_micros = micros.saturating_sub(last.1);
        *last = (count, micros);

        TimingSample {
            total_count: count,
            avg_latency: micros / count.max(1),
            delta_count,
            delta_latency: if delta_count == 0 {
                0
            } else {
                delta_micros / delta_count
            },
        }
    }
}

impl MonitorMetric for TimingMetric {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn sample(&self) -> String {
        self.take_sample().to_string()
    }
}

/// A named monotonic counter.
#[derive(Debug)]
pub struct CounterMetric {
    name: String,
    description: String,
    value: AtomicU64,
}

impl CounterMetric {
    /// Creates a counter at zero.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            value: AtomicU64::new(0),
        }
    }

    /// Adds `n`.
    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    /// Adds one.
    pub fn increment(&self) {
        self.add(1);
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl MonitorMetric for CounterMetric {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn sample(&self) -> String {
        format!("{}: {}", self.name, format_thousands(self.get()))
    }
}

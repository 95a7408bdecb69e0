//! Periodic metric reporting.
//!
//! A [`MonitorService`] owns one background thread that prints a line with
//! every registered metric at a fixed cadence:
//!
//! ```text
//! 1,000ms: Avg latency: 412us, iterations: 2,310, last latency: 412us, last iterations: 2,310
//! ```
//!
//! The first line is printed as soon as the monitor starts.
//! [`MonitorService::stop`] signals the thread, waits for it to exit, then
//! prints `Run complete:` followed by one final tab-indented line. The
//! summary is printed once, however many times `stop` is called.

use crate::config::MonitorConfig;
use crate::error::CoreResult;
use crate::metrics::{format_thousands, MonitorMetric};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Destination of monitor lines.
pub type LineSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Sink that prints each line to standard output.
#[must_use]
pub fn stdout_sink() -> LineSink {
    Arc::new(|line: &str| println!("{line}"))
}

struct Shared {
    stop: Mutex<bool>,
    signal: Condvar,
    metrics: Vec<Arc<dyn MonitorMetric>>,
    sink: LineSink,
    started: Instant,
}

impl Shared {
    fn render(&self) -> String {
        self.metrics
            .iter()
            .map(|m| m.sample())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn tick_line(&self) -> String {
        let elapsed = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        format!("{:>5}ms: {}", format_thousands(elapsed), self.render())
    }

    fn emit_tick(&self) {
        (self.sink)(&self.tick_line());
    }
}

/// Background metric reporter.
pub struct MonitorService {
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
    completed: AtomicBool,
}

impl MonitorService {
    /// Starts a monitor that hands every line to `sink`.
    ///
    /// # Errors
    ///
    /// Returns an error if the monitor thread cannot be spawned.
    pub fn start(
        config: &MonitorConfig,
        metrics: Vec<Arc<dyn MonitorMetric>>,
        sink: LineSink,
    ) -> CoreResult<Self> {
        let shared = Arc::new(Shared {
            stop: Mutex::new(false),
            signal: Condvar::new(),
            metrics,
            sink,
            started: Instant::now(),
        });

        let interval = config.interval.max(Duration::from_millis(1));
        let worker = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("monitor".into())
            .spawn(move || run(&worker, interval))?;

        tracing::debug!(interval_ms = interval.as_millis() as u64, "monitor started");
        Ok(Self {
            shared,
            handle: Mutex::new(Some(handle)),
            completed: AtomicBool::new(false),
        })
    }

    /// Returns whether the background thread is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Stops the loop, waits for it to exit and prints the final summary.
    pub fn stop(&self) {
        {
            let mut stop = self.shared.stop.lock();
            *stop = true;
            self.shared.signal.notify_all();
        }

        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                tracing::warn!("monitor thread panicked");
            }
        }

        if !self.completed.swap(true, Ordering::AcqRel) {
            (self.shared.sink)("Run complete:");
            (self.shared.sink)(&format!("\t{}", self.shared.tick_line()));
        }
    }
}

impl Drop for MonitorService {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(shared: &Shared, interval: Duration) {
    let mut next_tick = Instant::now();
    let mut stop = shared.stop.lock();

    loop {
        while !*stop {
            if shared.signal.wait_until(&mut stop, next_tick).timed_out() {
                break;
            }
        }
        if *stop {
            return;
        }

        MutexGuard::unlocked(&mut stop, || shared.emit_tick());

        next_tick += interval;
        let now = Instant::now();
        if next_tick <= now {
            next_tick = now + interval;
        }
    }
}

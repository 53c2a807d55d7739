//! Periodic execution of the info and stats cycles.
//!
//! Each cycle kind runs on its own thread with its own timer. The two loops
//! share the collector but are not ordered relative to each other, and a
//! hung connection in one does not delay the other.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info};

use crate::collector::{Collector, ControlSocket, CycleKind};

/// Granularity of shutdown checks while waiting for the next tick.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Longest supported polling interval. Longer periods are clamped so tick
/// arithmetic on `Instant` cannot overflow.
pub const MAX_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Drives both collection cycles until the running flag is cleared.
pub struct Scheduler<S: ControlSocket + 'static> {
    collector: Arc<Collector<S>>,
    interval: Duration,
    running: Arc<AtomicBool>,
}

impl<S: ControlSocket + 'static> Scheduler<S> {
    pub fn new(collector: Arc<Collector<S>>, running: Arc<AtomicBool>) -> Self {
        let interval = collector.interval();
        Self {
            collector,
            interval,
            running,
        }
    }

    /// Polls at a different period than the reporting interval stamped on
    /// measurements. Mostly useful in tests.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Runs both cycles and blocks until they have stopped.
    pub fn run(self) -> io::Result<()> {
        let mut workers = Vec::with_capacity(CycleKind::ALL.len());
        for kind in CycleKind::ALL {
            let collector = self.collector.clone();
            let running = self.running.clone();
            let interval = self.interval;
            let handle = thread::Builder::new()
                .name(format!("{}-cycle", kind.name()))
                .spawn(move || run_loop(&collector, kind, interval, &running))?;
            workers.push(handle);
        }

        for handle in workers {
            if handle.join().is_err() {
                return Err(io::Error::other("collection thread panicked"));
            }
        }
        Ok(())
    }
}

/// Runs one cycle kind every `interval` until `running` turns false.
///
/// Ticks are scheduled from the loop start, so a slow cycle shortens the
/// following wait instead of shifting every later tick. A cycle that
/// overruns the whole interval skips the missed ticks and restarts the
/// schedule from its own end.
fn run_loop<S: ControlSocket>(
    collector: &Collector<S>,
    kind: CycleKind,
    interval: Duration,
    running: &AtomicBool,
) {
    let interval = interval.min(MAX_INTERVAL);
    info!("Starting {} cycle every {:?}", kind.name(), interval);
    let mut next_tick = Instant::now();
    let mut cycle_count: u64 = 0;

    while running.load(Ordering::SeqCst) {
        cycle_count += 1;
        match collector.collect(kind, Utc::now()) {
            Ok(stats) => debug!(
                "{} cycle #{}: {} bytes, {} fields, {} emitted, {} dropped, {} write failures",
                kind.name(),
                cycle_count,
                stats.bytes,
                stats.records,
                stats.emitted,
                stats.dropped,
                stats.write_failures
            ),
            // Already observed by the collector.
            Err(e) => debug!("{} cycle #{} aborted: {}", kind.name(), cycle_count, e),
        }

        next_tick += interval;
        let now = Instant::now();
        if next_tick <= now {
            next_tick = now + interval;
        }

        // Sleep with periodic checks for shutdown signal
        while running.load(Ordering::SeqCst) {
            let remaining = next_tick.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            thread::sleep(remaining.min(SLEEP_SLICE));
        }
    }

    info!("Stopped {} cycle after {} runs", kind.name(), cycle_count);
}

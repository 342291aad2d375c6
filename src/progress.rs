//! Progress Reporter: a background status line with rate/ETA, and the
//! abort-threshold re-check (spec §4.15).
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::info;

pub const DEFAULT_INTERVAL_SECS: u64 = 10;

/// Shared, process-wide completion counters consulted by the reporter
/// and honoured by the Orchestrator (spec §5 Shared state).
#[derive(Default)]
pub struct ProgressCounters {
    pub completed_docs: AtomicU64,
    pub failure_count: AtomicU64,
    pub reporter_done: AtomicBool,
}

impl ProgressCounters {
    pub fn new() -> Arc<ProgressCounters> {
        Arc::new(ProgressCounters::default())
    }

    pub fn record_completion(&self, succeeded: bool) {
        self.completed_docs.fetch_add(1, Ordering::Relaxed);
        if !succeeded {
            self.failure_count.fetch_add(1, Ordering::Relaxed);
        }
    }
}

pub struct Line {
    pub elapsed_secs: f64,
    pub done: u64,
    pub total: u64,
    pub pct: f64,
    pub rate_docs_per_sec: f64,
    pub eta_secs: Option<f64>,
    pub failures: u64,
}

impl Line {
    /// `[elapsed] done/total (pct%) | rate docs/s | ETA | failures`
    /// (spec §4.15, printed verbatim).
    pub fn render(&self) -> String {
        let eta = match self.eta_secs {
            Some(s) if s.is_finite() => format!("{s:.0}s"),
            _ => "unknown".to_string(),
        };
        format!(
            "[{:.0}s] {}/{} ({:.1}%) | {:.1} docs/s | ETA {} | {} failures",
            self.elapsed_secs, self.done, self.total, self.pct, self.rate_docs_per_sec, eta, self.failures
        )
    }
}

pub fn compute_line(counters: &ProgressCounters, total: u64, started_at: Instant) -> Line {
    let done = counters.completed_docs.load(Ordering::Relaxed);
    let failures = counters.failure_count.load(Ordering::Relaxed);
    let elapsed_secs = started_at.elapsed().as_secs_f64();
    let rate = if elapsed_secs > 0.0 {
        done as f64 / elapsed_secs
    } else {
        0.0
    };
    let pct = if total > 0 {
        done as f64 / total as f64 * 100.0
    } else {
        0.0
    };
    let eta_secs = if rate > 0.0 && total > done {
        Some((total - done) as f64 / rate)
    } else {
        None
    };

    Line {
        elapsed_secs,
        done,
        total,
        pct,
        rate_docs_per_sec: rate,
        eta_secs,
        failures,
    }
}

/// Re-evaluate the process-wide abort threshold (spec §4.12): after
/// 1000+ completed documents, failure rate over `threshold_pct` trips
/// the flag. Shared with the Fault Handler's own latch so either side
/// can trip it.
pub fn check_abort_threshold(counters: &ProgressCounters, threshold_pct: f64, abort: &AtomicBool) -> bool {
    let done = counters.completed_docs.load(Ordering::Relaxed);
    if done < 1000 {
        return false;
    }
    let failures = counters.failure_count.load(Ordering::Relaxed);
    let rate_pct = failures as f64 / done as f64 * 100.0;
    if rate_pct > threshold_pct {
        abort.store(true, Ordering::Release);
        true
    } else {
        abort.load(Ordering::Acquire)
    }
}

/// Spawns the background reporter thread described in spec §4.15: runs
/// on worker 0 only, printing a [Line] every `interval_secs` until
/// `reporter_done` is set.
pub fn spawn(
    counters: Arc<ProgressCounters>,
    total: u64,
    interval_secs: u64,
    failure_threshold_pct: f64,
    abort: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let started_at = Instant::now();
        let interval = Duration::from_secs(interval_secs.max(1));
        loop {
            thread::sleep(interval);
            if counters.reporter_done.load(Ordering::Acquire) {
                break;
            }
            let line = compute_line(&counters, total, started_at);
            info!("{}", line.render());
            check_abort_threshold(&counters, failure_threshold_pct, &abort);
        }
    })
}

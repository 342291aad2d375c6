//! Result Aggregator: per-worker counters and global reduction into the
//! run report (spec §4.15).
use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::content_kind::ContentKind;

/// Per-worker record of counters, all monotonic atomics so a worker's
/// tasks can update them without a lock (spec §5 Shared state).
pub struct WorkerStats {
    worker_id: usize,
    docs: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    timeouts: AtomicU64,
    skipped_resumed: AtomicU64,
    skipped_aborted: AtomicU64,
    bytes: AtomicU64,
    pages: AtomicU64,
    words: AtomicU64,
    chars: AtomicU64,
    duration_ms_total: AtomicU64,
    slowest_ms: AtomicU64,
    per_kind: [AtomicU64; ContentKind::COUNT],
}

impl WorkerStats {
    pub fn new(worker_id: usize) -> WorkerStats {
        WorkerStats {
            worker_id,
            docs: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            skipped_resumed: AtomicU64::new(0),
            skipped_aborted: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            pages: AtomicU64::new(0),
            words: AtomicU64::new(0),
            chars: AtomicU64::new(0),
            duration_ms_total: AtomicU64::new(0),
            slowest_ms: AtomicU64::new(0),
            per_kind: Default::default(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &self,
        kind: ContentKind,
        succeeded: bool,
        was_timeout: bool,
        bytes: u64,
        pages: u64,
        words: u64,
        chars: u64,
        elapsed_ms: f64,
    ) {
        self.docs.fetch_add(1, Ordering::Relaxed);
        if succeeded {
            self.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        if was_timeout {
            self.timeouts.fetch_add(1, Ordering::Relaxed);
        }
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
        self.pages.fetch_add(pages, Ordering::Relaxed);
        self.words.fetch_add(words, Ordering::Relaxed);
        self.chars.fetch_add(chars, Ordering::Relaxed);
        let ms = elapsed_ms.round().max(0.0) as u64;
        self.duration_ms_total.fetch_add(ms, Ordering::Relaxed);
        self.slowest_ms.fetch_max(ms, Ordering::Relaxed);
        self.per_kind[kind.code() as usize].fetch_add(1, Ordering::Relaxed);
    }

    /// Record a manifest index skipped because the checkpoint already
    /// marked it done on a prior run (spec §4.1 step 1). Counts toward
    /// `docs` so every visited index is tallied exactly once (P1/P2).
    pub fn record_skipped_resumed(&self) {
        self.docs.fetch_add(1, Ordering::Relaxed);
        self.skipped_resumed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a manifest index abandoned because the abort flag was set
    /// before it could be attempted (spec §4.1 step 2).
    pub fn record_skipped_aborted(&self) {
        self.docs.fetch_add(1, Ordering::Relaxed);
        self.skipped_aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn completed(&self) -> u64 {
        self.docs.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    fn snapshot(&self) -> WorkerSnapshot {
        let mut per_kind = [0u64; ContentKind::COUNT];
        for (i, slot) in self.per_kind.iter().enumerate() {
            per_kind[i] = slot.load(Ordering::Relaxed);
        }
        WorkerSnapshot {
            worker_id: self.worker_id,
            docs: self.docs.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            skipped_resumed: self.skipped_resumed.load(Ordering::Relaxed),
            skipped_aborted: self.skipped_aborted.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            pages: self.pages.load(Ordering::Relaxed),
            words: self.words.load(Ordering::Relaxed),
            chars: self.chars.load(Ordering::Relaxed),
            duration_ms_total: self.duration_ms_total.load(Ordering::Relaxed),
            slowest_ms: self.slowest_ms.load(Ordering::Relaxed),
            per_kind,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct WorkerSnapshot {
    worker_id: usize,
    docs: u64,
    successes: u64,
    failures: u64,
    timeouts: u64,
    skipped_resumed: u64,
    skipped_aborted: u64,
    bytes: u64,
    pages: u64,
    words: u64,
    chars: u64,
    duration_ms_total: u64,
    slowest_ms: u64,
    per_kind: [u64; ContentKind::COUNT],
}

/// The global reduction across all workers (spec §4.15).
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub total_docs: u64,
    pub successes: u64,
    pub failures: u64,
    pub timeouts: u64,
    /// Indices the checkpoint already marked done on a prior run (spec
    /// §4.1 step 1). `successes + failures + skipped_resumed +
    /// skipped_aborted == total_docs` always holds (P1/P2).
    pub skipped_resumed: u64,
    /// Indices abandoned because the abort flag tripped before they were
    /// attempted (spec §4.1 step 2).
    pub skipped_aborted: u64,
    pub bytes: u64,
    pub pages: u64,
    pub words: u64,
    pub chars: u64,
    pub duration_ms_total: u64,
    pub slowest_ms: u64,
    pub per_kind: [u64; ContentKind::COUNT],
    pub failure_rate_pct: f64,
    pub throughput_docs_per_sec: f64,
    pub wall_clock_secs: f64,
}

/// Reduce every worker's counters into a single [RunReport].
/// `wall_clock_secs` is the run's measured end-to-end duration (not the
/// sum of per-worker durations, since workers run concurrently).
pub fn reduce(workers: &[WorkerStats], wall_clock_secs: f64) -> RunReport {
    let snapshots: Vec<WorkerSnapshot> = workers.iter().map(|w| w.snapshot()).collect();

    let mut report = RunReport {
        total_docs: 0,
        successes: 0,
        failures: 0,
        timeouts: 0,
        skipped_resumed: 0,
        skipped_aborted: 0,
        bytes: 0,
        pages: 0,
        words: 0,
        chars: 0,
        duration_ms_total: 0,
        slowest_ms: 0,
        per_kind: [0; ContentKind::COUNT],
        failure_rate_pct: 0.0,
        throughput_docs_per_sec: 0.0,
        wall_clock_secs,
    };

    for s in &snapshots {
        report.total_docs += s.docs;
        report.successes += s.successes;
        report.failures += s.failures;
        report.timeouts += s.timeouts;
        report.skipped_resumed += s.skipped_resumed;
        report.skipped_aborted += s.skipped_aborted;
        report.bytes += s.bytes;
        report.pages += s.pages;
        report.words += s.words;
        report.chars += s.chars;
        report.duration_ms_total += s.duration_ms_total;
        report.slowest_ms = report.slowest_ms.max(s.slowest_ms);
        for i in 0..ContentKind::COUNT {
            report.per_kind[i] += s.per_kind[i];
        }
    }

    if report.total_docs > 0 {
        report.failure_rate_pct = report.failures as f64 / report.total_docs as f64 * 100.0;
    }
    if wall_clock_secs > 0.0 {
        report.throughput_docs_per_sec = report.total_docs as f64 / wall_clock_secs;
    }

    report
}

impl RunReport {
    pub fn write_json(&self, output_dir: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .expect("RunReport serialization is infallible (no maps, no non-finite keys)");
        fs::write(output_dir.join("run-report.json"), json)
    }

    pub fn write_scheme(&self, output_dir: &Path) -> io::Result<()> {
        fs::write(output_dir.join("run-report.scm"), self.to_scheme())
    }

    /// Hand-rolled Scheme S-expression rendering of the report (spec
    /// §4.15: "written as both a Scheme S-expression and a JSON file").
    pub fn to_scheme(&self) -> String {
        let mut kinds = String::new();
        for code in 0..ContentKind::COUNT {
            let kind = ContentKind::from_code(code as u8);
            kinds.push_str(&format!("\n    ({} . {})", kind.name(), self.per_kind[code]));
        }
        format!(
            "(run-report\n  (total-docs . {})\n  (successes . {})\n  (failures . {})\n  (timeouts . {})\n  (skipped-resumed . {})\n  (skipped-aborted . {})\n  (bytes . {})\n  (pages . {})\n  (words . {})\n  (chars . {})\n  (duration-ms-total . {})\n  (slowest-ms . {})\n  (failure-rate-pct . {:.4})\n  (throughput-docs-per-sec . {:.4})\n  (wall-clock-secs . {:.4})\n  (per-kind ({}\n  )))\n",
            self.total_docs,
            self.successes,
            self.failures,
            self.timeouts,
            self.skipped_resumed,
            self.skipped_aborted,
            self.bytes,
            self.pages,
            self.words,
            self.chars,
            self.duration_ms_total,
            self.slowest_ms,
            self.failure_rate_pct,
            self.throughput_docs_per_sec,
            self.wall_clock_secs,
            kinds,
        )
    }

    /// Single-line human summary, printed to stdout at run end.
    pub fn summary_line(&self) -> String {
        format!(
            "{} docs: {} ok, {} failed ({:.2}%), {:.1} docs/s over {:.1}s",
            self.total_docs,
            self.successes,
            self.failures,
            self.failure_rate_pct,
            self.throughput_docs_per_sec,
            self.wall_clock_secs,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_worker_record_and_reduce() {
        let w = WorkerStats::new(0);
        w.record(ContentKind::Pdf, true, false, 1000, 5, 200, 1000, 12.5);
        w.record(ContentKind::Image, false, true, 500, 1, 0, 0, 9000.0);

        let report = reduce(&[w], 2.0);
        assert_eq!(report.total_docs, 2);
        assert_eq!(report.successes, 1);
        assert_eq!(report.failures, 1);
        assert_eq!(report.timeouts, 1);
        assert_eq!(report.per_kind[ContentKind::Pdf.code() as usize], 1);
        assert_eq!(report.per_kind[ContentKind::Image.code() as usize], 1);
        assert_eq!(report.failure_rate_pct, 50.0);
        assert_eq!(report.throughput_docs_per_sec, 1.0);
    }

    #[test]
    fn reduce_sums_across_multiple_workers() {
        let w0 = WorkerStats::new(0);
        let w1 = WorkerStats::new(1);
        w0.record(ContentKind::Pdf, true, false, 1, 1, 1, 1, 10.0);
        w1.record(ContentKind::Pdf, true, false, 1, 1, 1, 1, 20.0);
        w1.record(ContentKind::Pdf, true, false, 1, 1, 1, 1, 30.0);

        let report = reduce(&[w0, w1], 1.0);
        assert_eq!(report.total_docs, 3);
        assert_eq!(report.slowest_ms, 30);
        assert_eq!(report.duration_ms_total, 60);
    }

    #[test]
    fn reduce_on_zero_docs_avoids_division_by_zero() {
        let w = WorkerStats::new(0);
        let report = reduce(&[w], 0.0);
        assert_eq!(report.failure_rate_pct, 0.0);
        assert_eq!(report.throughput_docs_per_sec, 0.0);
    }

    #[test]
    fn json_and_scheme_reports_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let w = WorkerStats::new(0);
        w.record(ContentKind::Pdf, true, false, 10, 1, 5, 20, 4.0);
        let report = reduce(&[w], 1.0);

        report.write_json(dir.path()).unwrap();
        report.write_scheme(dir.path()).unwrap();

        assert!(dir.path().join("run-report.json").exists());
        assert!(dir.path().join("run-report.scm").exists());
        let scm = fs::read_to_string(dir.path().join("run-report.scm")).unwrap();
        assert!(scm.starts_with("(run-report"));
        assert!(scm.contains("(pdf . 1)"));
    }

    #[test]
    fn skipped_indices_count_toward_total_docs() {
        let w = WorkerStats::new(0);
        w.record(ContentKind::Pdf, true, false, 1, 1, 1, 1, 1.0);
        w.record_skipped_resumed();
        w.record_skipped_resumed();
        w.record_skipped_aborted();

        let report = reduce(&[w], 1.0);
        assert_eq!(report.total_docs, 4);
        assert_eq!(report.successes, 1);
        assert_eq!(report.skipped_resumed, 2);
        assert_eq!(report.skipped_aborted, 1);
        assert_eq!(
            report.successes + report.failures + report.skipped_resumed + report.skipped_aborted,
            report.total_docs
        );
    }

    #[test]
    fn summary_line_is_non_empty() {
        let w = WorkerStats::new(0);
        w.record(ContentKind::Pdf, true, false, 1, 1, 1, 1, 1.0);
        let report = reduce(&[w], 1.0);
        assert!(report.summary_line().contains("docs:"));
    }
}

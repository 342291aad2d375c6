//! Fault Handler: wraps the Parser Bridge with retry and accounting
//! (spec §4.12).
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use log::warn;

use crate::content_kind::ContentKind;
use crate::model::{ParseResult, ParseStatus};
use crate::parser_bridge::{OutputFormat, ParserBridge};
use crate::stages::StageMask;

/// After this many completed documents, the abort threshold check
/// becomes active (spec §4.12).
pub const MIN_SAMPLE_FOR_ABORT: u64 = 1000;

#[derive(Debug, Default)]
pub struct KindTally {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
}

/// Per-worker accounting across every retried parse (spec §3 Run
/// Statistics, spec §4.12).
pub struct FaultHandler {
    max_retries: u32,
    timeout_ms: u64,
    failure_threshold_pct: f64,
    completed: AtomicU64,
    failures: AtomicU64,
    abort: std::sync::atomic::AtomicBool,
    per_kind: std::sync::Mutex<HashMap<ContentKind, KindTally>>,
}

pub struct AttemptOutcome {
    pub result: ParseResult,
    pub attempts: u32,
    pub elapsed_ms: f64,
    pub was_straggler: bool,
}

impl FaultHandler {
    pub fn new(max_retries: u32, timeout_ms: u64, failure_threshold_pct: f64) -> FaultHandler {
        FaultHandler {
            max_retries,
            timeout_ms,
            failure_threshold_pct,
            completed: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            abort: std::sync::atomic::AtomicBool::new(false),
            per_kind: std::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn abort_flag(&self) -> bool {
        self.abort.load(Ordering::Acquire)
    }

    /// Attempt a parse, retrying on transient (retryable) statuses up to
    /// `maxRetriesPerDoc`. FileNotFound/UnsupportedFormat/NullArgument are
    /// terminal after one attempt (spec §4.12, §7).
    pub fn run(
        &self,
        bridge: &mut dyn ParserBridge,
        input_path: Option<&Path>,
        output_path: &Path,
        format: OutputFormat,
        stages_mask: StageMask,
        ocr_confidence: Option<i8>,
    ) -> AttemptOutcome {
        let start = Instant::now();
        let mut attempts = 0u32;
        let mut result;
        loop {
            attempts += 1;
            result = bridge.parse(input_path, output_path, format, stages_mask, ocr_confidence);
            let status = result.status();
            if status.is_ok() || !status.is_retryable() {
                break;
            }
            if attempts > self.max_retries {
                break;
            }
            warn!(
                "retrying parse (attempt {attempts}/{}) after status {status:?}",
                self.max_retries + 1
            );
        }

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        let was_straggler = elapsed_ms > self.timeout_ms as f64;
        if was_straggler {
            warn!(
                "straggler: parse took {elapsed_ms:.1}ms, exceeding the {}ms per-document timeout",
                self.timeout_ms
            );
        }

        self.record(result.content_kind(), result.status(), attempts as u64);
        AttemptOutcome {
            result,
            attempts,
            elapsed_ms,
            was_straggler,
        }
    }

    fn record(&self, kind: ContentKind, status: ParseStatus, attempts: u64) {
        let completed = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        if !status.is_ok() {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }

        {
            let mut per_kind = self.per_kind.lock().expect("per-kind tally mutex poisoned");
            let tally = per_kind.entry(kind).or_default();
            tally.attempts += attempts;
            if status.is_ok() {
                tally.successes += 1;
            } else {
                tally.failures += 1;
            }
        }

        if completed >= MIN_SAMPLE_FOR_ABORT {
            let failures = self.failures.load(Ordering::Relaxed);
            let rate_pct = failures as f64 / completed as f64 * 100.0;
            if rate_pct > self.failure_threshold_pct {
                if !self.abort.swap(true, Ordering::AcqRel) {
                    warn!(
                        "failure rate {rate_pct:.2}% exceeds threshold {:.2}% after {completed} documents; setting abort flag",
                        self.failure_threshold_pct
                    );
                }
            }
        }
    }

    pub fn failure_rate_pct(&self) -> f64 {
        let completed = self.completed.load(Ordering::Relaxed);
        if completed == 0 {
            return 0.0;
        }
        self.failures.load(Ordering::Relaxed) as f64 / completed as f64 * 100.0
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content_kind::ContentKind;

    struct FlakyBridge {
        fail_times: u32,
        calls: u32,
    }

    impl ParserBridge for FlakyBridge {
        fn version(&self) -> &'static str {
            "flaky/1"
        }
        fn set_ml_handle(&mut self, _attached: bool) {}
        fn set_gpu_ocr_handle(&mut self, _attached: bool) {}
        fn parse(
            &mut self,
            _input_path: Option<&Path>,
            _output_path: &Path,
            _format: OutputFormat,
            _stages_mask: StageMask,
            _ocr_confidence: Option<i8>,
        ) -> ParseResult {
            self.calls += 1;
            if self.calls <= self.fail_times {
                ParseResult::new(ParseStatus::Error, ContentKind::Pdf)
            } else {
                ParseResult::new(ParseStatus::Ok, ContentKind::Pdf)
            }
        }
    }

    struct AlwaysBridge(ParseStatus);
    impl ParserBridge for AlwaysBridge {
        fn version(&self) -> &'static str {
            "always/1"
        }
        fn set_ml_handle(&mut self, _attached: bool) {}
        fn set_gpu_ocr_handle(&mut self, _attached: bool) {}
        fn parse(
            &mut self,
            _input_path: Option<&Path>,
            _output_path: &Path,
            _format: OutputFormat,
            _stages_mask: StageMask,
            _ocr_confidence: Option<i8>,
        ) -> ParseResult {
            ParseResult::new(self.0, ContentKind::Pdf)
        }
    }

    #[test]
    fn retries_transient_errors_until_success() {
        let fh = FaultHandler::new(3, 300_000, 5.0);
        let mut bridge = FlakyBridge { fail_times: 2, calls: 0 };
        let outcome = fh.run(&mut bridge, None, Path::new("/tmp/out"), OutputFormat::Json, StageMask::empty(), None);
        assert_eq!(outcome.result.status(), ParseStatus::Ok);
        assert_eq!(outcome.attempts, 3);
    }

    #[test]
    fn gives_up_after_max_retries() {
        let fh = FaultHandler::new(2, 300_000, 5.0);
        let mut bridge = AlwaysBridge(ParseStatus::Error);
        let outcome = fh.run(&mut bridge, None, Path::new("/tmp/out"), OutputFormat::Json, StageMask::empty(), None);
        assert_eq!(outcome.result.status(), ParseStatus::Error);
        assert_eq!(outcome.attempts, 3); // initial + 2 retries
    }

    #[test]
    fn terminal_statuses_are_not_retried() {
        let fh = FaultHandler::new(5, 300_000, 5.0);
        let mut bridge = AlwaysBridge(ParseStatus::FileNotFound);
        let outcome = fh.run(&mut bridge, None, Path::new("/tmp/out"), OutputFormat::Json, StageMask::empty(), None);
        assert_eq!(outcome.attempts, 1);
    }

    #[test]
    fn abort_flag_sets_after_threshold_sample_and_failure_rate() {
        let fh = FaultHandler::new(0, 300_000, 5.0);
        for _ in 0..950 {
            let mut bridge = AlwaysBridge(ParseStatus::Ok);
            fh.run(&mut bridge, None, Path::new("/tmp/out"), OutputFormat::Json, StageMask::empty(), None);
        }
        assert!(!fh.abort_flag());
        for _ in 0..100 {
            let mut bridge = AlwaysBridge(ParseStatus::FileNotFound);
            fh.run(&mut bridge, None, Path::new("/tmp/out"), OutputFormat::Json, StageMask::empty(), None);
        }
        assert!(fh.abort_flag());
    }

    #[test]
    fn straggler_is_flagged_when_over_timeout() {
        let fh = FaultHandler::new(0, 0, 100.0);
        let mut bridge = AlwaysBridge(ParseStatus::Ok);
        let outcome = fh.run(&mut bridge, None, Path::new("/tmp/out"), OutputFormat::Json, StageMask::empty(), None);
        assert!(outcome.was_straggler);
    }
}

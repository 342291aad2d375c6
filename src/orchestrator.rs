//! Orchestrator: wires every subsystem together and drives the
//! per-document pipeline (spec §4.1).
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use log::{info, warn};
use rayon::prelude::*;

use crate::cache::l1::L1Cache;
use crate::cache::l2::L2Cache;
use crate::cache::CacheMode;
use crate::checkpoint::{self, Checkpoint};
use crate::conduit;
use crate::config::Config;
use crate::content_kind::ContentKind;
use crate::error::Error;
use crate::fault_handler::FaultHandler;
use crate::gpu_ocr::OcrCoprocessor;
use crate::manifest::Manifest;
use crate::parser_bridge::{OutputFormat, ParserBridge, StubParserBridge};
use crate::prefetch::Prefetcher;
use crate::progress::{self, ProgressCounters};
use crate::shard::{Shard, ShardMerger};
use crate::stages::StageMask;
use crate::stats::{self, RunReport, WorkerStats};

/// Everything this worker needs for the run, built once in step (2) of
/// the algorithm (spec §4.1). Shared across the rayon work-stealing
/// pool by reference; fields without their own interior synchronisation
/// (the checkpoint set) get a [Mutex].
struct WorkerContext {
    shard: Shard,
    l1: Option<L1Cache>,
    l2: Option<L2Cache>,
    cache_mode: CacheMode,
    output_format: OutputFormat,
    stages_mask: StageMask,
    fault_handler: FaultHandler,
    checkpoint: Mutex<Checkpoint>,
    stats: WorkerStats,
    progress: Arc<ProgressCounters>,
    abort: Arc<AtomicBool>,
}

/// Runs this process's share of the manifest to completion and returns
/// its local statistics, after writing the run report (spec §4.1 steps
/// 1-8). One process handles one worker's shard of the manifest; the
/// single-process case is the common one, so the report written here is
/// already the reduction of this worker alone (reduction across a
/// multi-process job happens out of band, by combining per-worker
/// `run-report.json` files — see DESIGN.md).
pub fn run(cfg: &Config) -> Result<RunReport, Error> {
    // (1) Validate configuration and runtime version.
    let output_format = cfg.output_format()?;
    let stages_mask = cfg.stages_mask()?;
    let cache_mode = cfg.cache_mode()?;
    let _manifest_mode = cfg.manifest_mode()?;

    std::fs::create_dir_all(&cfg.output_dir)?;

    // (2) Open per-worker subsystems. Each is optional per spec §4.1.
    let l1 = if cfg.l1_enabled() && cache_mode.is_enabled() {
        match L1Cache::open(&cfg.cache_dir, cfg.cache_size_mb) {
            Ok(c) => Some(c),
            Err(e) => {
                warn!("L1 cache unavailable, continuing without it: {e}");
                None
            }
        }
    } else {
        None
    };

    let l2 = match (&cfg.l2_url, cache_mode.is_enabled()) {
        (Some(url), true) => match L2Cache::connect(url, cfg.l2_ttl_secs) {
            Ok(c) => Some(c),
            Err(e) => {
                warn!("L2 cache unavailable, continuing without it: {e}");
                None
            }
        },
        _ => None,
    };

    let shard = Shard::open(&cfg.output_dir, cfg.worker_id)?;

    // (3) Load the manifest into a block-distributed array.
    let manifest = Manifest::load(&cfg.manifest_path, true)?;
    info!(
        "loaded {} manifest entries ({:.2}% existence sample rate)",
        manifest.len(),
        manifest.stats().existence_rate() * 100.0
    );

    // (4) Reset statistics, load prior checkpoint if resuming.
    let checkpoint = Checkpoint::new(&cfg.output_dir, cfg.worker_id, cfg.checkpoint_interval_docs);
    let resumed = if cfg.resume {
        checkpoint::load_resume_set(&cfg.output_dir)?
    } else {
        Default::default()
    };

    let progress = ProgressCounters::new();
    let abort = Arc::new(AtomicBool::new(false));

    let ctx = WorkerContext {
        shard,
        l1,
        l2,
        cache_mode,
        output_format,
        stages_mask,
        fault_handler: FaultHandler::new(cfg.max_retries_per_doc, cfg.timeout_per_doc_ms, cfg.failure_threshold_pct),
        checkpoint: Mutex::new(checkpoint),
        stats: WorkerStats::new(cfg.worker_id),
        progress: Arc::clone(&progress),
        abort: Arc::clone(&abort),
    };

    // Every index assigned to this worker is kept here, resumed ones
    // included: each must still be visited once to record its
    // skipped-resumed outcome (spec §4.1 step 1, P1/P2).
    let indices: Vec<usize> = manifest
        .indices_for_worker(cfg.worker_id, cfg.worker_count.max(1))
        .collect();

    // (5) Start the background Progress Reporter.
    progress.reporter_done.store(false, Ordering::Release);
    let reporter = progress::spawn(
        Arc::clone(&progress),
        indices.len() as u64,
        cfg.progress_interval_sec,
        cfg.failure_threshold_pct,
        Arc::clone(&abort),
    );

    let started_at = Instant::now();

    // (6) Iterate under dynamic work-stealing with a tunable chunk size.
    // Each chunk allocates its own parser handle and its own GPU OCR
    // coprocessor (the coprocessor is not thread-safe across workers, spec
    // §4.7 Concurrency) so handles never cross a rayon task boundary
    // (spec §4.1 step 6, §5 Shared state).
    if cfg.chunk_size == 0 {
        warn!("configured chunk_size of 0 clamped to 1");
    }
    indices.chunks(cfg.chunk_size.max(1)).par_bridge().for_each(|chunk| {
        let mut bridge = StubParserBridge::new();
        let mut ocr = OcrCoprocessor::init();
        bridge.set_gpu_ocr_handle(true);
        bridge.set_ml_handle(false);
        for (pos, &index) in chunk.iter().enumerate() {
            // (spec §4.1 step 2) Once tripped, every remaining index in
            // this and other chunks is recorded as skipped-aborted rather
            // than silently dropped (P1/P2).
            if ctx.abort.load(Ordering::Acquire) || ctx.fault_handler.abort_flag() {
                ctx.abort.store(true, Ordering::Release);
                for _ in &chunk[pos..] {
                    ctx.stats.record_skipped_aborted();
                    ctx.progress.record_completion(true);
                }
                break;
            }
            // (spec §4.1 step 1) The checkpoint already marked this index
            // done on a prior run; record it as skipped-resumed instead of
            // dropping it from the tally, and keep it in this run's own
            // checkpoint so a later flush doesn't lose it.
            if resumed.contains(&(index as u64)) {
                ctx.stats.record_skipped_resumed();
                ctx.progress.record_completion(true);
                record_checkpoint(&ctx, index);
                continue;
            }
            if let Some(entry) = manifest.get(index) {
                let succeeded =
                    process_one(&ctx, &mut bridge, &mut ocr, index, entry.path.as_path(), entry.kind);
                ctx.progress.record_completion(succeeded);
            }
        }
        ocr.flush();
    });

    // (7) join: `for_each` above is itself the join point.

    // (8) sync caches, close handles, compute report, clear checkpoint.
    progress.reporter_done.store(true, Ordering::Release);
    let _ = reporter.join();

    if let Some(l1) = &ctx.l1 {
        let _ = l1.sync();
    }

    let wall_clock_secs = started_at.elapsed().as_secs_f64();
    let report = stats::reduce(std::slice::from_ref(&ctx.stats), wall_clock_secs);
    report.write_json(&cfg.output_dir)?;
    report.write_scheme(&cfg.output_dir)?;
    info!("{}", report.summary_line());

    let mut checkpoint = ctx.checkpoint.into_inner().expect("checkpoint mutex poisoned");
    if ctx.fault_handler.failures() == 0 {
        checkpoint.clear()?;
    } else {
        checkpoint.flush()?;
    }

    if cfg.merge_shards {
        let plan = ShardMerger::new(&cfg.output_dir).merge()?;
        info!("merged {} shard files", plan.moves.len());
    }

    Ok(report)
}

/// The per-document pipeline (spec §4.1): prefetch hint, Conduit sniff,
/// L1/L2 lookup, Parser Bridge + Stages Engine on miss, cache store,
/// checkpoint record. Returns whether the document was handled
/// successfully (for the progress counters).
fn process_one(
    ctx: &WorkerContext,
    bridge: &mut dyn ParserBridge,
    ocr: &mut OcrCoprocessor,
    index: usize,
    path: &Path,
    kind_hint: Option<ContentKind>,
) -> bool {
    let mut prefetcher = Prefetcher::init(1);
    prefetcher.hint(path);

    let conduit_result = conduit::run(path);
    if !conduit_result.validation().is_ok() {
        prefetcher.done(path);
        ctx.stats.record(kind_hint.unwrap_or(ContentKind::Unknown), false, false, 0, 0, 0, 0, 0.0);
        record_checkpoint(ctx, index);
        return false;
    }

    // Images route through the GPU OCR Coprocessor before the Parser
    // Bridge so a GPU-backed result (or a `gpu-error` fallback signal) is
    // available for the Stages Engine's OCR confidence stage (spec §4.7).
    let ocr_confidence = if conduit_result.content_kind() == ContentKind::Image {
        let slot = ocr.submit(path, &ctx.shard.output_path(path, ctx.output_format));
        ocr.flush();
        ocr.collect(slot).map(|r| r.confidence)
    } else {
        None
    };

    let meta = std::fs::metadata(path).ok();
    let size = meta.as_ref().map(|m| m.len()).unwrap_or(0);
    let mtime = meta
        .as_ref()
        .and_then(|m| m.modified().ok())
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    let mut cached = None;
    if ctx.cache_mode.can_read() {
        if let Some(l1) = &ctx.l1 {
            cached = l1.lookup(path, mtime, size);
        }
        if cached.is_none() {
            if let Some(l2) = &ctx.l2 {
                cached = l2.lookup(&conduit_result.sha256_hex());
            }
        }
    }
    let from_cache = cached.is_some();

    let output_path = ctx.shard.output_path(path, ctx.output_format);
    let (elapsed_ms, was_straggler, result) = match cached {
        Some(r) => (0.0, false, r),
        None => {
            let outcome = ctx.fault_handler.run(
                bridge,
                Some(path),
                &output_path,
                ctx.output_format,
                ctx.stages_mask,
                ocr_confidence,
            );
            (outcome.elapsed_ms, outcome.was_straggler, outcome.result)
        }
    };

    let succeeded = result.status().is_ok();
    if !from_cache && succeeded && ctx.cache_mode.can_write() {
        if let Some(l1) = &ctx.l1 {
            l1.store(path, mtime, size, &result);
        }
        if let Some(l2) = &ctx.l2 {
            l2.store(&result.sha256_hex(), &result);
        }
    }

    prefetcher.done(path);

    ctx.stats.record(
        result.content_kind(),
        succeeded,
        was_straggler,
        size,
        result.page_count as u64,
        result.word_count,
        result.char_count,
        elapsed_ms,
    );

    record_checkpoint(ctx, index);
    succeeded
}

fn record_checkpoint(ctx: &WorkerContext, index: usize) {
    let mut checkpoint = ctx.checkpoint.lock().expect("checkpoint mutex poisoned");
    if let Err(e) = checkpoint.record(index as u64) {
        warn!("checkpoint flush failed for index {index}: {e}");
    }
}

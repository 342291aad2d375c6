//! Command line arguments and parameters management/parsing (spec §6).
use std::path::PathBuf;

use structopt::StructOpt;

use crate::cache::CacheMode;
use crate::manifest::DistributionMode;
use crate::parser_bridge::OutputFormat;
use crate::stages::StageMask;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "docudactyl",
    about = "Distributed document-processing engine: manifest-driven extraction, caching and analysis at corpus scale."
)]
/// Top-level CLI parameters for one worker process (spec §6 CLI surface).
pub struct Config {
    #[structopt(long, parse(from_os_str), default_value = "manifest.txt", help = "path to input manifest")]
    pub manifest_path: PathBuf,

    #[structopt(long, parse(from_os_str), default_value = "output", help = "root output directory")]
    pub output_dir: PathBuf,

    #[structopt(long, default_value = "scheme", help = "scheme|json|csv")]
    pub output_format: String,

    #[structopt(long, default_value = "256", help = "work-stealing chunk size")]
    pub chunk_size: usize,

    #[structopt(long, default_value = "2", help = "retry budget per document")]
    pub max_retries_per_doc: u32,

    #[structopt(long, default_value = "5.0", help = "abort threshold, percent")]
    pub failure_threshold_pct: f64,

    #[structopt(long, default_value = "10", help = "progress reporter period, seconds")]
    pub progress_interval_sec: u64,

    #[structopt(long, default_value = "300000", help = "straggler threshold, milliseconds")]
    pub timeout_per_doc_ms: u64,

    #[structopt(long, default_value = "shared", help = "shared|broadcast")]
    pub manifest_mode: String,

    #[structopt(long, parse(from_os_str), default_value = "", help = "L1 cache root (empty disables)")]
    pub cache_dir: PathBuf,

    #[structopt(long, default_value = "10240", help = "L1 cache max size per worker, MB")]
    pub cache_size_mb: u64,

    #[structopt(long, default_value = "readwrite", help = "off|read|write|readwrite")]
    pub cache_mode: String,

    #[structopt(long, help = "L2 cache URL, e.g. redis://127.0.0.1:6379/ (empty disables)")]
    pub l2_url: Option<String>,

    #[structopt(long, help = "L2 cache entry TTL, seconds (unset means no expiry)")]
    pub l2_ttl_secs: Option<u64>,

    #[structopt(long, default_value = "none", help = "preset name, comma list, or 0xHEX bitmask")]
    pub stages_config: String,

    #[structopt(long, help = "resume from prior checkpoint files")]
    pub resume: bool,

    #[structopt(long, default_value = "1000", help = "checkpoint flush cadence, documents")]
    pub checkpoint_interval_docs: usize,

    #[structopt(long, help = "merge per-worker shards into merged/ after the run")]
    pub merge_shards: bool,

    #[structopt(short = "n", long = "nl", default_value = "1", help = "worker count")]
    pub worker_count: usize,

    #[structopt(long, default_value = "0", help = "this process's worker index, 0-based")]
    pub worker_id: usize,

    #[structopt(long, default_value = "16", help = "I/O prefetch window size")]
    pub prefetch_window: usize,
}

impl Config {
    pub fn output_format(&self) -> Result<OutputFormat, crate::error::Error> {
        OutputFormat::from_str_opt(&self.output_format)
            .ok_or_else(|| crate::error::Error::Config(format!("unknown outputFormat: {}", self.output_format)))
    }

    pub fn manifest_mode(&self) -> Result<DistributionMode, crate::error::Error> {
        DistributionMode::from_str_opt(&self.manifest_mode)
    }

    pub fn cache_mode(&self) -> Result<CacheMode, crate::error::Error> {
        CacheMode::from_str_opt(&self.cache_mode)
    }

    pub fn stages_mask(&self) -> Result<StageMask, crate::error::Error> {
        StageMask::parse(&self.stages_config)
    }

    pub fn l1_enabled(&self) -> bool {
        !self.cache_dir.as_os_str().is_empty()
    }
}

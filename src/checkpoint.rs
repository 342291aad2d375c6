//! Checkpoint: per-worker completed-index tracking for restart-after-
//! failure (spec §4.13).
use std::collections::HashSet;
use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use log::{info, warn};

/// Flush the completed-index set to disk every this many completions,
/// unless overridden.
pub const DEFAULT_FLUSH_INTERVAL: usize = 1000;

pub struct Checkpoint {
    worker_id: usize,
    path: PathBuf,
    flush_interval: usize,
    completed: HashSet<u64>,
    since_flush: usize,
}

impl Checkpoint {
    pub fn new(output_dir: &Path, worker_id: usize, flush_interval: usize) -> Checkpoint {
        Checkpoint {
            worker_id,
            path: checkpoint_path(output_dir, worker_id),
            flush_interval: flush_interval.max(1),
            completed: HashSet::new(),
            since_flush: 0,
        }
    }

    pub fn is_done(&self, index: u64) -> bool {
        self.completed.contains(&index)
    }

    /// Record `index` as completed, flushing to disk every
    /// `flush_interval` completions since the last flush.
    pub fn record(&mut self, index: u64) -> io::Result<()> {
        if self.completed.insert(index) {
            self.since_flush += 1;
            if self.since_flush >= self.flush_interval {
                self.flush()?;
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        let mut contents = String::with_capacity(self.completed.len() * 8);
        let mut sorted: Vec<&u64> = self.completed.iter().collect();
        sorted.sort_unstable();
        for idx in sorted {
            contents.push_str(&idx.to_string());
            contents.push('\n');
        }
        fs::write(&self.path, contents)?;
        self.since_flush = 0;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    /// Remove this worker's checkpoint file after a clean (zero-failure)
    /// run (spec §4.13 Completion).
    pub fn clear(&mut self) -> io::Result<()> {
        self.completed.clear();
        self.since_flush = 0;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

fn checkpoint_path(output_dir: &Path, worker_id: usize) -> PathBuf {
    output_dir.join(format!("checkpoint-{worker_id}.txt"))
}

/// Union every `checkpoint-*.txt` file under `output_dir` into a single
/// "previously done" set, honoring `--resume` (spec §4.13 Resume).
pub fn load_resume_set(output_dir: &Path) -> io::Result<HashSet<u64>> {
    let mut done = HashSet::new();
    let entries = match fs::read_dir(output_dir) {
        Ok(e) => e,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(done),
        Err(e) => return Err(e),
    };

    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with("checkpoint-") || !name.ends_with(".txt") {
            continue;
        }
        let file = match fs::File::open(entry.path()) {
            Ok(f) => f,
            Err(e) => {
                warn!("could not open checkpoint file {name}: {e}");
                continue;
            }
        };
        for line in io::BufReader::new(file).lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match line.parse::<u64>() {
                Ok(idx) => {
                    done.insert(idx);
                }
                Err(_) => warn!("ignoring malformed checkpoint line in {name}: {line:?}"),
            }
        }
    }

    info!("resumed {} previously completed document indices", done.len());
    Ok(done)
}

//! Sharded Output: per-worker output directories and optional post-run
//! merge (spec §4.14).
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::parser_bridge::OutputFormat;

pub struct Shard {
    dir: PathBuf,
}

impl Shard {
    /// Create (if absent) and return the handle for `shard-{worker_id}`
    /// under `output_dir`.
    pub fn open(output_dir: &Path, worker_id: usize) -> io::Result<Shard> {
        let dir = output_dir.join(format!("shard-{worker_id}"));
        fs::create_dir_all(&dir)?;
        Ok(Shard { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The primary extracted-content path for `input_path`, named after
    /// its file stem (spec §4.14).
    pub fn output_path(&self, input_path: &Path, format: OutputFormat) -> PathBuf {
        let stem = input_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        self.dir.join(format!("{stem}.{}", format.extension()))
    }

    /// The sibling Stages Engine output path beside `output_path`.
    pub fn stages_path(&self, output_path: &Path, format: OutputFormat) -> PathBuf {
        let mut name = output_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        name.push_str(".stages.");
        name.push_str(format.extension());
        output_path.with_file_name(name)
    }
}

/// Moves every file from each `shard-{id}` directory under `output_dir`
/// into a single `merged/` directory, prefixing collisions with
/// `shard{id}-` (spec §4.14).
pub struct ShardMerger<'a> {
    output_dir: &'a Path,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct MergePlan {
    /// (source path, destination path) pairs, in shard-id then filename order.
    pub moves: Vec<(PathBuf, PathBuf)>,
    pub collisions_renamed: usize,
}

impl<'a> ShardMerger<'a> {
    pub fn new(output_dir: &'a Path) -> ShardMerger<'a> {
        ShardMerger { output_dir }
    }

    fn shard_dirs(&self) -> io::Result<Vec<(usize, PathBuf)>> {
        let mut shards = Vec::new();
        let entries = match fs::read_dir(self.output_dir) {
            Ok(e) => e,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(shards),
            Err(e) => return Err(e),
        };
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(id_str) = name.strip_prefix("shard-") {
                if let Ok(id) = id_str.parse::<usize>() {
                    shards.push((id, entry.path()));
                }
            }
        }
        shards.sort_by_key(|(id, _)| *id);
        Ok(shards)
    }

    /// Compute the move plan without touching the filesystem, per
    /// SPEC_FULL.md's dry-run supplement.
    pub fn plan(&self) -> io::Result<MergePlan> {
        let merged_dir = self.output_dir.join("merged");
        let mut used_names = std::collections::HashSet::new();
        let mut plan = MergePlan::default();

        for (id, shard_dir) in self.shard_dirs()? {
            let mut files: Vec<PathBuf> = fs::read_dir(&shard_dir)?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file())
                .collect();
            files.sort();
            for src in files {
                let file_name = src.file_name().unwrap().to_string_lossy().into_owned();
                let dest_name = if used_names.contains(&file_name) {
                    plan.collisions_renamed += 1;
                    format!("shard{id}-{file_name}")
                } else {
                    file_name.clone()
                };
                used_names.insert(dest_name.clone());
                plan.moves.push((src, merged_dir.join(dest_name)));
            }
        }
        Ok(plan)
    }

    /// Execute the merge, creating `merged/` if needed.
    pub fn merge(&self) -> io::Result<MergePlan> {
        let plan = self.plan()?;
        if plan.moves.is_empty() {
            return Ok(plan);
        }
        let merged_dir = self.output_dir.join("merged");
        fs::create_dir_all(&merged_dir)?;
        for (src, dest) in &plan.moves {
            if let Err(e) = fs::rename(src, dest) {
                warn!("failed to move {} into merged/: {e}", src.display());
            }
        }
        info!(
            "merged {} files into {} ({} collisions renamed)",
            plan.moves.len(),
            merged_dir.display(),
            plan.collisions_renamed
        );
        Ok(plan)
    }
}

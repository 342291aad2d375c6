//! Manifest Loader: two-pass load of a plain or NDJSON manifest into a
//! block-distributed sequence of [DocumentEntry] (spec §4.2).
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::warn;

use crate::content_kind::ContentKind;
use crate::error::Error;
use crate::model::DocumentEntry;

/// How the manifest file is made visible to every worker. The in-memory
/// layout produced is identical either way; this only documents who reads
/// the file off disk (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionMode {
    /// Every worker opens and reads the manifest itself.
    Shared,
    /// Worker 0 reads the manifest and scatters entries to the rest.
    Broadcast,
}

impl DistributionMode {
    pub fn from_str_opt(s: &str) -> Result<DistributionMode, Error> {
        match s {
            "shared" => Ok(DistributionMode::Shared),
            "broadcast" => Ok(DistributionMode::Broadcast),
            other => Err(Error::Config(format!(
                "unknown manifest distribution mode {other:?}, expected 'shared' or 'broadcast'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManifestFormat {
    Plain,
    Ndjson,
}

fn is_blank_or_comment(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

fn detect_format(first_content_line: &str) -> ManifestFormat {
    if first_content_line.trim_start().starts_with('{') {
        ManifestFormat::Ndjson
    } else {
        ManifestFormat::Plain
    }
}

/// Locate `"key":"..."` or `"key":N` within an NDJSON line without pulling
/// in a full JSON parser (spec §4.2: "minimal field extractor"). Unknown
/// keys are ignored by the caller; this just returns the raw slice for a
/// requested key, if present.
fn extract_field<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let needle = format!("\"{key}\"");
    let key_pos = line.find(&needle)?;
    let after_key = &line[key_pos + needle.len()..];
    let colon_pos = after_key.find(':')?;
    let value_start = after_key[colon_pos + 1..].trim_start();
    if let Some(rest) = value_start.strip_prefix('"') {
        let end = rest.find('"')?;
        Some(&rest[..end])
    } else {
        let end = value_start
            .find(|c: char| c == ',' || c == '}')
            .unwrap_or(value_start.len());
        Some(value_start[..end].trim())
    }
}

fn parse_ndjson_line(line: &str) -> Option<DocumentEntry> {
    let path = extract_field(line, "path")?;
    let mut entry = DocumentEntry::new(std::path::PathBuf::from(path));
    if let Some(size_str) = extract_field(line, "size") {
        entry.size = size_str.parse::<u64>().ok();
    }
    if let Some(mtime_str) = extract_field(line, "mtime") {
        entry.mtime = mtime_str.parse::<i64>().ok();
    }
    if let Some(kind_str) = extract_field(line, "kind") {
        entry.kind = ContentKind::from_name(kind_str);
    }
    Some(entry)
}

fn parse_plain_line(line: &str) -> DocumentEntry {
    DocumentEntry::new(std::path::PathBuf::from(line.trim()))
}

#[derive(Debug, Clone)]
pub struct ManifestStats {
    pub total_entries: usize,
    pub existence_sample_size: usize,
    pub existence_hits: usize,
}

impl ManifestStats {
    /// Fraction of the sampled paths that exist on disk, in `[0, 1]`. `1.0`
    /// when no sample was taken (nothing to warn about).
    pub fn existence_rate(&self) -> f64 {
        if self.existence_sample_size == 0 {
            1.0
        } else {
            self.existence_hits as f64 / self.existence_sample_size as f64
        }
    }
}

/// A loaded, block-distributed manifest: index `i` deterministically maps
/// to worker `i % worker_count` (spec §4.2, §4.1 step 3).
#[derive(Debug, Clone)]
pub struct Manifest {
    entries: Vec<DocumentEntry>,
    stats: ManifestStats,
}

impl Manifest {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[DocumentEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&DocumentEntry> {
        self.entries.get(index)
    }

    /// Indices owned by `worker_id` out of `worker_count` total workers,
    /// under the deterministic block-distribution (`i % worker_count`).
    pub fn indices_for_worker(
        &self,
        worker_id: usize,
        worker_count: usize,
    ) -> impl Iterator<Item = usize> + '_ {
        let n = self.entries.len();
        (0..n).filter(move |i| i % worker_count == worker_id)
    }

    pub fn stats(&self) -> &ManifestStats {
        &self.stats
    }

    /// Load a manifest from `path` (spec §4.2). `sample_existence` gates
    /// the 0.1% existence probe, which is meant to run only on locale 0.
    pub fn load(path: &Path, sample_existence: bool) -> Result<Manifest, Error> {
        // Pass 1: count valid (non-blank, non-comment) lines and detect format.
        let file = File::open(path)
            .map_err(|e| Error::Config(format!("cannot open manifest {}: {e}", path.display())))?;
        let mut reader = BufReader::new(file);

        let mut first_content_line: Option<String> = None;
        let mut expected_count = 0usize;
        {
            let mut line = String::new();
            loop {
                line.clear();
                let n = reader
                    .read_line(&mut line)
                    .map_err(|e| Error::Config(format!("error reading manifest: {e}")))?;
                if n == 0 {
                    break;
                }
                if is_blank_or_comment(&line) {
                    continue;
                }
                if first_content_line.is_none() {
                    first_content_line = Some(line.trim_end().to_string());
                }
                expected_count += 1;
            }
        }

        let format = match &first_content_line {
            Some(l) => detect_format(l),
            None => ManifestFormat::Plain,
        };

        // Pass 2: populate a pre-sized array.
        let file = File::open(path)
            .map_err(|e| Error::Config(format!("cannot reopen manifest {}: {e}", path.display())))?;
        let reader = BufReader::new(file);

        let mut entries = Vec::with_capacity(expected_count);
        for line in reader.lines() {
            let line = line.map_err(|e| Error::Config(format!("error reading manifest: {e}")))?;
            if is_blank_or_comment(&line) {
                continue;
            }
            let entry = match format {
                ManifestFormat::Ndjson => match parse_ndjson_line(&line) {
                    Some(e) => e,
                    None => {
                        warn!("skipping malformed NDJSON manifest line: {line:?}");
                        continue;
                    }
                },
                ManifestFormat::Plain => parse_plain_line(&line),
            };
            entries.push(entry);
        }

        if entries.len() < expected_count {
            warn!(
                "manifest shrank between passes (expected {}, got {}); proceeding with the smaller count",
                expected_count,
                entries.len()
            );
        }

        let stats = if sample_existence {
            sample_existence_rate(&entries)
        } else {
            ManifestStats {
                total_entries: entries.len(),
                existence_sample_size: 0,
                existence_hits: 0,
            }
        };

        if stats.existence_sample_size > 0 && stats.existence_rate() < 0.5 {
            warn!(
                "manifest existence sample found only {:.1}% of sampled paths present on disk; continuing anyway",
                stats.existence_rate() * 100.0
            );
        }

        Ok(Manifest { entries, stats })
    }
}

/// Stat-probe a 0.1% random sample of entries (spec §4.2). Sampling is
/// deterministic (every 1000th entry, offset by a fixed stride) rather than
/// relying on a random number generator the rest of the crate has no other
/// use for.
fn sample_existence_rate(entries: &[DocumentEntry]) -> ManifestStats {
    const SAMPLE_STRIDE: usize = 1000;
    let mut sample_size = 0usize;
    let mut hits = 0usize;
    let mut i = SAMPLE_STRIDE / 2;
    while i < entries.len() {
        sample_size += 1;
        if entries[i].path.exists() {
            hits += 1;
        }
        i += SAMPLE_STRIDE;
    }
    ManifestStats {
        total_entries: entries.len(),
        existence_sample_size: sample_size,
        existence_hits: hits,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn plain_mode_ignores_comments_and_blanks() {
        let f = write_temp("# a comment\n\n/tmp/a.pdf\n/tmp/b.png\n\n# trailing\n");
        let m = Manifest::load(f.path(), false).unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m.get(0).unwrap().path, std::path::PathBuf::from("/tmp/a.pdf"));
        assert_eq!(m.get(1).unwrap().path, std::path::PathBuf::from("/tmp/b.png"));
    }

    #[test]
    fn ndjson_mode_extracts_known_fields() {
        let f = write_temp(
            "{\"path\":\"/tmp/a.pdf\",\"size\":1024,\"mtime\":1700000000,\"kind\":\"pdf\",\"ignored\":true}\n\
             {\"path\":\"/tmp/b.png\"}\n",
        );
        let m = Manifest::load(f.path(), false).unwrap();
        assert_eq!(m.len(), 2);
        let a = m.get(0).unwrap();
        assert_eq!(a.size, Some(1024));
        assert_eq!(a.mtime, Some(1700000000));
        assert_eq!(a.kind, Some(ContentKind::Pdf));
        assert!(a.is_metadata_rich());

        let b = m.get(1).unwrap();
        assert_eq!(b.size, None);
        assert!(!b.is_metadata_rich());
    }

    #[test]
    fn format_detection_looks_at_first_content_line() {
        let f = write_temp("# comment\n{\"path\":\"/tmp/a.pdf\"}\n");
        let m = Manifest::load(f.path(), false).unwrap();
        assert_eq!(m.len(), 1);
        assert_eq!(m.get(0).unwrap().path, std::path::PathBuf::from("/tmp/a.pdf"));
    }

    #[test]
    fn distribution_mode_parses_known_values() {
        assert_eq!(
            DistributionMode::from_str_opt("shared").unwrap(),
            DistributionMode::Shared
        );
        assert_eq!(
            DistributionMode::from_str_opt("broadcast").unwrap(),
            DistributionMode::Broadcast
        );
        assert!(DistributionMode::from_str_opt("bogus").is_err());
    }

    #[test]
    fn indices_for_worker_partition_evenly() {
        let f = write_temp("/a\n/b\n/c\n/d\n/e\n");
        let m = Manifest::load(f.path(), false).unwrap();
        let w0: Vec<_> = m.indices_for_worker(0, 2).collect();
        let w1: Vec<_> = m.indices_for_worker(1, 2).collect();
        assert_eq!(w0, vec![0, 2, 4]);
        assert_eq!(w1, vec![1, 3]);
    }

    #[test]
    fn existence_sampling_reports_rate() {
        // Build a manifest with 5000 entries so the 1-in-1000 stride yields
        // several sample points, none of which exist on disk.
        let mut contents = String::new();
        for i in 0..5000 {
            contents.push_str(&format!("/nonexistent/path/{i}\n"));
        }
        let f = write_temp(&contents);
        let m = Manifest::load(f.path(), true).unwrap();
        assert_eq!(m.len(), 5000);
        assert!(m.stats().existence_sample_size >= 4);
        assert_eq!(m.stats().existence_hits, 0);
        assert_eq!(m.stats().existence_rate(), 0.0);
    }
}

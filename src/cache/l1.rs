//! L1 Cache: per-worker, local, embedded key-value store (spec §4.4).
//!
//! Keyed by document path; the value is `[mtime:8][size:8][parse_result:952]`
//! = 968 bytes (spec §3, Cache Entry (L1)). Built on `sled`, which already
//! gives single-writer/multi-reader transactional semantics and a
//! consistent snapshot for concurrent readers.
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use log::warn;

use crate::error::Error;
use crate::model::parse_result::PARSE_RESULT_SIZE;
use crate::model::ParseResult;

pub const L1_VALUE_SIZE: usize = 8 + 8 + PARSE_RESULT_SIZE;

pub struct L1Cache {
    db: sled::Db,
    max_bytes: u64,
    read_only: AtomicBool,
}

impl L1Cache {
    pub fn open(dir: &Path, max_size_mb: u64) -> Result<L1Cache, Error> {
        let db = sled::open(dir)
            .map_err(|e| Error::Subsystem(format!("L1 cache: cannot open {}: {e}", dir.display())))?;
        Ok(L1Cache {
            db,
            max_bytes: max_size_mb.saturating_mul(1024 * 1024),
            read_only: AtomicBool::new(false),
        })
    }

    /// (I1) A lookup with mismatched `(mtime, size)` relative to the
    /// stored prefix is a miss, regardless of whether the path itself has
    /// an entry.
    pub fn lookup(&self, path: &Path, mtime: i64, size: u64) -> Option<ParseResult> {
        let key = path.to_string_lossy();
        let ivec = match self.db.get(key.as_bytes()) {
            Ok(Some(v)) => v,
            _ => return None,
        };
        if ivec.len() != L1_VALUE_SIZE {
            return None;
        }
        let stored_mtime = i64::from_le_bytes(ivec[0..8].try_into().unwrap());
        let stored_size = u64::from_le_bytes(ivec[8..16].try_into().unwrap());
        if stored_mtime != mtime || stored_size != size {
            return None;
        }
        let mut buf = [0u8; PARSE_RESULT_SIZE];
        buf.copy_from_slice(&ivec[16..L1_VALUE_SIZE]);
        Some(ParseResult::from_bytes(&buf))
    }

    /// (I2) At most one entry per path; this upserts, overwriting
    /// atomically. No-op once the cache has degraded to read-only.
    pub fn store(&self, path: &Path, mtime: i64, size: u64, result: &ParseResult) {
        if self.read_only.load(Ordering::Relaxed) {
            return;
        }
        if let Ok(on_disk) = self.db.size_on_disk() {
            if on_disk >= self.max_bytes {
                self.read_only.store(true, Ordering::Relaxed);
                warn!(
                    "L1 cache reached its configured capacity ({} MiB); degrading to read-only",
                    self.max_bytes / (1024 * 1024)
                );
                return;
            }
        }
        let mut value = Vec::with_capacity(L1_VALUE_SIZE);
        value.extend_from_slice(&mtime.to_le_bytes());
        value.extend_from_slice(&size.to_le_bytes());
        value.extend_from_slice(result.as_bytes());
        let key = path.to_string_lossy();
        if let Err(e) = self.db.insert(key.as_bytes(), value) {
            warn!("L1 cache write failed, treating as degraded: {e}");
        }
    }

    pub fn count(&self) -> usize {
        self.db.len()
    }

    pub fn sync(&self) -> Result<(), Error> {
        self.db
            .flush()
            .map(|_| ())
            .map_err(|e| Error::Subsystem(format!("L1 cache flush failed: {e}")))
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content_kind::ContentKind;
    use crate::model::ParseStatus;

    fn sample_result() -> ParseResult {
        let mut r = ParseResult::new(ParseStatus::Ok, ContentKind::Pdf);
        r.page_count = 3;
        r.set_title("sample");
        r
    }

    #[test]
    fn store_then_lookup_hits_on_matching_mtime_size() {
        let dir = tempfile::tempdir().unwrap();
        let cache = L1Cache::open(dir.path(), 10240).unwrap();
        let path = Path::new("/tmp/a.pdf");
        cache.store(path, 1000, 2048, &sample_result());

        let hit = cache.lookup(path, 1000, 2048);
        assert!(hit.is_some());
        assert_eq!(hit.unwrap().page_count, 3);
    }

    #[test]
    fn mismatched_mtime_or_size_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = L1Cache::open(dir.path(), 10240).unwrap();
        let path = Path::new("/tmp/a.pdf");
        cache.store(path, 1000, 2048, &sample_result());

        assert!(cache.lookup(path, 1001, 2048).is_none());
        assert!(cache.lookup(path, 1000, 2049).is_none());
    }

    #[test]
    fn unknown_path_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = L1Cache::open(dir.path(), 10240).unwrap();
        assert!(cache.lookup(Path::new("/tmp/never-stored.pdf"), 0, 0).is_none());
    }

    #[test]
    fn store_overwrites_existing_entry_for_same_path() {
        let dir = tempfile::tempdir().unwrap();
        let cache = L1Cache::open(dir.path(), 10240).unwrap();
        let path = Path::new("/tmp/a.pdf");
        cache.store(path, 1000, 2048, &sample_result());
        assert_eq!(cache.count(), 1);

        let mut updated = sample_result();
        updated.page_count = 99;
        cache.store(path, 2000, 4096, &updated);
        assert_eq!(cache.count(), 1);

        assert!(cache.lookup(path, 1000, 2048).is_none());
        let hit = cache.lookup(path, 2000, 4096).unwrap();
        assert_eq!(hit.page_count, 99);
    }

    #[test]
    fn degrades_to_read_only_once_capacity_reached() {
        let dir = tempfile::tempdir().unwrap();
        // 0 MiB cap: the very first write should find itself over budget.
        let cache = L1Cache::open(dir.path(), 0).unwrap();
        cache.store(Path::new("/tmp/a.pdf"), 1, 1, &sample_result());
        cache.sync().unwrap();
        cache.store(Path::new("/tmp/b.pdf"), 1, 1, &sample_result());
        assert!(cache.is_read_only());
    }
}

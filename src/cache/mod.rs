//! Two-tier cache: per-worker local L1 ([l1]) and cluster-shared,
//! SHA-keyed L2 ([l2]) (spec §4.4, §4.5).
pub mod l1;
pub mod l2;

use crate::error::Error;

/// Read/write gating for both cache tiers, set once from the CLI
/// (`cacheMode`, spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    Off,
    Read,
    Write,
    ReadWrite,
}

impl CacheMode {
    pub fn from_str_opt(s: &str) -> Result<CacheMode, Error> {
        match s {
            "off" => Ok(CacheMode::Off),
            "read" => Ok(CacheMode::Read),
            "write" => Ok(CacheMode::Write),
            "readwrite" => Ok(CacheMode::ReadWrite),
            other => Err(Error::Config(format!(
                "unknown cache mode {other:?}, expected one of off|read|write|readwrite"
            ))),
        }
    }

    pub fn can_read(self) -> bool {
        matches!(self, CacheMode::Read | CacheMode::ReadWrite)
    }

    pub fn can_write(self) -> bool {
        matches!(self, CacheMode::Write | CacheMode::ReadWrite)
    }

    pub fn is_enabled(self) -> bool {
        !matches!(self, CacheMode::Off)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gating_matches_mode() {
        assert!(!CacheMode::Off.can_read());
        assert!(!CacheMode::Off.can_write());
        assert!(CacheMode::Read.can_read());
        assert!(!CacheMode::Read.can_write());
        assert!(!CacheMode::Write.can_read());
        assert!(CacheMode::Write.can_write());
        assert!(CacheMode::ReadWrite.can_read());
        assert!(CacheMode::ReadWrite.can_write());
    }

    #[test]
    fn rejects_unknown_mode_string() {
        assert!(CacheMode::from_str_opt("bogus").is_err());
    }
}

//! Document Entry: one manifest row (spec §3).
use std::path::PathBuf;

use crate::content_kind::ContentKind;

#[derive(Debug, Clone)]
pub struct DocumentEntry {
    pub path: PathBuf,
    pub size: Option<u64>,
    pub mtime: Option<i64>,
    pub kind: Option<ContentKind>,
}

impl DocumentEntry {
    pub fn new(path: PathBuf) -> DocumentEntry {
        DocumentEntry {
            path,
            size: None,
            mtime: None,
            kind: None,
        }
    }

    /// An entry is "metadata-rich" when every optional field is populated,
    /// enabling a fast path that bypasses filesystem `stat` calls during
    /// cache lookup (spec §3).
    pub fn is_metadata_rich(&self) -> bool {
        self.size.is_some() && self.mtime.is_some() && self.kind.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_rich_requires_all_optional_fields() {
        let mut e = DocumentEntry::new(PathBuf::from("/tmp/a.pdf"));
        assert!(!e.is_metadata_rich());
        e.size = Some(10);
        e.mtime = Some(0);
        assert!(!e.is_metadata_rich());
        e.kind = Some(ContentKind::Pdf);
        assert!(e.is_metadata_rich());
    }
}

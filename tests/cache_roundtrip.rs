use docudactyl::cache::l1::L1Cache;
use docudactyl::content_kind::ContentKind;
use docudactyl::model::parse_result::{ParseResult, ParseStatus};
use std::path::Path;

#[test]
fn l1_persists_across_reopen_of_the_same_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = Path::new("/corpus/report.pdf");
    let mut result = ParseResult::new(ParseStatus::Ok, ContentKind::Pdf);
    result.set_title("quarterly report");

    {
        let cache = L1Cache::open(dir.path(), 64).unwrap();
        cache.store(path, 1_700_000_000, 4096, &result);
        cache.sync().unwrap();
    }

    let reopened = L1Cache::open(dir.path(), 64).unwrap();
    let hit = reopened.lookup(path, 1_700_000_000, 4096).unwrap();
    assert_eq!(hit.title(), "quarterly report");
    assert!(reopened.lookup(path, 1_700_000_001, 4096).is_none());
}

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use docudactyl::cache::l1::L1Cache;
use docudactyl::content_kind::ContentKind;
use docudactyl::model::parse_result::ParseResult;
use docudactyl::model::parse_result::ParseStatus;
use std::path::Path;

fn populated_cache() -> (tempfile::TempDir, L1Cache) {
    let dir = tempfile::tempdir().unwrap();
    let cache = L1Cache::open(dir.path(), 256).unwrap();
    let result = ParseResult::new(ParseStatus::Ok, ContentKind::Pdf);
    for i in 0..1000 {
        let path = format!("/corpus/doc-{i}.pdf");
        cache.store(Path::new(&path), 1_700_000_000, 4096, &result);
    }
    (dir, cache)
}

pub fn l1_lookup_hit(c: &mut Criterion) {
    let (_dir, cache) = populated_cache();
    c.bench_function("l1 lookup, 1000 entries, repeated hits", |b| {
        b.iter(|| {
            for i in 0..1000 {
                let path = format!("/corpus/doc-{i}.pdf");
                black_box(cache.lookup(Path::new(&path), 1_700_000_000, 4096));
            }
        })
    });
}

pub fn l1_store(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let cache = L1Cache::open(dir.path(), 256).unwrap();
    let result = ParseResult::new(ParseStatus::Ok, ContentKind::Pdf);
    let mut i = 0usize;
    c.bench_function("l1 store, fresh keys", |b| {
        b.iter(|| {
            let path = format!("/corpus/bench-{i}.pdf");
            cache.store(Path::new(&path), 1_700_000_000, 4096, &result);
            i += 1;
        })
    });
}

criterion_group!(benches, l1_lookup_hit, l1_store);
criterion_main!(benches);

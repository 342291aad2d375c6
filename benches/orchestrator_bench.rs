use criterion::{black_box, criterion_group, criterion_main, Criterion};
use docudactyl::config::Config;
use docudactyl::orchestrator;
use std::fs;
use std::path::PathBuf;

const DOC_COUNT: usize = 200;

fn build_corpus() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let docs_dir = dir.path().join("docs");
    fs::create_dir_all(&docs_dir).unwrap();
    for i in 0..DOC_COUNT {
        let path = docs_dir.join(format!("doc-{i}.pdf"));
        fs::write(&path, format!("%PDF-1.4\nbench fixture body {i}\n")).unwrap();
    }
    let manifest_path = dir.path().join("manifest.txt");
    let mut manifest = String::new();
    for i in 0..DOC_COUNT {
        manifest.push_str(&format!("{}\n", docs_dir.join(format!("doc-{i}.pdf")).display()));
    }
    fs::write(&manifest_path, manifest).unwrap();
    dir
}

fn bench_config(root: &std::path::Path) -> Config {
    Config {
        manifest_path: root.join("manifest.txt"),
        output_dir: root.join("output"),
        output_format: "json".to_string(),
        chunk_size: 32,
        max_retries_per_doc: 2,
        failure_threshold_pct: 5.0,
        progress_interval_sec: 3600,
        timeout_per_doc_ms: 300_000,
        manifest_mode: "shared".to_string(),
        cache_dir: PathBuf::new(),
        cache_size_mb: 256,
        cache_mode: "off".to_string(),
        l2_url: None,
        l2_ttl_secs: None,
        stages_config: "none".to_string(),
        resume: false,
        checkpoint_interval_docs: 1000,
        merge_shards: false,
        worker_count: 1,
        worker_id: 0,
        prefetch_window: 4,
    }
}

pub fn orchestrator_full_run(c: &mut Criterion) {
    c.bench_function("orchestrator run, 200 stub-parsed documents", |b| {
        b.iter_batched(
            build_corpus,
            |root| {
                let cfg = bench_config(root.path());
                black_box(orchestrator::run(&cfg).unwrap());
            },
            criterion::BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, orchestrator_full_run);
criterion_main!(benches);

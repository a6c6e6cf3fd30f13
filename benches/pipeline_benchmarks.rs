//! Filter Pipeline Benchmarks
//!
//! Benchmarks for request dispatch through the filter pipeline and for
//! content negotiation primitives.
//!
//! Run with: cargo bench --bench pipeline_benchmarks

use armature_mvc::prelude::*;
use armature_mvc_testing::{HookLog, RecordingFilter};
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use std::sync::Arc;

fn json_action() -> Arc<ActionDescriptor> {
    Arc::new(ActionDescriptor::new(
        "orders",
        "list",
        handler_fn(|_, _| Ok(ActionOutput::Value(serde_json::json!([{"id": 1}, {"id": 2}])))),
    ))
}

// ============================================================================
// Dispatch Benchmarks
// ============================================================================

fn bench_dispatch(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("dispatch");

    let bare = MvcApplication::default();
    let action = json_action();
    group.bench_function("no_filters", |b| {
        b.to_async(&rt).iter(|| async {
            let response = bare.handle(&action, HttpRequest::get("/orders"), None).await;
            black_box(response.unwrap().status)
        })
    });

    let log = HookLog::new();
    let mut filtered = MvcApplication::default();
    for i in 0..5 {
        filtered = filtered.with_global_filter(RecordingFilter::new(format!("f{}", i), &log));
    }
    group.bench_function("five_filters_all_stages", |b| {
        b.to_async(&rt).iter(|| async {
            log.clear();
            let response = filtered.handle(&action, HttpRequest::get("/orders"), None).await;
            black_box(response.unwrap().status)
        })
    });

    let negotiated = HttpRequest::get("/orders").with_header("accept", "text/plain;q=0.5, application/json");
    group.bench_function("accept_header", |b| {
        b.to_async(&rt).iter(|| async {
            let response = bare.handle(&action, negotiated.clone(), None).await;
            black_box(response.unwrap().status)
        })
    });

    group.finish();
}

// ============================================================================
// Media Type Benchmarks
// ============================================================================

fn bench_media_types(c: &mut Criterion) {
    let mut group = c.benchmark_group("media_type");

    group.bench_function("parse", |b| {
        b.iter(|| black_box(MediaType::parse(black_box("application/json; charset=utf-8"))))
    });

    group.bench_function("accept_parse", |b| {
        b.iter(|| black_box(Accept::parse(black_box("text/html, application/xml;q=0.9, */*;q=0.8"))))
    });

    let json = MediaType::json();
    let any_json = MediaType::any_json();
    group.bench_function("is_subset_of", |b| b.iter(|| black_box(json.is_subset_of(&any_json))));

    group.finish();
}

criterion_group!(benches, bench_dispatch, bench_media_types);
criterion_main!(benches);

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use backstop_core::classify::classify;
use backstop_core::failure::{extract_status, Failure};

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");

    group.bench_function("structured_429", |b| {
        let failure = Failure::with_status(429, "Too Many Requests").retry_after_ms(5000);
        b.iter(|| classify(black_box(&failure)))
    });

    group.bench_function("first_rule", |b| {
        b.iter(|| classify(black_box("rate limit exceeded for organization")))
    });

    group.bench_function("last_rule", |b| {
        b.iter(|| classify(black_box("Unexpected token < in JSON at position 0")))
    });

    group.bench_function("unknown", |b| {
        let message = "something unexpected happened while the worker was idle ".repeat(8);
        b.iter(|| classify(black_box(message.as_str())))
    });

    group.finish();
}

fn bench_extract_status(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_status");

    group.bench_function("present", |b| {
        b.iter(|| extract_status(black_box("Request failed with status: 503 Service Unavailable")))
    });

    group.bench_function("absent", |b| {
        b.iter(|| extract_status(black_box("connection reset by peer")))
    });

    group.finish();
}

criterion_group!(benches, bench_classify, bench_extract_status);
criterion_main!(benches);

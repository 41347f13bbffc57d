use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ctlab_rs::ctlab::frame::{build_frame, decode_frame};
use ctlab_rs::ctlab::response::ParsedResponse;
use ctlab_rs::parse_value;

fn benchmark_build_frame(c: &mut Criterion) {
    c.bench_function("build_frame", |b| {
        b.iter(|| black_box(build_frame(black_box(4), black_box("dcv=12.500"))))
    });
}

fn benchmark_decode_frame(c: &mut Criterion) {
    let frame = build_frame(4, "dcv=12.500");

    c.bench_function("decode_frame", |b| {
        b.iter(|| {
            let _ = black_box(decode_frame(black_box(&frame)));
        })
    });
}

fn benchmark_parse_response(c: &mut Criterion) {
    let line = b"#0:100=3.140$ab";

    c.bench_function("parse_response", |b| {
        b.iter(|| {
            let parsed = ParsedResponse::parse(black_box(line));
            let _ = black_box(parse_value(black_box(line)));
            black_box(parsed)
        })
    });
}

criterion_group!(
    benches,
    benchmark_build_frame,
    benchmark_decode_frame,
    benchmark_parse_response
);
criterion_main!(benches);

//! Parser benchmarks for bridge-parser.
//!
//! Measures parsing throughput at various rule counts and condition complexity.


use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use bridge_parser::{parse_condition, parse_sigma_yaml};

// ---------------------------------------------------------------------------
// Benchmark: parse single rule
// ---------------------------------------------------------------------------

fn bench_parse_single_rule(c: &mut Criterion) {
    let yaml = datagen::gen_n_rules(1);

    c.bench_function("parse_single_rule", |b| {
        b.iter(|| {
            let result = parse_sigma_yaml(black_box(&yaml)).unwrap();
            black_box(result);
        });
    });
}

// ---------------------------------------------------------------------------
// Benchmark: parse N rules (scaling)
// ---------------------------------------------------------------------------

fn bench_parse_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_rules");

    for n in [10, 100, 500] {
        let yaml = datagen::gen_n_rules(n);
        group.throughput(criterion::Throughput::Bytes(yaml.len() as u64));

        group.bench_with_input(BenchmarkId::new("count", n), &yaml, |b, yaml| {
            b.iter(|| {
                let result = parse_sigma_yaml(black_box(yaml)).unwrap();
                black_box(result);
            });
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: conditions
// ---------------------------------------------------------------------------

fn bench_parse_complex_condition(c: &mut Criterion) {
    let yaml = datagen::gen_complex_condition_rule();

    c.bench_function("parse_complex_condition", |b| {
        b.iter(|| {
            let result = parse_sigma_yaml(black_box(&yaml)).unwrap();
            black_box(result);
        });
    });
}

fn bench_parse_aggregation_rules(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_aggregation_rules");

    for n in [100, 500] {
        let yaml = datagen::gen_n_aggregation_rules(n);

        group.bench_with_input(BenchmarkId::new("count", n), &yaml, |b, yaml| {
            b.iter(|| {
                let result = parse_sigma_yaml(black_box(yaml)).unwrap();
                black_box(result);
            });
        });
    }

    group.finish();
}

fn bench_condition_only(c: &mut Criterion) {
    let condition = "selection and not 1 of filter_* | count(TargetUserName) by IpAddress > 10";

    c.bench_function("parse_condition_with_aggregation", |b| {
        b.iter(|| {
            let result = parse_condition(black_box(condition)).unwrap();
            black_box(result);
        });
    });
}

// ---------------------------------------------------------------------------
// Criterion harness
// ---------------------------------------------------------------------------

criterion_group!(
    benches,
    bench_parse_single_rule,
    bench_parse_scaling,
    bench_parse_complex_condition,
    bench_parse_aggregation_rules,
    bench_condition_only,
);
criterion_main!(benches);

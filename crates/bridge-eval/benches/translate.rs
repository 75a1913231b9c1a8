//! Translation benchmarks for bridge-eval.
//!
//! Measures per-rule translation cost and throughput over rule collections.


use bridge_eval::{CaseMode, RuleEvaluator, resolve_chain};
use bridge_parser::{parse_config, parse_sigma_yaml};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

// ---------------------------------------------------------------------------
// Benchmark: translate one rule
// ---------------------------------------------------------------------------

fn bench_translate_single_rule(c: &mut Criterion) {
    let collection = parse_sigma_yaml(&datagen::gen_n_rules(1)).unwrap();
    let config = parse_config(&datagen::gen_config()).unwrap();
    let evaluator = RuleEvaluator::new(&collection.rules[0], &config, CaseMode::Insensitive);

    c.bench_function("translate_single_rule", |b| {
        b.iter(|| {
            let result = black_box(&evaluator).bridges().unwrap();
            black_box(result);
        });
    });
}

// ---------------------------------------------------------------------------
// Benchmark: translate N rules (scaling)
// ---------------------------------------------------------------------------

fn bench_translate_collection(c: &mut Criterion) {
    let mut group = c.benchmark_group("translate_rules");
    let config = parse_config(&datagen::gen_config()).unwrap();

    for n in [10, 100, 500] {
        let collection = parse_sigma_yaml(&datagen::gen_n_rules(n)).unwrap();

        group.bench_with_input(
            BenchmarkId::new("count", n),
            &collection,
            |b, collection| {
                b.iter(|| {
                    for rule in &collection.rules {
                        let result = RuleEvaluator::new(rule, &config, CaseMode::Insensitive)
                            .bridges()
                            .unwrap();
                        black_box(result);
                    }
                });
            },
        );
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: modifier chain resolution
// ---------------------------------------------------------------------------

fn bench_resolve_chain(c: &mut Criterion) {
    let chain = ["wide", "base64", "contains"];

    c.bench_function("resolve_and_bridge_chain", |b| {
        b.iter(|| {
            let resolved = resolve_chain(black_box(&chain), CaseMode::Sensitive).unwrap();
            let fragment = resolved.bridge(Some("CommandLine"), "powershell").unwrap();
            black_box(fragment);
        });
    });
}

// ---------------------------------------------------------------------------
// Criterion harness
// ---------------------------------------------------------------------------

criterion_group!(
    benches,
    bench_translate_single_rule,
    bench_translate_collection,
    bench_resolve_chain,
);
criterion_main!(benches);

use benches::{generic_program, wide_call, RULES};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use engine::{analyze_trees, find_matches, EngineConfig, FindingCache};
use ir::Tree;
use loader::{load_rules_str, RuleSet};
use parsers::{parse_source, Language};
use patterns::compile_pattern;

fn program(functions: usize) -> Tree {
    parse_source(Language::Generic, "bench.gen", &generic_program(functions))
        .expect("parse fixture")
}

fn rules() -> RuleSet {
    load_rules_str(RULES, Some("bench.yaml")).expect("load rules")
}

fn bench_parsers(c: &mut Criterion) {
    let src = generic_program(50);
    c.bench_function("parse_generic", |b| {
        b.iter(|| parse_source(Language::Generic, "bench.gen", black_box(&src)).unwrap())
    });
    c.bench_function("compile_pattern", |b| {
        b.iter(|| {
            compile_pattern(
                Language::Generic,
                black_box("fn $NAME(...) { ...; close($H); ... }"),
            )
            .unwrap()
        })
    });
}

fn bench_search(c: &mut Criterion) {
    let cfg = EngineConfig::default();
    let mut group = c.benchmark_group("search");
    for size in [10usize, 50, 200] {
        let tree = program(size);
        let call = compile_pattern(Language::Generic, "open($F, ...)").unwrap();
        let deep = compile_pattern(Language::Generic, "res.send(<... f ...>, ...)").unwrap();
        group.bench_with_input(BenchmarkId::new("call", size), &tree, |b, tree| {
            b.iter(|| find_matches(black_box(&call), tree, &cfg).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("deep_ellipsis", size), &tree, |b, tree| {
            b.iter(|| find_matches(black_box(&deep), tree, &cfg).unwrap())
        });
    }
    group.finish();
}

fn bench_formula(c: &mut Criterion) {
    let rules = rules();
    let cfg = EngineConfig::default();
    let trees = vec![program(100)];
    c.bench_function("analyze_rules", |b| {
        b.iter(|| analyze_trees(black_box(&trees), &rules, &cfg, None))
    });
}

fn bench_parallel(c: &mut Criterion) {
    let rules = rules();
    let cfg = EngineConfig::default();
    let trees: Vec<Tree> = (0..32)
        .map(|i| {
            parse_source(
                Language::Generic,
                &format!("bench_{i}.gen"),
                &generic_program(20),
            )
            .expect("parse fixture")
        })
        .collect();
    c.bench_function("analyze_32_files", |b| {
        b.iter(|| analyze_trees(black_box(&trees), &rules, &cfg, None))
    });

    let mut cache = FindingCache::default();
    analyze_trees(&trees, &rules, &cfg, Some(&mut cache));
    c.bench_function("analyze_32_files_cached", |b| {
        b.iter(|| analyze_trees(black_box(&trees), &rules, &cfg, Some(&mut cache)))
    });
}

fn bench_budget(c: &mut Criterion) {
    let tree = parse_source(Language::Generic, "wide.gen", &wide_call(40)).unwrap();
    let pattern =
        compile_pattern(Language::Generic, "g(..., $X, ..., $Y, ..., $X, ...)").unwrap();
    let cfg = EngineConfig {
        max_steps: Some(10_000),
        ..EngineConfig::default()
    };
    c.bench_function("step_budget_exhaustion", |b| {
        b.iter(|| find_matches(black_box(&pattern), &tree, &cfg).unwrap_err())
    });
}

criterion_group!(
    benches,
    bench_parsers,
    bench_search,
    bench_formula,
    bench_parallel,
    bench_budget
);
criterion_main!(benches);

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::hint::black_box;

use multiplicity::*;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

fn engine() -> Engine {
    let mut engine = Engine::new();
    engine.set_operation(OperationType::Plan);
    engine
}

fn parse(engine: &Engine, text: &str) -> Expression {
    engine
        .parse_expression("main.tf".to_string(), text.to_string())
        .unwrap()
}

fn names(n: usize) -> Vec<Value> {
    (0..n).map(|i| Value::from(format!("instance-{i}"))).collect()
}

fn expand_set(c: &mut Criterion) {
    let engine = engine();
    let expr = parse(&engine, "toset(var.names)");

    let mut group = c.benchmark_group("for_each set");
    for n in [10, 100, 1000] {
        let scope = StaticScope::new()
            .with("var.names", Value::list(names(n)))
            .unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(n), &scope, |b, scope| {
            b.iter(|| {
                let (r, diags) = engine.expand_for_each(Some(black_box(&expr)), scope);
                assert!(diags.is_empty());
                r
            })
        });
    }
    group.finish();
}

fn expand_map(c: &mut Criterion) {
    let engine = engine();
    let expr = parse(&engine, "merge(var.defaults, var.overrides)");

    let mut group = c.benchmark_group("for_each map");
    for n in [10, 100, 1000] {
        let defaults = Value::map_from((0..n).map(|i| (format!("instance-{i}"), Value::from(i))));
        let overrides = Value::map_from((0..n / 2).map(|i| (format!("instance-{i}"), Value::from(true))));
        let scope = StaticScope::new()
            .with("var.defaults", defaults)
            .and_then(|s| s.with("var.overrides", overrides))
            .unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(n), &scope, |b, scope| {
            b.iter(|| engine.expand(Some(black_box(&expr)), None, scope))
        });
    }
    group.finish();
}

fn expand_count(c: &mut Criterion) {
    let engine = engine();
    let expr = parse(&engine, "length(var.names)");
    let scope = StaticScope::new()
        .with("var.names", Value::list(names(1000)))
        .unwrap();

    c.bench_function("count from length", |b| {
        b.iter(|| engine.expand_count(Some(black_box(&expr)), &scope))
    });
}

criterion_group!(benches, expand_set, expand_map, expand_count);
criterion_main!(benches);

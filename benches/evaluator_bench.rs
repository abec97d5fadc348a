//! Benchmark for graph evaluation and catalog generation.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use symcsr::catalog::{self, XLEN};
use symcsr::{cond, symbol, Context, Eager, Evaluator, Symbolic};

fn benchmark_conditional_width(c: &mut Criterion) {
    let xlen = symbol("xlen");
    let width = cond(xlen.ne(32), &xlen - 2, (&xlen - 1) * 2);
    let ctx = Context::new().with("xlen", 64);

    c.bench_function("conditional width, cold cache", |b| {
        b.iter(|| {
            let mut evaluator = Evaluator::new();
            black_box(evaluator.evaluate(&width, &ctx).unwrap())
        });
    });

    let mut warm = Evaluator::new();
    c.bench_function("conditional width, warm cache", |b| {
        b.iter(|| black_box(warm.evaluate(&width, &ctx).unwrap()));
    });
}

fn benchmark_deep_chain(c: &mut Criterion) {
    let mut expr = symbol("x");
    for i in 0..1_000 {
        expr = &expr + i;
    }
    let ctx = Context::new().with("x", 1);

    c.bench_function("chain of 1000 additions", |b| {
        b.iter(|| {
            let mut evaluator = Evaluator::new();
            black_box(evaluator.evaluate(&expr, &ctx).unwrap())
        });
    });
}

fn benchmark_catalog(c: &mut Criterion) {
    c.bench_function("symbolic catalog, build and realize xlen=64", |b| {
        b.iter(|| {
            let catalog = catalog::build(&Symbolic::new()).unwrap();
            let mut evaluator = Evaluator::new();
            let ctx = Context::new().with(XLEN, 64);
            black_box(catalog.realize(&mut evaluator, &ctx).unwrap())
        });
    });

    c.bench_function("eager catalog xlen=64", |b| {
        b.iter(|| {
            let mode = Eager::new(Context::new().with(XLEN, 64));
            black_box(catalog::build(&mode).unwrap().concrete().unwrap())
        });
    });
}

criterion_group!(
    benches,
    benchmark_conditional_width,
    benchmark_deep_chain,
    benchmark_catalog
);
criterion_main!(benches);

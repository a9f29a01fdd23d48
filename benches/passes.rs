#![allow(unused)]
extern crate tacopt;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use tacopt::{
    analysis::{
        dataflow::{run_dataflow, LiveVariables, ReachingDefinitions},
        ssa::{convert_from_ssa, convert_to_ssa},
        Analysis, ControlFlowGraph,
    },
    compiler::find_and_optimize_loops,
    ir::{Function, FunctionBuilder},
    utils::graph::algorithms::compute_dominators,
};

/// Builds a chain of `count` do-while loops, each with a diamond inside and an invariant
/// constant, so that every analysis has real work to do.
fn loop_chain(count: usize) -> Function {
    let mut builder = FunctionBuilder::new("chain")
        .arg("n", "int")
        .constant("acc", 0)
        .constant("one", 1);

    for index in 0..count {
        let head = format!("head{index}");
        let left = format!("left{index}");
        let right = format!("right{index}");
        let latch = format!("latch{index}");
        let counter_name = format!("i{index}");
        let counter = counter_name.as_str();
        builder = builder
            .constant(counter, 0)
            .jump(&head)
            .label(&head)
            .constant("seven", 7)
            .op("lt", "small", &[counter, "seven"])
            .branch("small", &left, &right)
            .label(&left)
            .op("add", "acc", &["acc", counter])
            .jump(&latch)
            .label(&right)
            .op("sub", "acc", &["acc", "one"])
            .jump(&latch)
            .label(&latch)
            .op("add", counter, &[counter, "one"])
            .op("lt", "again", &[counter, "n"])
            .branch("again", &head, &format!("after{index}"))
            .label(&format!("after{index}"));
    }

    builder.effect("print", &["acc"]).ret(None).build()
}

/// Benchmark the analyses on chains of increasing length
///
/// Each group reports throughput in instructions so that results for different sizes can be
/// compared directly.
fn bench_analyses(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyses");
    for count in [8usize, 64] {
        let function = loop_chain(count);
        group.throughput(Throughput::Elements(function.instrs.len() as u64));

        group.bench_with_input(BenchmarkId::new("cfg", count), &function, |b, f| {
            b.iter(|| black_box(ControlFlowGraph::build(black_box(f)).unwrap()));
        });

        let cfg = ControlFlowGraph::build(&function).unwrap();
        group.bench_with_input(BenchmarkId::new("dominators", count), &cfg, |b, cfg| {
            b.iter(|| black_box(compute_dominators(black_box(cfg))));
        });

        group.bench_with_input(BenchmarkId::new("reaching", count), &function, |b, f| {
            b.iter(|| black_box(run_dataflow(f, ReachingDefinitions::new(f)).unwrap()));
        });

        group.bench_with_input(BenchmarkId::new("liveness", count), &function, |b, f| {
            b.iter(|| black_box(run_dataflow(f, LiveVariables).unwrap()));
        });
    }
    group.finish();
}

/// Benchmark the transforming passes, each on a fresh copy of the input
fn bench_transforms(c: &mut Criterion) {
    let mut group = c.benchmark_group("transforms");
    for count in [8usize, 64] {
        let function = loop_chain(count);
        group.throughput(Throughput::Elements(function.instrs.len() as u64));

        group.bench_with_input(BenchmarkId::new("ssa_roundtrip", count), &function, |b, f| {
            b.iter(|| {
                let mut function = f.clone();
                convert_to_ssa(&mut function, &mut Analysis::new()).unwrap();
                convert_from_ssa(&mut function).unwrap();
                black_box(function)
            });
        });

        group.bench_with_input(BenchmarkId::new("licm", count), &function, |b, f| {
            b.iter(|| {
                let mut function = f.clone();
                let report = find_and_optimize_loops(&mut function, &mut Analysis::new(), 4)
                    .unwrap();
                black_box(report)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_analyses, bench_transforms);
criterion_main!(benches);

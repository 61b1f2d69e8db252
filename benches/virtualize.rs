#![allow(unused)]
extern crate framevirt;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use framevirt::prelude::*;
use std::hint::black_box;

/// Builds a unit that writes every slot of a `locals`-slot frame and reads each one back.
///
/// Even slots hold longs, odd slots hold objects, and every fourth write goes through a static
/// access so that OSR widening is exercised when `osr` is set.
fn frame_heavy_graph(locals: usize, osr: bool) -> Graph {
    let mut b = GraphBuilder::new(format!("frame{locals}"));
    let shape = if osr {
        FrameShape::locals(locals).osr()
    } else {
        FrameShape::locals(locals)
    };
    let frame = b.frame(shape);
    let object = b.param(Kind::Object);

    for slot in 0..locals {
        let flags = if slot % 4 == 0 {
            AccessFlags::STATIC_AND_SET_TAG
        } else {
            AccessFlags::SET_TAG
        };
        if slot % 2 == 0 {
            let value = b.const_i32(slot as i32);
            b.frame_set(frame, slot, FrameTag::Int, value, AccessType::Local, flags);
        } else {
            b.frame_set(frame, slot, FrameTag::Object, object, AccessType::Local, flags);
        }
    }

    for slot in 0..locals {
        let kind = if slot % 2 == 0 { Kind::Int } else { Kind::Object };
        let flags = if slot % 4 == 0 {
            AccessFlags::STATIC
        } else {
            AccessFlags::NON_STATIC
        };
        let read = b.frame_get(frame, slot, kind, AccessType::Local, flags);
        b.escape(read);
    }

    b.ret(None);
    b.finish()
}

/// Benchmark the full pipeline on a single unit of growing frame size.
fn bench_single_unit(c: &mut Criterion) {
    let config = VirtualizationConfig::default();
    let mut group = c.benchmark_group("virtualize_single");

    for locals in [8usize, 32, 128] {
        group.throughput(Throughput::Elements(locals as u64 * 2));
        group.bench_function(format!("locals_{locals}"), |b| {
            b.iter_batched(
                || {
                    let ctx = CompilerContext::new(config);
                    ctx.add_graph(frame_heavy_graph(locals, true));
                    ctx
                },
                |ctx| {
                    let iterations = PassScheduler::from_config(&config)
                        .run_pipeline(&ctx)
                        .unwrap();
                    black_box((iterations, ctx.events.len()))
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

/// Benchmark many units processed in parallel.
fn bench_parallel_units(c: &mut Criterion) {
    let config = VirtualizationConfig::default();
    let units = 256;

    let mut group = c.benchmark_group("virtualize_parallel");
    group.throughput(Throughput::Elements(units as u64));
    group.bench_function("units_256_locals_16", |b| {
        b.iter_batched(
            || {
                let ctx = CompilerContext::new(config);
                for _ in 0..units {
                    ctx.add_graph(frame_heavy_graph(16, false));
                }
                ctx
            },
            |ctx| {
                PassScheduler::from_config(&config)
                    .run_pipeline(&ctx)
                    .unwrap();
                black_box(ctx.stats())
            },
            BatchSize::LargeInput,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_single_unit, bench_parallel_units);
criterion_main!(benches);

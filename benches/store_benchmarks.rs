//! Dataset store benchmarks
//!
//! Benchmarks for the TUID store hot paths:
//! - Dataset store (lock + Parquet write)
//! - Dataset load
//! - Container tree scans (find/latest)
//! - TUID generation and parsing

use std::sync::Arc;

use arrow::array::{Float64Array, Int32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::Rng;
use tuid_store::{DataStore, Dataset, Tuid};

/// Create a test RecordBatch with the specified number of rows
fn defect_rate_batch(num_rows: i32) -> RecordBatch {
    let schema = Schema::new(vec![
        Field::new("qec_round", DataType::Int32, false),
        Field::new("defect_rate", DataType::Float64, false),
    ]);

    let mut rng = rand::thread_rng();
    let rounds = Int32Array::from_iter_values(0..num_rows);
    let rates = Float64Array::from_iter_values((0..num_rows).map(|_| rng.gen_range(0.0..0.05)));

    RecordBatch::try_new(Arc::new(schema), vec![Arc::new(rounds), Arc::new(rates)]).unwrap()
}

fn small_dataset() -> Dataset {
    Dataset::new(vec![defect_rate_batch(1)])
}

/// Benchmark storing a dataset (lock acquisition + Parquet write)
fn bench_store_dataset(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_dataset");

    for size in [1_000, 10_000, 100_000] {
        let dir = tempfile::tempdir().unwrap();
        let store = DataStore::open(dir.path()).unwrap();
        let tuid: Tuid = "20250526-200454-747-e499bf".parse().unwrap();
        let dataset = Dataset::new(vec![defect_rate_batch(size)]);

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                // Overwrite the same TUID so the tree stays flat across
                // iterations.
                let mut dataset = dataset.clone();
                let tuid = store.store(&mut dataset, Some(tuid.clone()), "bench").unwrap();
                black_box(tuid);
            });
        });
    }

    group.finish();
}

/// Benchmark loading a dataset back by TUID
fn bench_load_dataset(c: &mut Criterion) {
    let mut group = c.benchmark_group("load_dataset");

    for size in [1_000, 10_000, 100_000] {
        let dir = tempfile::tempdir().unwrap();
        let store = DataStore::open(dir.path()).unwrap();
        let mut dataset = Dataset::new(vec![defect_rate_batch(size)]);
        let tuid = store.store(&mut dataset, None, "bench").unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let loaded = store.load(&tuid).unwrap();
                black_box(loaded);
            });
        });
    }

    group.finish();
}

/// Benchmark range scans over a populated container tree
fn bench_find(c: &mut Criterion) {
    let mut group = c.benchmark_group("find");

    for containers in [10, 100, 1_000] {
        let dir = tempfile::tempdir().unwrap();
        let store = DataStore::open(dir.path()).unwrap();

        for i in 0..containers {
            let tuid: Tuid = format!(
                "20250526-{:02}{:02}{:02}-000-{i:06x}",
                i / 3600,
                (i / 60) % 60,
                i % 60
            )
            .parse()
            .unwrap();
            store
                .store(&mut small_dataset(), Some(tuid), "bench_run")
                .unwrap();
        }

        let start: Tuid = "20250526-000000-000-000000".parse().unwrap();
        let end: Tuid = "20250526-235959-999-ffffff".parse().unwrap();

        group.bench_with_input(
            BenchmarkId::from_parameter(containers),
            &containers,
            |b, _| {
                b.iter(|| {
                    let tuids = store.find("bench_run", &start, &end, false).unwrap();
                    black_box(tuids);
                });
            },
        );
    }

    group.finish();
}

/// Benchmark TUID generation and parsing
fn bench_tuid(c: &mut Criterion) {
    let mut group = c.benchmark_group("tuid");

    group.bench_function("generate", |b| {
        b.iter(|| black_box(Tuid::now()));
    });

    group.bench_function("parse", |b| {
        b.iter(|| black_box("20250526-200454-747-e499bf".parse::<Tuid>().unwrap()));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_store_dataset,
    bench_load_dataset,
    bench_find,
    bench_tuid
);
criterion_main!(benches);

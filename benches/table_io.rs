//! Table read/write benchmarks.
//!
//! Measures building and freezing a mixed table, sequential column scans,
//! random cell access and row assembly over the byte and mmap sources.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use coltable::{ColumnType, IndexList, Table, TableBuilder, Value, Vector};
use tempfile::tempdir;

fn build(rows: u32) -> TableBuilder {
    let mut builder = TableBuilder::new();
    builder.add_column(ColumnType::Long, "id");
    builder.add_column(ColumnType::String, "label");
    builder.add_column(ColumnType::Vector, "embedding");
    builder.add_column(ColumnType::IndexList, "links");
    for i in 0..rows {
        builder
            .append_row(&[
                Value::Long(i as i64),
                Value::from(format!("label-{}", i % 64)),
                Value::Vector(Vector::new(vec![i as f32; 16])),
                Value::IndexList(IndexList::new(vec![i, i / 2, i / 3])),
            ])
            .unwrap();
    }
    builder
}

fn bench_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_write");
    for rows in [1_000u32, 10_000] {
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::new("mixed", rows), &rows, |b, &rows| {
            b.iter_with_setup(|| build(rows), |builder| black_box(builder.write_to_vec().unwrap()));
        });
    }
    group.finish();
}

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_scan");
    let rows = 10_000u32;
    let table = Table::open_bytes(build(rows).write_to_vec().unwrap()).unwrap();
    group.throughput(Throughput::Elements(rows as u64));

    group.bench_function("long_column", |b| {
        b.iter(|| {
            let mut reader = table.column::<i64>(0).unwrap();
            let sum: i64 = reader.iter().map(|v| v.unwrap()).sum();
            black_box(sum)
        });
    });

    group.bench_function("vector_column", |b| {
        b.iter(|| {
            let mut reader = table.column::<Vector>(2).unwrap();
            let mut total = 0usize;
            for v in reader.iter() {
                total += v.unwrap().len();
            }
            black_box(total)
        });
    });

    group.bench_function("rows", |b| {
        b.iter(|| black_box(table.rows(0..rows).unwrap().count()));
    });
    group.finish();
}

fn bench_random_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_random_access");
    let rows = 10_000u32;
    let bytes = build(rows).write_to_vec().unwrap();
    let dir = tempdir().unwrap();
    let path = dir.path().join("bench.tbl");
    std::fs::write(&path, &bytes).unwrap();

    let sources = [
        ("bytes", Table::open_bytes(bytes).unwrap()),
        ("mmap", Table::open_mmap(&path).unwrap()),
    ];
    let indices: Vec<u32> = (0..1_000u32).map(|i| (i * 7_919) % rows).collect();
    group.throughput(Throughput::Elements(indices.len() as u64));

    for (name, table) in &sources {
        group.bench_with_input(BenchmarkId::new("string_get", name), table, |b, table| {
            let mut reader = table.column::<String>(1).unwrap();
            b.iter(|| {
                for &i in &indices {
                    black_box(reader.get(i).unwrap());
                }
            });
        });
        group.bench_with_input(BenchmarkId::new("rows_at", name), table, |b, table| {
            b.iter(|| black_box(table.rows_at(&indices).unwrap()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_write, bench_scan, bench_random_access);
criterion_main!(benches);

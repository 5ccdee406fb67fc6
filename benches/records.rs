//! Record access benchmarks for fsrecords
//!
//! These benchmarks measure the hot paths of the storage: single-field reads
//! and writes, multi-field updates, allocation and full scans.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fsrecords::{RecordsStorage, NULL_ID};
use tempfile::{tempdir, TempDir};

const PAGE_SIZE: usize = 1 << 20;

fn storage_with_records(count: i32) -> (TempDir, RecordsStorage) {
    let dir = tempdir().unwrap();
    let storage = RecordsStorage::builder()
        .page_size(PAGE_SIZE)
        .open(dir.path().join("records.dat"))
        .unwrap();
    for id in 0..count {
        storage.allocate_record().unwrap();
        storage
            .fill_record(id, id as i64, 0, id & 0xFF, id + 1, 0, true)
            .unwrap();
    }
    (dir, storage)
}

fn bench_field_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("field_access");
    let (_dir, storage) = storage_with_records(100_000);

    group.bench_function("get_flags", |b| {
        let mut id = 0;
        b.iter(|| {
            id = (id + 7919) % 100_000;
            black_box(storage.flags(black_box(id)).unwrap())
        });
    });

    group.bench_function("set_length_changed", |b| {
        let mut value = 0i64;
        b.iter(|| {
            value += 1;
            black_box(storage.set_record_length(black_box(42), value).unwrap())
        });
    });

    group.bench_function("set_length_unchanged", |b| {
        storage.set_record_length(43, 1234).unwrap();
        b.iter(|| black_box(storage.set_record_length(black_box(43), 1234).unwrap()));
    });

    group.bench_function("update_record_three_fields", |b| {
        let mut value = 0;
        b.iter(|| {
            value += 1;
            storage
                .update_record(black_box(44), |r| {
                    r.set_flags(value);
                    r.set_length(value as i64);
                    r.set_timestamp(value as i64);
                    true
                })
                .unwrap()
        });
    });

    group.bench_function("fill_record", |b| {
        let mut value = 0;
        b.iter(|| {
            value += 1;
            storage
                .fill_record(black_box(45), value as i64, value as i64, value, 1, 0, false)
                .unwrap()
        });
    });

    group.finish();
}

fn bench_allocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocation");

    group.bench_function("allocate_and_fill", |b| {
        let (_dir, storage) = storage_with_records(0);
        b.iter(|| {
            storage
                .update_record(NULL_ID, |r| {
                    r.set_name_id(1);
                    true
                })
                .unwrap()
        });
    });

    group.finish();
}

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");

    for count in [10_000, 100_000] {
        let (_dir, storage) = storage_with_records(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("process_all_records", count), &count, |b, _| {
            b.iter(|| {
                let mut sum = 0i64;
                storage
                    .process_all_records(|record| {
                        sum += record.name_id as i64;
                        Ok(())
                    })
                    .unwrap();
                black_box(sum)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_field_access, bench_allocation, bench_scan);
criterion_main!(benches);

//! Benchmarks for waldb transactions.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tempfile::TempDir;
use waldb::{Database, DatabaseConfig, Key, TableKey};

fn open(dir: &TempDir, tables: &[&str]) -> Database {
    let config = DatabaseConfig::new(dir.path()).tables(TableKey::parse_all(tables).unwrap());
    Database::open(config).unwrap()
}

/// Benchmark durable puts of various payload sizes.
fn bench_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("put");
    group.sample_size(20);

    for size in [16usize, 1024, 16 * 1024].iter() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir, &["t"]);
        let cfg = db.prepare_tx(Vec::<&str>::new(), ["t"]).unwrap();
        let value = vec![0xabu8; *size];
        let mut n = 0u64;

        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                n += 1;
                cfg.run_tx(|tx| tx.table("t")?.put(Key::from_u64(n), &value))
                    .unwrap();
            });
        });
    }

    group.finish();
}

/// Benchmark the fluent chain against direct table access.
fn bench_fluent_put(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let db = open(&dir, &["a", "b"]);
    let cfg = db.prepare_tx(Vec::<&str>::new(), ["a", "b"]).unwrap();
    let mut n = 0u64;

    let mut group = c.benchmark_group("two_table_put");
    group.sample_size(20);
    group.bench_function("fluent", |b| {
        b.iter(|| {
            n += 1;
            let mut tx = cfg.begin();
            tx.put("a", Key::from_u64(n), b"value").put("b", Key::from_u64(n), b"value");
            assert!(tx.err().is_none());
            tx.end().unwrap();
        });
    });
    group.bench_function("direct", |b| {
        b.iter(|| {
            n += 1;
            cfg.run_tx(|tx| {
                tx.table("a")?.put(Key::from_u64(n), b"value")?;
                tx.table("b")?.put(Key::from_u64(n), b"value")
            })
            .unwrap();
        });
    });
    group.finish();
}

/// Benchmark reads of the latest value.
fn bench_get(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let db = open(&dir, &["t"]);
    let write = db.prepare_tx(Vec::<&str>::new(), ["t"]).unwrap();
    let read = db.prepare_tx(["t"], Vec::<&str>::new()).unwrap();

    write
        .run_tx(|tx| {
            let mut t = tx.table("t")?;
            for i in 0..1000 {
                t.put(Key::from_u64(i), format!("value{i:08}").as_bytes())?;
            }
            Ok(())
        })
        .unwrap();

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1000));
    group.bench_function("1000_keys_one_tx", |b| {
        b.iter(|| {
            read.run_tx(|tx| {
                let t = tx.table("t")?;
                for i in 0..1000 {
                    black_box(t.get(&Key::from_u64(i))?);
                }
                Ok(())
            })
            .unwrap();
        });
    });
    group.finish();
}

/// Benchmark walking a key's history.
fn bench_history(c: &mut Criterion) {
    let mut group = c.benchmark_group("history");

    for versions in [10u64, 100, 1000].iter() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir, &["t"]);
        let cfg = db.prepare_tx(Vec::<&str>::new(), ["t"]).unwrap();
        let key = Key::from_u64(1);

        cfg.run_tx(|tx| {
            let mut t = tx.table("t")?;
            for v in 0..*versions {
                t.put(key, &v.to_be_bytes())?;
            }
            Ok(())
        })
        .unwrap();

        group.throughput(Throughput::Elements(*versions));
        group.bench_with_input(BenchmarkId::from_parameter(versions), versions, |b, _| {
            b.iter(|| {
                let mut buf = [0u8; 8];
                cfg.run_tx(|tx| {
                    let t = tx.table("t")?;
                    t.range_rev_entries(&key, |record| {
                        black_box(t.read_entry(record, &mut buf)?);
                        Ok::<_, waldb::TransactionError>(())
                    })
                })
                .unwrap();
            });
        });
    }

    group.finish();
}

/// Benchmark begin/end over several tables with no table access.
fn bench_lock_cycle(c: &mut Criterion) {
    let tables = ["a", "b", "c", "d", "e", "f", "g", "h"];
    let dir = TempDir::new().unwrap();
    let db = open(&dir, &tables);
    let cfg = db.prepare_tx(&tables[..4], &tables[4..]).unwrap();

    c.bench_function("begin_end_8_tables", |b| {
        b.iter(|| {
            let mut tx = cfg.begin();
            tx.end().unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_put,
    bench_fluent_put,
    bench_get,
    bench_history,
    bench_lock_cycle
);
criterion_main!(benches);

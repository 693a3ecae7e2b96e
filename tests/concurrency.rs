//! Stress tests for transaction locking across overlapping table sets.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;
use waldb::{Database, DatabaseConfig, Key, TableKey, TxConfig};

const TABLES: [&str; 6] = ["accounts", "audit", "events", "orders", "sessions", "users"];

fn open(dir: &TempDir) -> Database {
    let config = DatabaseConfig::new(dir.path()).tables(TableKey::parse_all(TABLES).unwrap());
    Database::open(config).unwrap()
}

/// Random disjoint read/write split over a random subset of the tables.
fn random_config(db: &Database, rng: &mut StdRng) -> (Arc<TxConfig>, Vec<&'static str>) {
    let mut tables = TABLES.to_vec();
    tables.shuffle(rng);
    tables.truncate(rng.gen_range(1..=TABLES.len()));

    let (mut read, mut write) = (Vec::new(), Vec::new());
    for table in tables {
        if rng.gen_bool(0.5) {
            write.push(table);
        } else {
            read.push(table);
        }
    }

    let cfg = db.prepare_tx(read, write.clone()).unwrap();
    (cfg, write)
}

/// Many threads running transactions over random, overlapping table sets.
/// Finishing at all means no deadlock; the counts check no write was lost.
#[test]
fn stress_overlapping_transactions() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);

    let num_threads = 8u64;
    let tx_per_thread = 200u64;

    let handles: Vec<_> = (0..num_threads)
        .map(|t| {
            let db = db.clone();
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(t);
                let configs: Vec<_> = (0..4).map(|_| random_config(&db, &mut rng)).collect();
                let mut written: HashMap<&'static str, u64> = HashMap::new();

                for i in 0..tx_per_thread {
                    let (cfg, write) = &configs[rng.gen_range(0..configs.len())];
                    let key = Key::from_u64((t << 32) | i);

                    let mut tx = cfg.begin();
                    for (table, _) in cfg.lock_order() {
                        if !write.contains(&table.as_str()) {
                            // read something that may or may not be there
                            tx.exists(table.as_str(), &key);
                        }
                    }
                    for &table in write {
                        tx.put(table, key, table.as_bytes());
                        *written.entry(table).or_default() += 1;
                    }
                    assert!(tx.err().is_none(), "tx {i} on thread {t}: {:?}", tx.err());
                    tx.end().unwrap();
                }
                written
            })
        })
        .collect();

    let mut expected: HashMap<&'static str, u64> = HashMap::new();
    for h in handles {
        for (table, n) in h.join().unwrap() {
            *expected.entry(table).or_default() += n;
        }
    }

    let cfg = db.prepare_tx(TABLES, Vec::<&str>::new()).unwrap();
    let mut tx = cfg.begin();
    for table in TABLES {
        let count = tx.table(table).unwrap().count() as u64;
        assert_eq!(count, expected.get(table).copied().unwrap_or(0), "table {table}");
    }
    tx.end().unwrap();
    db.close().unwrap();
}

/// A writer updates two tables in one transaction; readers holding both
/// tables must never see them disagree.
#[test]
fn stress_readers_see_whole_transactions() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    let key = Key::from_u64(1);

    // the two configs list the tables in opposite order
    let write_cfg = db.prepare_tx(Vec::<&str>::new(), ["users", "accounts"]).unwrap();
    let read_cfg = db.prepare_tx(["accounts", "users"], Vec::<&str>::new()).unwrap();

    write_cfg
        .run_tx(|tx| {
            tx.table("accounts")?.put(key, &0u64.to_be_bytes())?;
            tx.table("users")?.put(key, &0u64.to_be_bytes())
        })
        .unwrap();

    thread::scope(|s| {
        s.spawn(|| {
            for n in 1..=300u64 {
                write_cfg
                    .run_tx(|tx| {
                        tx.table("users")?.put(key, &n.to_be_bytes())?;
                        thread::yield_now();
                        tx.table("accounts")?.put(key, &n.to_be_bytes())
                    })
                    .unwrap();
            }
        });

        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..300 {
                    let (a, u) = read_cfg
                        .run_tx(|tx| {
                            let a = tx.table("accounts")?.get(&key)?;
                            let u = tx.table("users")?.get(&key)?;
                            Ok((a, u))
                        })
                        .unwrap();
                    assert_eq!(a, u);
                }
            });
        }
    });

    let history = read_cfg.run_tx(|tx| tx.table("users")?.history(&key)).unwrap();
    assert_eq!(history.len(), 301);
    assert_eq!(history[0], 300u64.to_be_bytes());
    assert_eq!(history[300], 0u64.to_be_bytes());
}

/// Fluent chains from many threads: a failing chain must leave no trace.
#[test]
fn stress_failed_chains_have_no_effect() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    let cfg = db.prepare_tx(["audit"], ["events"]).unwrap();

    thread::scope(|s| {
        for t in 0..4u64 {
            let cfg = &cfg;
            s.spawn(move || {
                for i in 0..50u64 {
                    let key = Key::from_u64((t << 32) | i);
                    let mut tx = cfg.begin();
                    tx.put("events", key, b"kept")
                        .put("audit", key, b"rejected")
                        .put("events", Key::from_u64(u64::MAX - i), b"skipped");
                    assert!(tx.err().is_some());
                    tx.end().unwrap();
                }
            });
        }
    });

    let (events, audit) = cfg
        .run_tx(|tx| {
            let events = tx.table("events")?.count();
            Ok((events, tx.table("audit")?.count()))
        })
        .unwrap();
    assert_eq!(events, 200);
    assert_eq!(audit, 0);
}

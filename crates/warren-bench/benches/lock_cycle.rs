//! Criterion micro-benchmarks for lock ordering and command execution.

use std::hint::black_box;
use std::sync::Arc;
use std::thread;

use criterion::{criterion_group, criterion_main, Criterion};
use warren_bench::{grid, populate};
use warren_engine::{Engine, EngineConfig, ResourceSet};
use warren_test_utils::{goblin, CountingLock, Journal};

fn config() -> EngineConfig {
    EngineConfig {
        dispatch_workers: Some(2),
        seed: Some(1),
        ..EngineConfig::default()
    }
}

fn bench_resource_set(c: &mut Criterion) {
    let journal = Journal::new();
    let locks: Vec<Arc<CountingLock>> = (0..8)
        .map(|_| Arc::new(CountingLock::new(&journal)))
        .collect();
    // Worst case for insertion: descending ids.
    let reversed: Vec<Arc<CountingLock>> = locks.iter().rev().cloned().collect();

    c.bench_function("resource_set_insert_8_descending", |b| {
        b.iter(|| {
            let mut set = ResourceSet::new();
            for lock in &reversed {
                set.add_lock(black_box(lock));
            }
            black_box(set.len())
        });
    });

    c.bench_function("resource_set_duplicate_probe", |b| {
        let mut set = ResourceSet::new();
        for lock in &locks {
            set.add_lock(lock);
        }
        b.iter(|| black_box(set.add_lock(black_box(&locks[3]))));
    });
}

fn bench_execute(c: &mut Criterion) {
    let engine = Engine::new(grid(8, 8).unwrap(), config()).unwrap();
    let bots = populate(&engine, 64, 1_000_000).unwrap();
    let walker = bots[0];
    let start = Arc::clone(&engine.world().locations()[9]);
    engine.spawn(goblin(i64::MAX / 2), &start).unwrap();
    let fighter = populate(&engine, 1, 10).unwrap()[0];

    c.bench_function("execute_look", |b| {
        b.iter(|| engine.execute(walker, black_box("look")).unwrap());
    });

    c.bench_function("execute_move_there_and_back", |b| {
        b.iter(|| {
            engine.execute(walker, "east").unwrap();
            engine.execute(walker, "west").unwrap();
        });
    });

    // Move the fighter next to the goblin: room (1,1) is index 9.
    engine.execute(fighter, "east").unwrap();
    engine.execute(fighter, "south").unwrap();
    c.bench_function("execute_hit_with_neighbours", |b| {
        b.iter(|| engine.execute(fighter, black_box("hit goblin")).unwrap());
    });
}

fn bench_contended(c: &mut Criterion) {
    let engine = Engine::new(grid(4, 1).unwrap(), config()).unwrap();
    let bots = populate(&engine, 8, 10).unwrap();
    let ctx = Arc::clone(engine.context());

    c.bench_function("contended_walkers_8x50", |b| {
        b.iter(|| {
            thread::scope(|s| {
                for (i, &bot) in bots.iter().enumerate() {
                    let ctx = &ctx;
                    s.spawn(move || {
                        let (there, back) = if i % 2 == 0 {
                            ("east", "west")
                        } else {
                            ("west", "east")
                        };
                        for _ in 0..25 {
                            ctx.execute(bot, there).unwrap();
                            ctx.execute(bot, back).unwrap();
                        }
                    });
                }
            });
        });
    });
}

criterion_group!(benches, bench_resource_set, bench_execute, bench_contended);
criterion_main!(benches);

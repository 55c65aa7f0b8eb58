//! Criterion benchmarks for MarketLab hot paths.
//!
//! 1. Batch ingest: one update pulling the full history through the
//!    indicator recompute.
//! 2. Step loop: bar-by-bar replay through the backtest view.

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use marketlab_core::data::{Database, MemoryDatabase};
use marketlab_core::domain::{Bar, Granularity};
use marketlab_core::feed::{Feed, Instrument, InstrumentKind};
use marketlab_core::indicators::{Bollinger, Ema, Sma};
use marketlab_core::view::{BacktestView, DataView, ReplayClock, StepOutcome};
use std::sync::Arc;

fn make_bars(n: usize) -> Vec<Bar> {
    let base = Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.1).sin() * 10.0;
            let open = close - 0.3;
            Bar::plain(
                base + Duration::minutes(i as i64),
                open,
                close + 1.5,
                close - 1.5,
                close,
                1_000_000.0,
            )
        })
        .collect()
}

fn database(n: usize) -> Arc<MemoryDatabase> {
    let mut db = MemoryDatabase::new();
    db.insert("BENCH", Granularity::minutes(1), make_bars(n));
    Arc::new(db)
}

fn instrument(db: Arc<MemoryDatabase>) -> Instrument {
    let mut inst = Instrument::new(
        "BENCH",
        InstrumentKind::Fx,
        &[Granularity::minutes(1), Granularity::minutes(5)],
        db as Arc<dyn Database>,
    )
    .unwrap();
    inst.add_indicator("m1", Box::new(Sma::new(20))).unwrap();
    inst.add_indicator("m1", Box::new(Ema::new(20))).unwrap();
    inst.add_indicator("m1", Box::new(Bollinger::upper(20, 2.0)))
        .unwrap();
    inst
}

fn bench_batch_ingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_ingest");
    for n in [1_000usize, 10_000] {
        let db = database(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let mut inst = instrument(Arc::clone(&db));
                inst.update(None).unwrap();
                black_box(inst.finest().len())
            });
        });
    }
    group.finish();
}

fn bench_step_loop(c: &mut Criterion) {
    let n = 2_000usize;
    let db = database(n);
    c.bench_function("step_loop_2000", |b| {
        b.iter(|| {
            let clock = Arc::new(
                ReplayClock::from_database(
                    db.as_ref(),
                    &[("BENCH".to_string(), Granularity::minutes(1))],
                )
                .unwrap(),
            );
            let mut view = DataView::new();
            view.add_feed(Feed::Instrument(instrument(Arc::clone(&db))))
                .unwrap();
            let mut view = BacktestView::new(view, clock);
            let mut steps = 0usize;
            while let StepOutcome::Advanced { .. } = view.step().unwrap() {
                steps += 1;
            }
            black_box(steps)
        });
    });
}

criterion_group!(benches, bench_batch_ingest, bench_step_loop);
criterion_main!(benches);

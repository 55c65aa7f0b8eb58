//! Property tests for the data-stack invariants.
//!
//! 1. Incremental indicator extension equals batch recomputation.
//! 2. Out-of-order source data is rejected without mutating state.
//! 3. The replay clock is monotonic and bounded.

use chrono::{Duration, TimeZone, Utc};
use marketlab_core::data::{Database, MemoryDatabase, QuerySpan};
use marketlab_core::domain::{Bar, Granularity};
use marketlab_core::feed::{FeedError, Instrument, InstrumentKind};
use marketlab_core::indicators::Sma;
use marketlab_core::view::ReplayClock;
use proptest::prelude::*;
use std::sync::Arc;

fn fine() -> Granularity {
    Granularity::minutes(1)
}

fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
    let base = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar::plain(
                base + Duration::minutes(i as i64),
                open,
                open.max(close) + 0.5,
                open.min(close) - 0.5,
                close,
                1_000.0,
            )
        })
        .collect()
}

fn arb_closes() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(10.0..200.0_f64, 5..60)
}

proptest! {
    /// SMA over any close path: delivering bars one by one produces the
    /// exact series a single batch load produces.
    #[test]
    fn incremental_equals_batch(closes in arb_closes(), period in 1usize..10) {
        let bars = bars_from_closes(&closes);
        let timestamps: Vec<_> = bars.iter().map(|b| b.timestamp).collect();
        let mut db = MemoryDatabase::new();
        db.insert("EURUSD", fine(), bars);
        let db = Arc::new(db);

        let mut batch = Instrument::new(
            "EURUSD", InstrumentKind::Fx, &[fine()], Arc::clone(&db) as Arc<dyn Database>,
        ).unwrap();
        batch.add_indicator("m1", Box::new(Sma::new(period))).unwrap();
        batch.update(None).unwrap();

        let mut incremental = Instrument::new(
            "EURUSD", InstrumentKind::Fx, &[fine()], Arc::clone(&db) as Arc<dyn Database>,
        ).unwrap();
        incremental.add_indicator("m1", Box::new(Sma::new(period))).unwrap();
        for &ts in &timestamps {
            incremental.update(Some(ts)).unwrap();
        }

        let name = format!("sma_{period}");
        let b = batch.finest().indicator_series(&name).unwrap();
        let i = incremental.finest().indicator_series(&name).unwrap();
        prop_assert_eq!(b.len(), i.len());
        for (bv, iv) in b.iter().zip(i) {
            prop_assert!(
                (bv.is_nan() && iv.is_nan()) || bv.to_bits() == iv.to_bits(),
                "batch={} incremental={}", bv, iv
            );
        }
    }

    /// A source that replays an already-seen timestamp is rejected and the
    /// timeframe keeps exactly the data it had.
    #[test]
    fn stale_bars_are_rejected_without_mutation(
        closes in arb_closes(),
        dup_at in 0usize..50,
    ) {
        let mut bars = bars_from_closes(&closes);
        let dup = bars[dup_at % bars.len()].clone();
        bars.push(dup); // duplicate timestamp at the tail

        let mut db = MemoryDatabase::new();
        db.insert("EURUSD", fine(), bars);

        let mut instrument = Instrument::new(
            "EURUSD", InstrumentKind::Fx, &[fine()], Arc::new(db) as Arc<dyn Database>,
        ).unwrap();

        let err = instrument.update(None).unwrap_err();
        prop_assert!(matches!(err, FeedError::Series(_)));
        // The rejected batch must not be partially ingested.
        prop_assert_eq!(instrument.finest().len(), 0);
    }

    /// The clock can never step past its timeline, and every step moves
    /// time strictly forward.
    #[test]
    fn clock_is_monotonic_and_bounded(n in 1usize..50, extra in 0usize..5) {
        let bars = bars_from_closes(&vec![100.0; 50]);
        let timeline: Vec<_> = bars.iter().take(n).map(|b| b.timestamp).collect();
        let clock = ReplayClock::new(timeline);

        let mut last = None;
        for _ in 0..(n + extra) {
            match clock.advance() {
                Some(t) => {
                    if let Some(prev) = last {
                        prop_assert!(t > prev);
                    }
                    last = Some(t);
                }
                None => prop_assert!(clock.is_exhausted()),
            }
        }
        prop_assert_eq!(clock.position(), n);
    }
}

#[test]
fn memory_database_preserves_span_semantics() {
    let bars = bars_from_closes(&[1.0, 2.0, 3.0]);
    let ts0 = bars[0].timestamp;
    let mut db = MemoryDatabase::new();
    db.insert("EURUSD", fine(), bars);

    // after-bound is exclusive, until-bound inclusive
    let got = db
        .query("EURUSD", fine(), &QuerySpan::between(Some(ts0), None))
        .unwrap();
    assert_eq!(got.len(), 2);
    assert!(got.iter().all(|b| b.timestamp > ts0));
}

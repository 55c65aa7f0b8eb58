//! Backtesting view — replay driven by a shared historical cursor.
//!
//! The replay clock walks the union timeline of every feed's finest bars,
//! one timestamp per step. The backtest view updates its feeds with the
//! clock time as horizon, so no feed can ingest data the cursor has not
//! reached; the simulated market holds the same clock, so the data an
//! agent sees and the fills it receives come from one cursor.

use super::{DataView, ViewError};
use crate::data::{Database, DatabaseError, QuerySpan};
use crate::domain::Granularity;
use crate::feed::{Feed, UpdateReport};
use crate::timeframe::Timeframe;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Monotonic cursor over a fixed timeline. Shared between the backtest
/// view and the simulated market; advancing is the only mutation.
#[derive(Debug)]
pub struct ReplayClock {
    timeline: Vec<DateTime<Utc>>,
    cursor: AtomicUsize,
}

impl ReplayClock {
    /// Build a clock over the given timestamps (sorted and deduplicated).
    pub fn new(mut timeline: Vec<DateTime<Utc>>) -> Self {
        timeline.sort_unstable();
        timeline.dedup();
        Self { timeline, cursor: AtomicUsize::new(0) }
    }

    /// Union timeline of the finest-granularity series of the given
    /// (symbol, granularity) pairs.
    pub fn from_database(
        source: &dyn Database,
        series: &[(String, Granularity)],
    ) -> Result<Self, DatabaseError> {
        let mut timestamps = BTreeSet::new();
        for (symbol, granularity) in series {
            for bar in source.query(symbol, *granularity, &QuerySpan::all())? {
                timestamps.insert(bar.timestamp);
            }
        }
        Ok(Self {
            timeline: timestamps.into_iter().collect(),
            cursor: AtomicUsize::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.timeline.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timeline.is_empty()
    }

    /// Steps taken so far.
    pub fn position(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }

    /// Timestamp the cursor currently stands on (None before the first
    /// step).
    pub fn current(&self) -> Option<DateTime<Utc>> {
        match self.position() {
            0 => None,
            p => Some(self.timeline[p - 1]),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.position() >= self.timeline.len()
    }

    /// Advance one step; None once the timeline is exhausted.
    pub fn advance(&self) -> Option<DateTime<Utc>> {
        let previous = self
            .cursor
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |cursor| {
                (cursor < self.timeline.len()).then_some(cursor + 1)
            })
            .ok()?;
        Some(self.timeline[previous])
    }
}

/// Outcome of one backtest step.
#[derive(Debug)]
pub enum StepOutcome {
    Advanced {
        time: DateTime<Utc>,
        reports: Vec<UpdateReport>,
    },
    /// The timeline is exhausted; nothing changed.
    Exhausted,
}

/// The backtesting variant of the data view: updates are driven by the
/// replay clock instead of polling external sources.
pub struct BacktestView {
    view: DataView,
    clock: Arc<ReplayClock>,
}

impl BacktestView {
    pub fn new(view: DataView, clock: Arc<ReplayClock>) -> Self {
        Self { view, clock }
    }

    pub fn clock(&self) -> &Arc<ReplayClock> {
        &self.clock
    }

    pub fn feed_names(&self) -> Vec<&str> {
        self.view.feed_names()
    }

    pub fn feed(&self, name: &str) -> Result<&Feed, ViewError> {
        self.view.feed(name)
    }

    /// Convenience: a feed's timeframe in one lookup.
    pub fn timeframe(&self, feed: &str, timeframe: &str) -> Result<&Timeframe, ViewError> {
        match self.view.feed(feed)? {
            Feed::Instrument(instrument) => Ok(instrument.timeframe(timeframe)?),
        }
    }

    /// Advance the shared cursor by exactly one fine bar and give every
    /// feed its update opportunity, bounded by the new cursor time.
    pub fn step(&mut self) -> Result<StepOutcome, ViewError> {
        let Some(time) = self.clock.advance() else {
            return Ok(StepOutcome::Exhausted);
        };
        let reports = self.view.update(Some(time))?;
        Ok(StepOutcome::Advanced { time, reports })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MemoryDatabase;
    use crate::feed::{Instrument, InstrumentKind};
    use crate::indicators::make_bars;
    use chrono::{Duration, TimeZone};

    fn two_symbol_setup() -> (Arc<MemoryDatabase>, BacktestView) {
        let mut db = MemoryDatabase::new();
        db.insert("EURUSD", Granularity::minutes(1), make_bars(&[1.0, 2.0, 3.0]));
        // GBPUSD misses the second minute.
        let mut gbp = make_bars(&[10.0, 20.0, 30.0]);
        gbp.remove(1);
        db.insert("GBPUSD", Granularity::minutes(1), gbp);
        let db = Arc::new(db);

        let mut view = DataView::new();
        for symbol in ["EURUSD", "GBPUSD"] {
            view.add_feed(Feed::Instrument(
                Instrument::new(
                    symbol,
                    InstrumentKind::Fx,
                    &[Granularity::minutes(1)],
                    Arc::clone(&db) as Arc<dyn Database>,
                )
                .unwrap(),
            ))
            .unwrap();
        }

        let clock = Arc::new(
            ReplayClock::from_database(
                db.as_ref(),
                &[
                    ("EURUSD".to_string(), Granularity::minutes(1)),
                    ("GBPUSD".to_string(), Granularity::minutes(1)),
                ],
            )
            .unwrap(),
        );
        (db, BacktestView::new(view, clock))
    }

    #[test]
    fn clock_advances_monotonically_and_exhausts() {
        let base = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let clock = ReplayClock::new(vec![base, base + Duration::minutes(1)]);
        assert_eq!(clock.position(), 0);
        assert_eq!(clock.current(), None);

        assert_eq!(clock.advance(), Some(base));
        assert_eq!(clock.current(), Some(base));
        assert_eq!(clock.advance(), Some(base + Duration::minutes(1)));
        assert_eq!(clock.advance(), None);
        assert!(clock.is_exhausted());
        assert_eq!(clock.current(), Some(base + Duration::minutes(1)));
    }

    #[test]
    fn timeline_is_union_of_feeds() {
        let (_, view) = two_symbol_setup();
        // EURUSD has minutes 0,1,2; GBPUSD has 0,2 — the union is 3 steps.
        assert_eq!(view.clock().len(), 3);
    }

    #[test]
    fn step_delivers_one_fine_bar_per_feed_at_most() {
        let (_, mut view) = two_symbol_setup();

        match view.step().unwrap() {
            StepOutcome::Advanced { reports, .. } => {
                assert!(reports.iter().all(|r| r.ingested == 1));
            }
            StepOutcome::Exhausted => panic!("timeline not exhausted"),
        }

        // Minute 1: GBPUSD has no bar there.
        match view.step().unwrap() {
            StepOutcome::Advanced { reports, .. } => {
                let eur = reports.iter().find(|r| r.feed == "EURUSD").unwrap();
                let gbp = reports.iter().find(|r| r.feed == "GBPUSD").unwrap();
                assert_eq!(eur.ingested, 1);
                assert_eq!(gbp.ingested, 0);
            }
            StepOutcome::Exhausted => panic!("timeline not exhausted"),
        }
    }

    #[test]
    fn feeds_never_see_past_the_cursor() {
        let (_, mut view) = two_symbol_setup();
        view.step().unwrap();

        let clock_time = view.clock().current().unwrap();
        for name in ["EURUSD", "GBPUSD"] {
            let latest = view
                .feed(name)
                .unwrap()
                .instrument()
                .finest()
                .latest_timestamp()
                .unwrap();
            assert!(latest <= clock_time);
        }
    }

    #[test]
    fn stepping_past_the_end_is_exhausted_not_an_error() {
        let (_, mut view) = two_symbol_setup();
        for _ in 0..3 {
            assert!(matches!(view.step().unwrap(), StepOutcome::Advanced { .. }));
        }
        assert!(matches!(view.step().unwrap(), StepOutcome::Exhausted));
    }
}

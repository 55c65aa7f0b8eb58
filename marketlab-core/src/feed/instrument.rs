//! Instrument — the concrete data feed for one tradable symbol.
//!
//! An instrument owns one timeframe per granularity, all for the same
//! symbol. Only the finest timeframe is fed from the injected database;
//! coarser timeframes are derived from it by bucket aggregation, so the
//! finest timeframe governs freshness by construction.

use super::aggregate::BarBucket;
use super::{DataFeed, FeedError, RetryPolicy, UpdateReport};
use crate::data::{Database, QuerySpan};
use crate::domain::{Bar, Granularity};
use crate::indicators::IndicatorSpec;
use crate::timeframe::Timeframe;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Instrument kind tag. Only foreign exchange is fully specified; the
/// other kinds are constructible stubs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstrumentKind {
    Fx,
    Future,
    Stock,
}

impl InstrumentKind {
    pub fn data_type(&self) -> &'static str {
        match self {
            InstrumentKind::Fx => "fx_instrument",
            InstrumentKind::Future => "future_instrument",
            InstrumentKind::Stock => "stock_instrument",
        }
    }
}

/// Data feed for one symbol across one or more timeframes.
pub struct Instrument {
    symbol: String,
    kind: InstrumentKind,
    source: Arc<dyn Database>,
    retry: RetryPolicy,
    /// Ascending by granularity; index 0 is the finest.
    timeframes: Vec<Timeframe>,
    /// Open coarse buckets, parallel to `timeframes` (index 0 unused).
    buckets: Vec<Option<BarBucket>>,
    /// Timestamp of the newest fine bar pulled so far.
    last_seen: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrument")
            .field("symbol", &self.symbol)
            .field("kind", &self.kind)
            .field("retry", &self.retry)
            .field("last_seen", &self.last_seen)
            .finish_non_exhaustive()
    }
}

impl Instrument {
    pub fn new(
        symbol: impl Into<String>,
        kind: InstrumentKind,
        granularities: &[Granularity],
        source: Arc<dyn Database>,
    ) -> Result<Self, FeedError> {
        if granularities.is_empty() {
            return Err(FeedError::NoTimeframes);
        }
        let symbol = symbol.into();
        let mut sorted = granularities.to_vec();
        sorted.sort();
        for pair in sorted.windows(2) {
            if pair[0] == pair[1] {
                return Err(FeedError::DuplicateTimeframe { name: pair[0].to_string() });
            }
        }
        let timeframes = sorted
            .iter()
            .map(|&g| Timeframe::new(symbol.clone(), g))
            .collect::<Vec<_>>();
        let buckets = vec![None; timeframes.len()];
        Ok(Self {
            symbol,
            kind,
            source,
            retry: RetryPolicy::none(),
            timeframes,
            buckets,
            last_seen: None,
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn name(&self) -> &str {
        &self.symbol
    }

    pub fn kind(&self) -> InstrumentKind {
        self.kind
    }

    pub fn data_type(&self) -> &'static str {
        self.kind.data_type()
    }

    pub fn finest_granularity(&self) -> Granularity {
        self.timeframes[0].granularity()
    }

    /// Names of attached timeframes, finest first.
    pub fn timeframe_names(&self) -> Vec<String> {
        self.timeframes.iter().map(|tf| tf.name()).collect()
    }

    pub fn timeframe(&self, name: &str) -> Result<&Timeframe, FeedError> {
        self.timeframes
            .iter()
            .find(|tf| tf.name() == name)
            .ok_or_else(|| FeedError::UnknownTimeframe { name: name.to_string() })
    }

    /// The finest timeframe, which every instrument has.
    pub fn finest(&self) -> &Timeframe {
        &self.timeframes[0]
    }

    /// Attach an indicator to one timeframe.
    pub fn add_indicator(
        &mut self,
        timeframe: &str,
        spec: Box<dyn IndicatorSpec>,
    ) -> Result<(), FeedError> {
        let tf = self
            .timeframes
            .iter_mut()
            .find(|tf| tf.name() == timeframe)
            .ok_or_else(|| FeedError::UnknownTimeframe { name: timeframe.to_string() })?;
        tf.add_indicator(spec)?;
        Ok(())
    }

    /// Pull fresh fine bars (never beyond `horizon`), append them, and roll
    /// completed coarse buckets into the coarser timeframes.
    ///
    /// Source failures are retried per the feed's policy; once exhausted,
    /// previously ingested data stays intact (last-known-good).
    pub fn update(&mut self, horizon: Option<DateTime<Utc>>) -> Result<UpdateReport, FeedError> {
        let span = QuerySpan::between(self.last_seen, horizon);
        let symbol = self.symbol.clone();
        let granularity = self.finest_granularity();
        let source = Arc::clone(&self.source);
        let new_bars = self
            .retry
            .run(|| source.query(&symbol, granularity, &span))?;

        let mut per_timeframe = BTreeMap::new();
        if new_bars.is_empty() {
            return Ok(UpdateReport { feed: symbol, ingested: 0, per_timeframe });
        }

        let fine_count = self.timeframes[0].push_bars(&new_bars)?;
        per_timeframe.insert(self.timeframes[0].name(), fine_count);
        self.last_seen = self.timeframes[0].latest_timestamp();

        for k in 1..self.timeframes.len() {
            let flushed = self.roll_bucket(k, &new_bars)?;
            per_timeframe.insert(self.timeframes[k].name(), flushed);
        }

        self.check_alignment()?;
        Ok(UpdateReport { feed: symbol, ingested: fine_count, per_timeframe })
    }

    /// Feed fine bars through timeframe k's bucket; flush each bucket the
    /// moment a bar from a later bucket arrives.
    fn roll_bucket(&mut self, k: usize, fine_bars: &[Bar]) -> Result<usize, FeedError> {
        let granularity = self.timeframes[k].granularity();
        let mut completed = Vec::new();
        for bar in fine_bars {
            let start = granularity.bucket_start(bar.timestamp);
            match self.buckets[k].take() {
                None => self.buckets[k] = Some(BarBucket::open_at(start, bar)),
                Some(mut bucket) if bucket.start == start => {
                    bucket.absorb(bar);
                    self.buckets[k] = Some(bucket);
                }
                Some(bucket) => {
                    completed.push(bucket.into_bar());
                    self.buckets[k] = Some(BarBucket::open_at(start, bar));
                }
            }
        }
        if completed.is_empty() {
            return Ok(0);
        }
        Ok(self.timeframes[k].push_bars(&completed)?)
    }

    /// No coarser timeframe may hold a bar newer than the finest one.
    fn check_alignment(&self) -> Result<(), FeedError> {
        let fine_latest = self.timeframes[0].latest_timestamp();
        for tf in &self.timeframes[1..] {
            if tf.latest_timestamp() > fine_latest {
                return Err(FeedError::TimeSkew {
                    coarse: tf.name(),
                    fine: self.timeframes[0].name(),
                });
            }
        }
        Ok(())
    }
}

impl DataFeed for Instrument {
    fn name(&self) -> &str {
        self.name()
    }

    fn data_type(&self) -> &'static str {
        self.data_type()
    }

    fn update(&mut self, horizon: Option<DateTime<Utc>>) -> Result<UpdateReport, FeedError> {
        self.update(horizon)
    }
}

//! Data feeds — updatable sources of market data registered in a view.
//!
//! `DataFeed` is the single-operation capability a view drives; the
//! concrete feed set is closed (`Feed`), so dispatch is a match over a
//! tagged variant set rather than open-ended dynamic lookup.

pub mod aggregate;
pub mod instrument;

pub use instrument::{Instrument, InstrumentKind};

use crate::data::DatabaseError;
use crate::timeframe::{IndicatorError, SeriesError};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("unknown timeframe '{name}'")]
    UnknownTimeframe { name: String },

    #[error("timeframe '{name}' is already attached")]
    DuplicateTimeframe { name: String },

    #[error("a feed needs at least one timeframe")]
    NoTimeframes,

    #[error("timeframe {coarse} is ahead of the finest timeframe {fine}")]
    TimeSkew { coarse: String, fine: String },

    #[error(transparent)]
    Series(#[from] SeriesError),

    #[error(transparent)]
    Indicator(#[from] IndicatorError),

    #[error("source failed after {attempts} attempt(s): {source}")]
    Source { attempts: u32, source: DatabaseError },
}

/// What one update cycle ingested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    pub feed: String,
    /// Fine-granularity bars pulled from the source.
    pub ingested: usize,
    /// Bars appended per timeframe (coarse timeframes gain bars only when
    /// a bucket completes).
    pub per_timeframe: BTreeMap<String, usize>,
}

/// The capability a view drives: pull fresh data and append it to owned
/// series. `horizon` bounds how far in time the feed may read (the replay
/// cursor in backtesting; None in live polling).
pub trait DataFeed {
    fn name(&self) -> &str;

    fn data_type(&self) -> &'static str;

    fn update(&mut self, horizon: Option<DateTime<Utc>>) -> Result<UpdateReport, FeedError>;
}

/// Closed set of concrete feeds.
pub enum Feed {
    Instrument(Instrument),
}

impl Feed {
    pub fn instrument(&self) -> &Instrument {
        match self {
            Feed::Instrument(instrument) => instrument,
        }
    }
}

impl DataFeed for Feed {
    fn name(&self) -> &str {
        match self {
            Feed::Instrument(instrument) => instrument.name(),
        }
    }

    fn data_type(&self) -> &'static str {
        match self {
            Feed::Instrument(instrument) => instrument.data_type(),
        }
    }

    fn update(&mut self, horizon: Option<DateTime<Utc>>) -> Result<UpdateReport, FeedError> {
        match self {
            Feed::Instrument(instrument) => instrument.update(horizon),
        }
    }
}

/// Bounded retry with doubling backoff, applied at the feed level only —
/// series and indicator logic never retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        assert!(max_attempts >= 1, "at least one attempt is required");
        Self { max_attempts, base_delay }
    }

    /// No retries, no delay. The default for backtesting, where the source
    /// is in-memory.
    pub fn none() -> Self {
        Self { max_attempts: 1, base_delay: Duration::ZERO }
    }

    pub(crate) fn run<T>(
        &self,
        mut op: impl FnMut() -> Result<T, DatabaseError>,
    ) -> Result<T, FeedError> {
        let mut delay = self.base_delay;
        for attempt in 1..=self.max_attempts {
            match op() {
                Ok(value) => return Ok(value),
                Err(source) if attempt == self.max_attempts => {
                    return Err(FeedError::Source { attempts: attempt, source });
                }
                Err(_) => {
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                    delay *= 2;
                }
            }
        }
        unreachable!("loop returns on the last attempt")
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(50))
    }
}

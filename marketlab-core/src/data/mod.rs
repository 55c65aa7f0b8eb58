//! Database trait and in-memory implementations.
//!
//! The `Database` trait abstracts over historical bar storage so the
//! backtesting view, the simulated market, and tests can share one source
//! and swap in fakes. Durability is the database's own concern; the core
//! holds no persistent state.

pub mod client;

pub use client::{Client, ClientError, ClientFeedSource, PacketError, ResponsePacket, SimClient};

use crate::domain::{Bar, Granularity};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("no series stored for {symbol} {granularity}")]
    UnknownSeries { symbol: String, granularity: Granularity },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
}

/// Half-open time window `(after, until]` for a query. `None` bounds are
/// unbounded on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QuerySpan {
    pub after: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl QuerySpan {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn until(until: DateTime<Utc>) -> Self {
        Self { after: None, until: Some(until) }
    }

    pub fn between(after: Option<DateTime<Utc>>, until: Option<DateTime<Utc>>) -> Self {
        Self { after, until }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        if let Some(after) = self.after {
            if ts <= after {
                return false;
            }
        }
        if let Some(until) = self.until {
            if ts > until {
                return false;
            }
        }
        true
    }
}

/// Historical bar storage, keyed by (symbol, granularity).
///
/// `query` returns bars in ascending timestamp order, restricted to the
/// span. `append` exists for the mining pipeline, which is outside this
/// core; implementations may refuse it.
pub trait Database: Send + Sync {
    fn query(
        &self,
        symbol: &str,
        granularity: Granularity,
        span: &QuerySpan,
    ) -> Result<Vec<Bar>, DatabaseError>;

    fn append(
        &self,
        _symbol: &str,
        _granularity: Granularity,
        _bars: &[Bar],
    ) -> Result<(), DatabaseError> {
        Err(DatabaseError::Unsupported("append"))
    }
}

/// In-memory database backing backtests and tests.
///
/// Series are installed at build time via `insert`; bars are stored in the
/// order given, so a misbehaving source can be simulated by inserting
/// out-of-order data.
#[derive(Default)]
pub struct MemoryDatabase {
    series: HashMap<(String, Granularity), Vec<Bar>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: impl Into<String>, granularity: Granularity, bars: Vec<Bar>) {
        self.series.insert((symbol.into(), granularity), bars);
    }

    pub fn symbols(&self) -> Vec<&str> {
        let mut symbols: Vec<&str> = self.series.keys().map(|(s, _)| s.as_str()).collect();
        symbols.sort_unstable();
        symbols.dedup();
        symbols
    }

    /// A copy of this database restricted to a time window, used for
    /// train/validation splits.
    pub fn restricted(&self, span: &QuerySpan) -> MemoryDatabase {
        let series = self
            .series
            .iter()
            .map(|(key, bars)| {
                let kept = bars
                    .iter()
                    .filter(|b| span.contains(b.timestamp))
                    .cloned()
                    .collect();
                (key.clone(), kept)
            })
            .collect();
        MemoryDatabase { series }
    }
}

impl Database for MemoryDatabase {
    fn query(
        &self,
        symbol: &str,
        granularity: Granularity,
        span: &QuerySpan,
    ) -> Result<Vec<Bar>, DatabaseError> {
        let bars = self
            .series
            .get(&(symbol.to_string(), granularity))
            .ok_or_else(|| DatabaseError::UnknownSeries {
                symbol: symbol.to_string(),
                granularity,
            })?;
        Ok(bars
            .iter()
            .filter(|b| span.contains(b.timestamp))
            .cloned()
            .collect())
    }
}

/// Database test double that fails the first `failures` queries with a
/// retryable error, then delegates to the inner database. Exercises the
/// feed-level retry and partial-update paths.
pub struct FlakyDatabase {
    inner: MemoryDatabase,
    remaining_failures: AtomicU32,
}

impl FlakyDatabase {
    pub fn new(inner: MemoryDatabase, failures: u32) -> Self {
        Self { inner, remaining_failures: AtomicU32::new(failures) }
    }
}

impl Database for FlakyDatabase {
    fn query(
        &self,
        symbol: &str,
        granularity: Granularity,
        span: &QuerySpan,
    ) -> Result<Vec<Bar>, DatabaseError> {
        let remaining = self.remaining_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.remaining_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(DatabaseError::Unavailable("simulated outage".into()));
        }
        self.inner.query(symbol, granularity, span)
    }
}

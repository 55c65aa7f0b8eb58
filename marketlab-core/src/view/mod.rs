//! DataView — the agent-facing registry of data feeds.
//!
//! Feeds are registered under unique names during setup and updated in
//! registration order. An update cycle is total: every feed gets its
//! opportunity even when earlier feeds fail, and failures are reported
//! together without discarding the data the successful feeds ingested.

pub mod backtest;

pub use backtest::{BacktestView, ReplayClock, StepOutcome};

use crate::feed::{DataFeed, Feed, FeedError, UpdateReport};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

/// One feed's failure within an update cycle.
#[derive(Debug)]
pub struct FeedFailure {
    pub feed: String,
    pub error: FeedError,
}

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("a feed named '{name}' is already registered")]
    DuplicateFeed { name: String },

    #[error("unknown feed '{name}'")]
    UnknownFeed { name: String },

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error("update failed for {}", describe_failures(.failures))]
    PartialUpdate { failures: Vec<FeedFailure> },
}

fn describe_failures(failures: &[FeedFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.feed, f.error))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Named, insertion-ordered registry of data feeds.
#[derive(Default)]
pub struct DataView {
    feeds: Vec<Feed>,
    names: HashMap<String, usize>,
}

impl DataView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a feed under its own name. Setup-time only; the registry
    /// is never mutated during an update cycle.
    pub fn add_feed(&mut self, feed: Feed) -> Result<(), ViewError> {
        let name = feed.name().to_string();
        if self.names.contains_key(&name) {
            return Err(ViewError::DuplicateFeed { name });
        }
        self.names.insert(name, self.feeds.len());
        self.feeds.push(feed);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }

    /// Feed names in registration order.
    pub fn feed_names(&self) -> Vec<&str> {
        self.feeds.iter().map(|f| f.name()).collect()
    }

    pub fn feed(&self, name: &str) -> Result<&Feed, ViewError> {
        self.names
            .get(name)
            .map(|&idx| &self.feeds[idx])
            .ok_or_else(|| ViewError::UnknownFeed { name: name.to_string() })
    }

    /// Update every feed in registration order, bounded by `horizon`.
    ///
    /// Feeds that fail are collected into `PartialUpdate`; feeds that
    /// succeed keep their new data either way.
    pub fn update(
        &mut self,
        horizon: Option<DateTime<Utc>>,
    ) -> Result<Vec<UpdateReport>, ViewError> {
        let mut reports = Vec::with_capacity(self.feeds.len());
        let mut failures = Vec::new();
        for feed in &mut self.feeds {
            match feed.update(horizon) {
                Ok(report) => reports.push(report),
                Err(error) => failures.push(FeedFailure { feed: feed.name().to_string(), error }),
            }
        }
        if failures.is_empty() {
            Ok(reports)
        } else {
            Err(ViewError::PartialUpdate { failures })
        }
    }
}

//! Timeframe — the bar series for one (symbol, granularity) pair, plus the
//! indicators derived from it.
//!
//! The bar series is append-only and owned exclusively by the instrument
//! that created the timeframe; there is no external mutation path. Indexing
//! through the read API is reverse-chronological (index 0 = most recent
//! bar), mirroring how a strategy looks backward in time.
//!
//! Appending bars recomputes every attached indicator over exactly the
//! appended range, in dependency order.

use crate::domain::{Bar, Granularity};
use crate::indicators::{Field, IndicatorInput, IndicatorSpec, Source};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use thiserror::Error;

/// Field names an indicator may not shadow.
const RESERVED_NAMES: &[&str] = &["open", "high", "low", "close", "volume", "timestamp"];

#[derive(Debug, Error)]
pub enum SeriesError {
    #[error("stale bar for {symbol} {granularity}: {incoming} is not after {latest}")]
    StaleData {
        symbol: String,
        granularity: Granularity,
        incoming: DateTime<Utc>,
        latest: DateTime<Utc>,
    },

    #[error("index {index} out of range ({len} bars available)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("no indicator named '{name}'")]
    UnknownIndicator { name: String },
}

#[derive(Debug, Error)]
pub enum IndicatorError {
    #[error("indicator name '{0}' shadows a raw field")]
    ReservedName(String),

    #[error("an indicator named '{0}' is already attached")]
    Duplicate(String),

    #[error("indicator '{name}' depends on '{dependency}', which is not attached")]
    UnresolvedDependency { name: String, dependency: String },

    #[error("attaching '{0}' would create a dependency cycle")]
    CyclicDependency(String),
}

struct IndicatorSlot {
    spec: Box<dyn IndicatorSpec>,
    values: Vec<f64>,
}

/// Bar series and indicator registry for one (symbol, granularity) pair.
pub struct Timeframe {
    symbol: String,
    granularity: Granularity,
    bars: Vec<Bar>,
    slots: Vec<IndicatorSlot>,
    names: HashMap<String, usize>,
    /// Slot indices in recompute (topological) order.
    order: Vec<usize>,
}

impl Timeframe {
    pub fn new(symbol: impl Into<String>, granularity: Granularity) -> Self {
        Self {
            symbol: symbol.into(),
            granularity,
            bars: Vec::new(),
            slots: Vec::new(),
            names: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Registry name of this timeframe ("m1", "H4", ...).
    pub fn name(&self) -> String {
        self.granularity.to_string()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.bars.last().map(|b| b.timestamp)
    }

    /// Full bar series in chronological order.
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    /// The i-th most recent bar (index 0 = latest).
    pub fn bar(&self, index: usize) -> Result<&Bar, SeriesError> {
        let len = self.bars.len();
        if index >= len {
            return Err(SeriesError::IndexOutOfRange { index, len });
        }
        Ok(&self.bars[len - 1 - index])
    }

    /// A raw field of the i-th most recent bar.
    pub fn field(&self, field: Field, index: usize) -> Result<f64, SeriesError> {
        Ok(field.of(self.bar(index)?))
    }

    /// Names of attached indicators, in attach order.
    pub fn indicator_names(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.spec.name()).collect()
    }

    /// Full value series of an indicator, chronological order.
    pub fn indicator_series(&self, name: &str) -> Result<&[f64], SeriesError> {
        let &idx = self
            .names
            .get(name)
            .ok_or_else(|| SeriesError::UnknownIndicator { name: name.to_string() })?;
        Ok(&self.slots[idx].values)
    }

    /// Indicator value aligned with the i-th most recent bar.
    pub fn indicator_value(&self, name: &str, index: usize) -> Result<f64, SeriesError> {
        let series = self.indicator_series(name)?;
        let len = series.len();
        if index >= len {
            return Err(SeriesError::IndexOutOfRange { index, len });
        }
        Ok(series[len - 1 - index])
    }

    /// Value of a raw field or indicator at the i-th most recent bar.
    pub fn value(&self, source: &Source, index: usize) -> Result<f64, SeriesError> {
        match source {
            Source::Field(field) => self.field(*field, index),
            Source::Indicator(name) => self.indicator_value(name, index),
        }
    }

    /// Append bars and recompute indicators over the appended range.
    ///
    /// Every bar must be strictly newer than the current latest (and the
    /// batch itself strictly increasing); otherwise the whole call is
    /// rejected and the timeframe is left untouched.
    pub(crate) fn push_bars(&mut self, new: &[Bar]) -> Result<usize, SeriesError> {
        let mut latest = self.latest_timestamp();
        for bar in new {
            if let Some(bound) = latest {
                if bar.timestamp <= bound {
                    return Err(SeriesError::StaleData {
                        symbol: self.symbol.clone(),
                        granularity: self.granularity,
                        incoming: bar.timestamp,
                        latest: bound,
                    });
                }
            }
            latest = Some(bar.timestamp);
        }

        self.bars.extend_from_slice(new);
        for pos in 0..self.order.len() {
            let slot = self.order[pos];
            self.extend_slot(slot);
        }
        Ok(new.len())
    }

    /// Attach an indicator. Its upstream indicators must already be
    /// attached; the new indicator is immediately computed over the
    /// existing history.
    pub fn add_indicator(&mut self, spec: Box<dyn IndicatorSpec>) -> Result<(), IndicatorError> {
        let name = spec.name().to_string();
        if RESERVED_NAMES.contains(&name.as_str()) {
            return Err(IndicatorError::ReservedName(name));
        }
        if self.names.contains_key(&name) {
            return Err(IndicatorError::Duplicate(name));
        }
        for source in spec.inputs() {
            if let Source::Indicator(dependency) = source {
                if dependency == name {
                    return Err(IndicatorError::CyclicDependency(name));
                }
                if !self.names.contains_key(&dependency) {
                    return Err(IndicatorError::UnresolvedDependency { name, dependency });
                }
            }
        }

        let slot = self.slots.len();
        self.slots.push(IndicatorSlot { spec, values: Vec::new() });
        self.names.insert(name.clone(), slot);

        match self.topological_order() {
            Some(order) => self.order = order,
            None => {
                self.slots.pop();
                self.names.remove(&name);
                return Err(IndicatorError::CyclicDependency(name));
            }
        }

        self.extend_slot(slot);
        Ok(())
    }

    /// Extend one indicator slot to cover the full bar series.
    fn extend_slot(&mut self, slot: usize) {
        let mut values = std::mem::take(&mut self.slots[slot].values);
        {
            let spec = &self.slots[slot].spec;
            let mut upstream: HashMap<String, &[f64]> = HashMap::new();
            for source in spec.inputs() {
                if let Source::Indicator(name) = source {
                    if let Some(&dep) = self.names.get(&name) {
                        upstream.insert(name, self.slots[dep].values.as_slice());
                    }
                }
            }
            let input = IndicatorInput::new(&self.bars, upstream);
            spec.extend(&input, &mut values);
            debug_assert_eq!(values.len(), self.bars.len(), "indicator series misaligned");
        }
        self.slots[slot].values = values;
    }

    /// Kahn's algorithm over the indicator dependency graph. Returns None
    /// when the graph has a cycle. Ties resolve in attach order, keeping
    /// recomputation deterministic.
    fn topological_order(&self) -> Option<Vec<usize>> {
        let n = self.slots.len();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut indegree = vec![0usize; n];
        for (slot, entry) in self.slots.iter().enumerate() {
            for source in entry.spec.inputs() {
                if let Source::Indicator(name) = source {
                    if let Some(&dep) = self.names.get(&name) {
                        dependents[dep].push(slot);
                        indegree[slot] += 1;
                    }
                }
            }
        }

        let mut queue: VecDeque<usize> =
            (0..n).filter(|&slot| indegree[slot] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(slot) = queue.pop_front() {
            order.push(slot);
            for &next in &dependents[slot] {
                indegree[next] -= 1;
                if indegree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }
        (order.len() == n).then_some(order)
    }
}

//! Simulated market — resolves orders against the historical price path.
//!
//! The market shares the replay clock and historical source with the
//! backtest view, so fills can only use bars the cursor has revealed. An
//! order submitted while the cursor shows bar k is resolved with bars
//! strictly after k: market orders fill at the next bar's open, limit
//! orders at the limit price on the first bar whose range crosses it.
//!
//! State machine per order: Pending → Filled | Rejected | Cancelled, all
//! terminal. Cash and positions are derived purely from the fill ledger.

use crate::data::{Database, DatabaseError, QuerySpan};
use crate::domain::{
    Fill, Granularity, Order, OrderId, OrderKind, OrderSpec, OrderStatus, Receipt, RejectReason,
};
use crate::view::ReplayClock;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarketError {
    #[error("the market has been terminated; no further orders are accepted")]
    Terminated,

    #[error(transparent)]
    Source(#[from] DatabaseError),
}

/// Cumulative balance derived from the fill ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceSnapshot {
    pub step: usize,
    pub cash: f64,
    pub positions: BTreeMap<String, f64>,
}

struct OpenOrder {
    order: Order,
    /// Fills may only use bars strictly after this timestamp.
    checked_to: Option<DateTime<Utc>>,
}

/// Order-matching model over a historical price path.
pub struct SimMarket {
    source: Arc<dyn Database>,
    clock: Arc<ReplayClock>,
    /// Tradable symbols and the granularity of their price path.
    instruments: HashMap<String, Granularity>,
    initial_cash: f64,
    next_id: u64,
    open: Vec<OpenOrder>,
    receipts: Vec<Receipt>,
    fills: Vec<Fill>,
    terminated: bool,
}

impl SimMarket {
    pub fn new(source: Arc<dyn Database>, clock: Arc<ReplayClock>, initial_cash: f64) -> Self {
        Self {
            source,
            clock,
            instruments: HashMap::new(),
            initial_cash,
            next_id: 1,
            open: Vec::new(),
            receipts: Vec::new(),
            fills: Vec::new(),
            terminated: false,
        }
    }

    /// Make a symbol tradable. Orders for unregistered symbols are
    /// rejected with `UnknownInstrument`.
    pub fn register_instrument(&mut self, symbol: impl Into<String>, granularity: Granularity) {
        self.instruments.insert(symbol.into(), granularity);
    }

    /// Submit an order. Validation is immediate: the returned receipt is
    /// either `Pending` (queued for resolution) or `Rejected`.
    pub fn submit(&mut self, spec: OrderSpec) -> Result<Receipt, MarketError> {
        if self.terminated {
            return Err(MarketError::Terminated);
        }
        let order = Order {
            id: OrderId(self.next_id),
            symbol: spec.symbol,
            side: spec.side,
            size: spec.size,
            kind: spec.kind,
            submitted_step: self.clock.position(),
            submitted_at: self.clock.current(),
        };
        self.next_id += 1;

        if !self.instruments.contains_key(&order.symbol) {
            return Ok(self.reject(order, RejectReason::UnknownInstrument));
        }
        if !(order.size > 0.0) {
            return Ok(self.reject(order, RejectReason::InvalidSize));
        }

        let receipt = Receipt {
            order: order.clone(),
            status: OrderStatus::Pending,
            fill_price: None,
            fill_time: None,
        };
        self.open.push(OpenOrder { order, checked_to: self.clock.current() });
        Ok(receipt)
    }

    fn reject(&mut self, order: Order, reason: RejectReason) -> Receipt {
        let receipt = Receipt {
            order,
            status: OrderStatus::Rejected { reason },
            fill_price: None,
            fill_time: None,
        };
        self.receipts.push(receipt.clone());
        receipt
    }

    /// Resolve pending orders against bars the cursor has newly revealed.
    /// Called once per step, after the clock advances. Returns the
    /// receipts resolved by this step.
    pub fn on_step(&mut self) -> Result<Vec<Receipt>, MarketError> {
        if self.terminated {
            return Ok(Vec::new());
        }
        let Some(now) = self.clock.current() else {
            return Ok(Vec::new());
        };

        let mut resolved = Vec::new();
        let mut still_open = Vec::new();
        for mut entry in std::mem::take(&mut self.open) {
            let granularity = self.instruments[&entry.order.symbol];
            let span = QuerySpan::between(entry.checked_to, Some(now));
            let bars = self.source.query(&entry.order.symbol, granularity, &span)?;

            let fill = match entry.order.kind {
                OrderKind::Market => bars.first().map(|bar| (bar.open, bar.timestamp)),
                OrderKind::Limit { limit_price } => bars
                    .iter()
                    .find(|bar| bar.low <= limit_price && limit_price <= bar.high)
                    .map(|bar| (limit_price, bar.timestamp)),
            };

            match fill {
                Some((price, time)) => {
                    resolved.push(self.fill(entry.order, price, time));
                }
                None => {
                    entry.checked_to = Some(now);
                    still_open.push(entry);
                }
            }
        }
        self.open = still_open;
        Ok(resolved)
    }

    fn fill(&mut self, order: Order, price: f64, time: DateTime<Utc>) -> Receipt {
        self.fills.push(Fill {
            order_id: order.id,
            symbol: order.symbol.clone(),
            side: order.side,
            size: order.size,
            price,
            time,
        });
        let receipt = Receipt {
            order,
            status: OrderStatus::Filled,
            fill_price: Some(price),
            fill_time: Some(time),
        };
        self.receipts.push(receipt.clone());
        receipt
    }

    /// End the simulation: every pending order resolves to `Cancelled` and
    /// no further fills are produced. Recorded fills are untouched.
    pub fn terminate(&mut self) -> Vec<Receipt> {
        self.terminated = true;
        let cancelled: Vec<Receipt> = std::mem::take(&mut self.open)
            .into_iter()
            .map(|entry| Receipt {
                order: entry.order,
                status: OrderStatus::Cancelled,
                fill_price: None,
                fill_time: None,
            })
            .collect();
        self.receipts.extend(cancelled.iter().cloned());
        cancelled
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn pending_orders(&self) -> usize {
        self.open.len()
    }

    /// Terminal receipts in resolution order.
    pub fn receipts(&self) -> &[Receipt] {
        &self.receipts
    }

    /// The fill ledger, the market's only execution state.
    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    /// Cash balance derived from the ledger.
    pub fn cash(&self) -> f64 {
        self.fills
            .iter()
            .fold(self.initial_cash, |cash, fill| cash + fill.cash_delta())
    }

    /// Net position for one symbol, derived from the ledger.
    pub fn position(&self, symbol: &str) -> f64 {
        self.fills
            .iter()
            .filter(|f| f.symbol == symbol)
            .map(Fill::signed_size)
            .sum()
    }

    /// All non-flat positions, derived from the ledger.
    pub fn positions(&self) -> BTreeMap<String, f64> {
        let mut positions: BTreeMap<String, f64> = BTreeMap::new();
        for fill in &self.fills {
            *positions.entry(fill.symbol.clone()).or_default() += fill.signed_size();
        }
        positions.retain(|_, size| *size != 0.0);
        positions
    }

    pub fn snapshot(&self) -> BalanceSnapshot {
        BalanceSnapshot {
            step: self.clock.position(),
            cash: self.cash(),
            positions: self.positions(),
        }
    }
}

//! Orders submitted to the simulated market and the receipts that resolve them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order ID, assigned by the market at submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

/// What kind of order and its price parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OrderKind {
    /// Fill at the open of the bar following submission.
    Market,
    /// Fill at the limit price the first time a later bar's range crosses it.
    Limit { limit_price: f64 },
}

/// An agent's order intent, before the market assigns identity and timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSpec {
    pub symbol: String,
    pub side: OrderSide,
    pub size: f64,
    pub kind: OrderKind,
}

impl OrderSpec {
    pub fn market(symbol: impl Into<String>, side: OrderSide, size: f64) -> Self {
        Self { symbol: symbol.into(), side, size, kind: OrderKind::Market }
    }

    pub fn limit(symbol: impl Into<String>, side: OrderSide, size: f64, limit_price: f64) -> Self {
        Self { symbol: symbol.into(), side, size, kind: OrderKind::Limit { limit_price } }
    }
}

/// A submitted order: the spec plus identity and submission timing.
///
/// `submitted_step` is the replay-clock position at submission;
/// `submitted_at` is the clock time (None when submitted before the
/// first step).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub symbol: String,
    pub side: OrderSide,
    pub size: f64,
    pub kind: OrderKind,
    pub submitted_step: usize,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Why an order was rejected at submission. Rejections are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    UnknownInstrument,
    InvalidSize,
}

/// Order lifecycle states. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Filled,
    Rejected { reason: RejectReason },
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

/// The market's answer to a submitted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub order: Order,
    pub status: OrderStatus,
    pub fill_price: Option<f64>,
    pub fill_time: Option<DateTime<Utc>>,
}

impl Receipt {
    pub fn is_filled(&self) -> bool {
        self.status == OrderStatus::Filled
    }
}

/// One executed fill, the unit of the market's ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: OrderId,
    pub symbol: String,
    pub side: OrderSide,
    pub size: f64,
    pub price: f64,
    pub time: DateTime<Utc>,
}

impl Fill {
    /// Signed position delta of this fill.
    pub fn signed_size(&self) -> f64 {
        match self.side {
            OrderSide::Buy => self.size,
            OrderSide::Sell => -self.size,
        }
    }

    /// Signed cash delta of this fill (buys spend, sells receive).
    pub fn cash_delta(&self) -> f64 {
        -self.signed_size() * self.price
    }
}

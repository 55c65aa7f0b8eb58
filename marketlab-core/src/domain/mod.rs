//! Domain types: bars, sampling granularities, orders, receipts, fills.

pub mod bar;
pub mod granularity;
pub mod order;

pub use bar::{Bar, BarExt, FxFields};
pub use granularity::{Granularity, GranularityError, GranularityUnit};
pub use order::{
    Fill, Order, OrderId, OrderKind, OrderSide, OrderSpec, OrderStatus, Receipt, RejectReason,
};

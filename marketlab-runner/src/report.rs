//! Run report — everything a finished session produced, exportable as CSV.

use marketlab_core::domain::{Fill, Order, OrderKind, OrderSide, OrderStatus, Receipt};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Complete record of one backtest run.
///
/// `fingerprint` hashes the receipt sequence; two runs over the same
/// config and data must produce equal fingerprints.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub steps: usize,
    /// Submission acknowledgements, in submission order.
    pub orders: Vec<Order>,
    /// Terminal receipts, in resolution order.
    pub receipts: Vec<Receipt>,
    pub fills: Vec<Fill>,
    /// Cash balance after each step.
    pub cash_curve: Vec<f64>,
    pub final_positions: BTreeMap<String, f64>,
    pub final_cash: f64,
    pub fingerprint: String,
}

fn side_label(side: OrderSide) -> &'static str {
    match side {
        OrderSide::Buy => "buy",
        OrderSide::Sell => "sell",
    }
}

fn kind_label(kind: OrderKind) -> String {
    match kind {
        OrderKind::Market => "market".to_string(),
        OrderKind::Limit { limit_price } => format!("limit@{limit_price}"),
    }
}

fn status_label(status: &OrderStatus) -> String {
    match status {
        OrderStatus::Pending => "pending".to_string(),
        OrderStatus::Filled => "filled".to_string(),
        OrderStatus::Cancelled => "cancelled".to_string(),
        OrderStatus::Rejected { reason } => format!("rejected:{reason:?}"),
    }
}

impl RunReport {
    /// Write the receipt table as CSV.
    pub fn write_receipts_csv<W: Write>(&self, writer: W) -> Result<(), ReportError> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record([
            "order_id",
            "symbol",
            "side",
            "size",
            "kind",
            "submitted_step",
            "status",
            "fill_price",
            "fill_time",
        ])?;
        for receipt in &self.receipts {
            let order = &receipt.order;
            csv.write_record([
                order.id.0.to_string(),
                order.symbol.clone(),
                side_label(order.side).to_string(),
                order.size.to_string(),
                kind_label(order.kind),
                order.submitted_step.to_string(),
                status_label(&receipt.status),
                receipt.fill_price.map(|p| p.to_string()).unwrap_or_default(),
                receipt
                    .fill_time
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default(),
            ])?;
        }
        csv.flush()?;
        Ok(())
    }

    /// Write the per-step cash curve as CSV.
    pub fn write_cash_curve_csv<W: Write>(&self, writer: W) -> Result<(), ReportError> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(["step", "cash"])?;
        for (step, cash) in self.cash_curve.iter().enumerate() {
            csv.write_record([step.to_string(), cash.to_string()])?;
        }
        csv.flush()?;
        Ok(())
    }
}

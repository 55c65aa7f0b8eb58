//! Client boundary — the trading-platform wrapper the core talks to.
//!
//! A `Client` answers market-data requests with `ResponsePacket`s and
//! forwards orders. Packets arrive unvalidated; `validate` is the only
//! path from a packet to bars, so a malformed packet can never reach a
//! timeframe. `SimClient` is the simulation-mode implementation, wired to
//! the simulated market and the shared replay clock.

use super::{Database, DatabaseError, QuerySpan};
use crate::domain::{Bar, Granularity, OrderSpec, Receipt};
use crate::market::{MarketError, SimMarket};
use crate::view::ReplayClock;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error(transparent)]
    Market(#[from] MarketError),
}

#[derive(Debug, Error)]
pub enum PacketError {
    #[error("row {index} has malformed OHLC data")]
    MalformedRow { index: usize },

    #[error("row {index} is not after the preceding row")]
    OutOfOrder { index: usize },
}

/// Unvalidated market-data response. Rows are bar-shaped but untrusted
/// until `validate` accepts them.
#[derive(Debug, Clone)]
pub struct ResponsePacket {
    pub symbol: String,
    pub granularity: Granularity,
    pub rows: Vec<Bar>,
}

impl ResponsePacket {
    /// Check every row and the row ordering. On success the rows become
    /// bars; on failure the whole packet is discarded.
    pub fn validate(self) -> Result<Vec<Bar>, PacketError> {
        let mut previous = None;
        for (index, row) in self.rows.iter().enumerate() {
            if !row.is_sane() {
                return Err(PacketError::MalformedRow { index });
            }
            if let Some(prev) = previous {
                if row.timestamp <= prev {
                    return Err(PacketError::OutOfOrder { index });
                }
            }
            previous = Some(row.timestamp);
        }
        Ok(self.rows)
    }
}

/// The platform wrapper: market-data requests plus order submission.
pub trait Client: Send + Sync {
    fn request(
        &self,
        symbol: &str,
        granularity: Granularity,
        span: &QuerySpan,
    ) -> Result<ResponsePacket, ClientError>;

    fn submit_order(&mut self, spec: OrderSpec) -> Result<Receipt, ClientError>;
}

/// Simulation-mode client: serves data from the shared historical source,
/// never past the replay clock, and forwards orders to the simulated
/// market.
pub struct SimClient {
    source: Arc<dyn Database>,
    clock: Arc<ReplayClock>,
    market: Arc<Mutex<SimMarket>>,
}

impl SimClient {
    pub fn new(
        source: Arc<dyn Database>,
        clock: Arc<ReplayClock>,
        market: Arc<Mutex<SimMarket>>,
    ) -> Self {
        Self { source, clock, market }
    }
}

impl Client for SimClient {
    fn request(
        &self,
        symbol: &str,
        granularity: Granularity,
        span: &QuerySpan,
    ) -> Result<ResponsePacket, ClientError> {
        let horizon = self.clock.current();
        let bounded = QuerySpan::between(
            span.after,
            match (span.until, horizon) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            },
        );
        // Before the first step nothing is visible yet.
        let rows = if horizon.is_none() {
            Vec::new()
        } else {
            self.source
                .query(symbol, granularity, &bounded)
                .map_err(|e| ClientError::Transport(e.to_string()))?
        };
        Ok(ResponsePacket { symbol: symbol.to_string(), granularity, rows })
    }

    fn submit_order(&mut self, spec: OrderSpec) -> Result<Receipt, ClientError> {
        let mut market = self.market.lock().unwrap();
        Ok(market.submit(spec)?)
    }
}

/// Adapter that lets an instrument feed pull through a `Client` as if it
/// were a database. Invalid packets surface as errors and never produce
/// bars.
pub struct ClientFeedSource {
    client: Box<dyn Client>,
}

impl ClientFeedSource {
    pub fn new(client: Box<dyn Client>) -> Self {
        Self { client }
    }
}

impl Database for ClientFeedSource {
    fn query(
        &self,
        symbol: &str,
        granularity: Granularity,
        span: &QuerySpan,
    ) -> Result<Vec<Bar>, DatabaseError> {
        let packet = self
            .client
            .request(symbol, granularity, span)
            .map_err(|e| DatabaseError::Unavailable(e.to_string()))?;
        packet
            .validate()
            .map_err(|e| DatabaseError::MalformedResponse(e.to_string()))
    }
}

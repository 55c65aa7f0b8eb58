//! Backtest session — wires the replay clock, view, market, client, and
//! agent together and drives the step loop.
//!
//! Per step: advance the cursor, give every feed its update, resolve
//! pending orders against the newly revealed bar, then give the agent its
//! single synchronous decision. At end of history the market terminates
//! and surviving pending orders cancel.

use crate::config::RunConfig;
use crate::report::RunReport;
use chrono::{DateTime, Utc};
use marketlab_core::agent::Agent;
use marketlab_core::data::{Client, ClientError, Database, DatabaseError, SimClient};
use marketlab_core::domain::Receipt;
use marketlab_core::feed::{Feed, FeedError, Instrument};
use marketlab_core::fingerprint::receipts_hash;
use marketlab_core::market::{MarketError, SimMarket};
use marketlab_core::view::{BacktestView, DataView, ReplayClock, StepOutcome, ViewError};
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("run configuration has no instruments")]
    EmptyUniverse,

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    View(#[from] ViewError),

    #[error(transparent)]
    Market(#[from] MarketError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Progress callback for a running session.
pub trait StepObserver {
    fn on_step(&self, _step: usize, _time: DateTime<Utc>, _resolved: &[Receipt]) {}

    fn on_finish(&self, _report: &RunReport) {}
}

/// Observer that reports nothing.
pub struct NullObserver;

impl StepObserver for NullObserver {}

/// Observer that prints step fills and the final summary to stdout.
pub struct StdoutObserver;

impl StepObserver for StdoutObserver {
    fn on_step(&self, step: usize, time: DateTime<Utc>, resolved: &[Receipt]) {
        for receipt in resolved {
            println!(
                "[{step}] {time} {} {:?} -> {:?}",
                receipt.order.symbol, receipt.order.side, receipt.status
            );
        }
    }

    fn on_finish(&self, report: &RunReport) {
        println!(
            "\nRun {} complete: {} steps, {} fills, final cash {:.2}",
            report.run_id,
            report.steps,
            report.fills.len(),
            report.cash_curve.last().copied().unwrap_or(f64::NAN)
        );
    }
}

/// A fully wired backtest: one shared source, one shared cursor.
pub struct Session {
    view: BacktestView,
    market: Arc<Mutex<SimMarket>>,
    client: SimClient,
    run_id: String,
    max_steps: Option<usize>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("run_id", &self.run_id)
            .field("max_steps", &self.max_steps)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Build a session from a config and a historical source. Every
    /// instrument registers both as a view feed and as a market tradable.
    pub fn new(config: &RunConfig, source: Arc<dyn Database>) -> Result<Self, SessionError> {
        if config.instruments.is_empty() {
            return Err(SessionError::EmptyUniverse);
        }

        let mut finest = Vec::new();
        let mut view = DataView::new();
        for entry in &config.instruments {
            let mut instrument = Instrument::new(
                entry.symbol.clone(),
                entry.kind,
                &entry.granularities,
                Arc::clone(&source),
            )?;
            for timeframe in instrument.timeframe_names() {
                for indicator in &config.indicators {
                    instrument.add_indicator(&timeframe, indicator.build())?;
                }
            }
            finest.push((entry.symbol.clone(), instrument.finest_granularity()));
            view.add_feed(Feed::Instrument(instrument))?;
        }

        let clock = Arc::new(ReplayClock::from_database(source.as_ref(), &finest)?);

        let mut market = SimMarket::new(Arc::clone(&source), Arc::clone(&clock), config.initial_cash);
        for (symbol, granularity) in &finest {
            market.register_instrument(symbol.clone(), *granularity);
        }
        let market = Arc::new(Mutex::new(market));

        let client = SimClient::new(Arc::clone(&source), Arc::clone(&clock), Arc::clone(&market));

        Ok(Self {
            view: BacktestView::new(view, clock),
            market,
            client,
            run_id: config.run_id(),
            max_steps: config.max_steps,
        })
    }

    /// Drive the step loop to the end of history (or the step cap), then
    /// terminate the market.
    pub fn run(
        &mut self,
        agent: &mut dyn Agent,
        observer: &dyn StepObserver,
    ) -> Result<RunReport, SessionError> {
        let mut orders = Vec::new();
        let mut cash_curve = Vec::new();
        let mut steps = 0usize;

        loop {
            if self.max_steps.is_some_and(|cap| steps >= cap) {
                break;
            }
            let time = match self.view.step()? {
                StepOutcome::Exhausted => break,
                StepOutcome::Advanced { time, .. } => time,
            };

            let resolved = self.market.lock().unwrap().on_step()?;

            if let Some(spec) = agent.on_step(&self.view) {
                let ack = self.client.submit_order(spec)?;
                orders.push(ack.order.clone());
            }

            cash_curve.push(self.market.lock().unwrap().cash());
            observer.on_step(steps, time, &resolved);
            steps += 1;
        }

        self.market.lock().unwrap().terminate();

        let market = self.market.lock().unwrap();
        let receipts = market.receipts().to_vec();
        let report = RunReport {
            run_id: self.run_id.clone(),
            steps,
            orders,
            fills: market.fills().to_vec(),
            final_positions: market.positions(),
            final_cash: market.cash(),
            cash_curve,
            fingerprint: receipts_hash(&receipts),
            receipts,
        };
        drop(market);

        observer.on_finish(&report);
        Ok(report)
    }
}

/// Composition-root convenience: parse a TOML config and run an agent
/// over the given source.
pub fn run_from_toml(
    config_text: &str,
    source: Arc<dyn Database>,
    agent: &mut dyn Agent,
) -> anyhow::Result<RunReport> {
    use anyhow::Context;

    let config = RunConfig::from_toml(config_text).context("invalid run configuration")?;
    let mut session = Session::new(&config, source).context("failed to build session")?;
    let report = session
        .run(agent, &NullObserver)
        .context("backtest run failed")?;
    Ok(report)
}

//! MarketLab Runner — backtest orchestration on top of `marketlab-core`.
//!
//! This crate is the composition root:
//! - TOML run configuration with deterministic run IDs
//! - The session loop wiring clock, view, market, client, and agent
//! - Train/validation splitting of a historical span
//! - Seeded synthetic data generation
//! - Run reports with CSV export

pub mod config;
pub mod report;
pub mod session;
pub mod split;
pub mod synthetic;

pub use config::{ConfigError, IndicatorConfig, InstrumentConfig, RunConfig};
pub use report::{ReportError, RunReport};
pub use session::{run_from_toml, NullObserver, Session, SessionError, StdoutObserver, StepObserver};
pub use split::{split_span, DataWindow, SplitError, SplitSpec};
pub use synthetic::{generate, generate_fx, SyntheticConfig};

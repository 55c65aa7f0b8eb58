//! Serializable run configuration.

use marketlab_core::domain::Granularity;
use marketlab_core::feed::InstrumentKind;
use marketlab_core::fingerprint::content_hash;
use marketlab_core::indicators::{Bollinger, Ema, IndicatorSpec, Sma, Source, WindowSlope};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Configuration for a single backtest run.
///
/// Two runs with identical configs share a `run_id`, which makes reports
/// content-addressable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    /// Starting cash balance of the simulated account.
    pub initial_cash: f64,

    /// Instruments to register as feeds and tradables.
    pub instruments: Vec<InstrumentConfig>,

    /// Indicators attached to every timeframe of every instrument, in
    /// order. An indicator that reads another (e.g. `SmaSlope`) must be
    /// listed after its upstream.
    #[serde(default)]
    pub indicators: Vec<IndicatorConfig>,

    /// Optional cap on replay steps (None = run to end of history).
    #[serde(default)]
    pub max_steps: Option<usize>,
}

impl RunConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Deterministic content hash of this configuration.
    pub fn run_id(&self) -> String {
        content_hash(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstrumentConfig {
    pub symbol: String,
    pub kind: InstrumentKind,
    /// Granularity names ("m1", "H1", ...); the finest drives the replay.
    pub granularities: Vec<Granularity>,
}

/// Serializable indicator selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndicatorConfig {
    Sma { period: usize },
    Ema { period: usize },
    BollingerUpper { period: usize, sigma: f64 },
    BollingerLower { period: usize, sigma: f64 },
    /// Least-squares slope of an SMA; the matching `Sma` entry must come
    /// earlier in the list.
    SmaSlope { period: usize, window: usize },
}

impl IndicatorConfig {
    pub fn build(&self) -> Box<dyn IndicatorSpec> {
        match *self {
            IndicatorConfig::Sma { period } => Box::new(Sma::new(period)),
            IndicatorConfig::Ema { period } => Box::new(Ema::new(period)),
            IndicatorConfig::BollingerUpper { period, sigma } => {
                Box::new(Bollinger::upper(period, sigma))
            }
            IndicatorConfig::BollingerLower { period, sigma } => {
                Box::new(Bollinger::lower(period, sigma))
            }
            IndicatorConfig::SmaSlope { period, window } => Box::new(WindowSlope::over(
                window,
                Source::indicator(format!("sma_{period}")),
            )),
        }
    }
}

//! Agent — the strategy consuming the core.
//!
//! An agent is invoked exactly once per cursor advance with a read-only
//! view and may answer with at most one order. All mutation flows through
//! the client it submits to, never through the view.

use crate::domain::OrderSpec;
use crate::view::BacktestView;

pub trait Agent {
    /// One synchronous decision opportunity per step.
    fn on_step(&mut self, view: &BacktestView) -> Option<OrderSpec>;
}

/// Agent that never trades. Useful for data-only replays and as a
/// baseline in tests.
pub struct NullAgent;

impl Agent for NullAgent {
    fn on_step(&mut self, _view: &BacktestView) -> Option<OrderSpec> {
        None
    }
}

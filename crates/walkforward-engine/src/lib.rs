//! Walk-forward backtesting engine.
//!
//! Evaluates a cross-sectional return-prediction model strictly out-of-sample
//! in time: for each month-end rebalance date it loads the eligible
//! cross-section, obtains predictions, resolves realized forward returns,
//! buckets the month into prediction quintiles, compiles monthly metrics, and
//! finally aggregates everything into a single run-level report.

pub mod aggregate;
pub mod calendar;
pub mod engine;
pub mod forward_return;
pub mod monthly;
pub mod quantile;
pub mod report;
pub mod universe;


pub use engine::{RunAccumulator, RunOutput, WalkForwardEngine};
pub use report::{render_report, RunSnapshot};

//! Test execution engine
//!
//! Provides sequential suite runs and concurrent repeated runs.

mod parallel;
mod prepare;
mod runner;
mod validate;

pub use parallel::{AggregateReport, ConcurrentRunner, TransportFactory};
pub use runner::{RunOptions, SuiteRunner};

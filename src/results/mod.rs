//! Run results persistence
//!
//! Stores a snapshot of the latest run and exports failure details.

#![allow(dead_code)]

mod snapshot;

pub use snapshot::RunSnapshot;

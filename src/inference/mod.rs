//! Case segmentation and actual-arrival inference.
//!
//! For one (vehicle, route-direction, stop) triple the pipeline runs
//! deduplicate -> segment -> assign -> resolve. The scheduled forecasts are
//! clustered into cases (one waiting episode each), telemetry forecasts are
//! attached to the nearest case, and a case whose telemetry got close enough
//! to the event receives one shared arrival time.
//!
//! [`driver::run_batch`] runs every triple of a table on a worker pool.

pub mod assign;
pub mod dedup;
pub mod driver;
pub mod resolve;
pub mod segment;

use crate::observation::Observation;

/// An observation tagged with the case it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseMember {
    pub observation: Observation,
    pub case: usize,
}

/// A case member with its forecast horizon computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseRow {
    pub observation: Observation,
    pub case: usize,
    pub horizon: i64,
}

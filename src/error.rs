//! Error types of the inference pipeline.
//!
//! Filtering outcomes (unresolved or ambiguous cases, unassignable telemetry,
//! the reserved vehicle id) are not errors and never show up here.

use crate::observation::TripleKey;

/// A failure confined to one (vehicle, route-direction, stop) triple.
/// The batch logs it and carries on.
#[derive(Debug, thiserror::Error)]
pub enum TripleError {
    #[error("stop {0} is missing from the stop directory")]
    UnknownStop(String),

    #[error("forecast horizon overflows (request_time={request_time}, forecast_time={forecast_time})")]
    HorizonOverflow {
        request_time: i64,
        forecast_time: i64,
    },
}

/// A triple that failed, with the reason.
#[derive(Debug)]
pub struct TripleFailure {
    pub key: TripleKey,
    pub error: TripleError,
}

/// Conditions that stop the whole run.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("input table is missing required column `{0}`")]
    MissingColumn(String),

    #[error("no arrival could be resolved across {triples} triples ({failures} failed)")]
    NoResolvedArrivals { triples: usize, failures: usize },

    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

//! Committing one actual arrival time per case.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::config::InferenceConfig;
use crate::inference::CaseRow;
use crate::observation::ArrivalRecord;

/// What happened to a single case.
#[derive(Debug, Clone, PartialEq)]
pub enum CaseOutcome {
    /// The case got an arrival time; these are its output rows.
    Resolved(Vec<ArrivalRecord>),
    /// Simultaneous requests returned contradicting forecasts.
    Ambiguous,
    /// No telemetry was assigned to the case.
    NoTelemetry,
    /// The closest telemetry forecast was made too early to be trusted.
    Untrusted { min_horizon: i64 },
}

/// A case is ambiguous when some `request_time` repeats and there are more
/// distinct forecasts than distinct requests.
pub fn is_ambiguous(rows: &[CaseRow]) -> bool {
    let requests: HashSet<i64> = rows.iter().map(|r| r.observation.request_time).collect();
    let forecasts: HashSet<i64> = rows.iter().map(|r| r.observation.forecast_time).collect();

    requests.len() != rows.len() && forecasts.len() > requests.len()
}

/// Resolves one case.
///
/// The anchor is the first telemetry row (in row order) with the smallest
/// horizon. If that horizon is below the trust threshold, its forecast
/// becomes the arrival time of the case. Rows whose horizon equals the
/// anchor's, the anchor included, are left out; every other row is emitted
/// with the shared arrival time.
pub fn resolve_case(case: usize, rows: &[CaseRow], config: &InferenceConfig) -> CaseOutcome {
    if is_ambiguous(rows) {
        return CaseOutcome::Ambiguous;
    }

    let Some(anchor) = rows
        .iter()
        .filter(|r| r.observation.is_telemetry())
        .min_by_key(|r| r.horizon)
    else {
        return CaseOutcome::NoTelemetry;
    };

    if anchor.horizon >= config.min_forecast_horizon_secs {
        return CaseOutcome::Untrusted {
            min_horizon: anchor.horizon,
        };
    }

    let arrival_time = anchor.observation.forecast_time;
    let records = rows
        .iter()
        .filter(|r| r.horizon != anchor.horizon)
        .map(|r| ArrivalRecord::new(&r.observation, case, arrival_time))
        .collect();

    CaseOutcome::Resolved(records)
}

/// Groups rows by case and resolves each, in case order. Unresolved and
/// ambiguous cases contribute nothing.
pub fn resolve_cases(rows: Vec<CaseRow>, config: &InferenceConfig) -> Vec<ArrivalRecord> {
    let mut by_case: BTreeMap<usize, Vec<CaseRow>> = BTreeMap::new();
    for row in rows {
        by_case.entry(row.case).or_default().push(row);
    }

    let mut records = Vec::new();
    for (case, case_rows) in by_case {
        match resolve_case(case, &case_rows, config) {
            CaseOutcome::Resolved(resolved) => {
                debug!(case, rows = resolved.len(), "Case resolved");
                records.extend(resolved);
            }
            CaseOutcome::Ambiguous => debug!(case, "Case skipped: colliding forecasts"),
            CaseOutcome::NoTelemetry => debug!(case, "Case skipped: no telemetry"),
            CaseOutcome::Untrusted { min_horizon } => {
                debug!(case, min_horizon, "Case skipped: telemetry horizon too long")
            }
        }
    }

    records
}

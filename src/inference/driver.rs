//! Batch orchestration over all (vehicle, route-direction, stop) triples.

use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::config::InferenceConfig;
use crate::error::{InferenceError, TripleError, TripleFailure};
use crate::inference::assign::{assign_telemetry, with_horizons};
use crate::inference::dedup::deduplicate;
use crate::inference::resolve::resolve_cases;
use crate::inference::segment::segment_cases;
use crate::observation::{ArrivalRecord, RawObservation, TripleKey, UNKNOWN_VEHICLE};
use crate::stops::StopDirectory;

/// Everything a batch run produced.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub records: Vec<ArrivalRecord>,
    pub triples: usize,
    pub resolved_triples: usize,
    pub failures: Vec<TripleFailure>,
    /// Rows skipped because their vehicle id is the reserved sentinel.
    pub unknown_vehicle_rows: usize,
}

/// Groups rows by triple, in key order, keeping input order inside each
/// group. Rows of the reserved vehicle are counted and dropped.
pub fn index_triples(rows: Vec<RawObservation>) -> (BTreeMap<TripleKey, Vec<RawObservation>>, usize) {
    let mut index: BTreeMap<TripleKey, Vec<RawObservation>> = BTreeMap::new();
    let mut skipped = 0;

    for row in rows {
        if row.vehicle_id == UNKNOWN_VEHICLE {
            skipped += 1;
            continue;
        }
        index.entry(row.key()).or_default().push(row);
    }

    (index, skipped)
}

/// Runs deduplication, segmentation, telemetry assignment and resolution for
/// one triple.
///
/// A triple lacking either scheduled or telemetry rows has nothing to
/// resolve and yields no records. When `stops` is given, the triple's stop
/// must be in it, and the records carry its coordinates.
#[tracing::instrument(
    skip_all,
    fields(
        vehicle_id = key.vehicle_id,
        route_direction_id = %key.route_direction_id,
        stop_id = %key.stop_id
    )
)]
pub fn process_triple(
    key: &TripleKey,
    rows: Vec<RawObservation>,
    config: &InferenceConfig,
    stops: Option<&StopDirectory>,
) -> Result<Vec<ArrivalRecord>, TripleError> {
    let observations = deduplicate(rows);

    let telemetry_rows = observations.iter().filter(|o| o.is_telemetry()).count();
    if telemetry_rows == 0 || telemetry_rows == observations.len() {
        debug!(rows = observations.len(), telemetry_rows, "Nothing to resolve");
        return Ok(Vec::new());
    }

    let location = match stops {
        Some(directory) => {
            let stop = directory
                .stop(&key.stop_id)
                .ok_or_else(|| TripleError::UnknownStop(key.stop_id.clone()))?;
            Some((stop.latitude, stop.longitude))
        }
        None => None,
    };

    let scheduled = segment_cases(&observations, config);
    let telemetry = assign_telemetry(&scheduled, &observations, config);
    let rows = with_horizons(scheduled, telemetry)?;
    let mut records = resolve_cases(rows, config);

    if let Some((latitude, longitude)) = location {
        for record in &mut records {
            record.latitude = Some(latitude);
            record.longitude = Some(longitude);
        }
    }

    debug!(records = records.len(), "Triple processed");
    Ok(records)
}

/// Processes every triple of `rows` on a worker pool and concatenates the
/// resolved records in triple key order.
///
/// A failing triple is logged and left out. If no triple resolved anything
/// the run fails with [`InferenceError::NoResolvedArrivals`] instead of
/// returning an empty table.
pub fn run_batch(
    rows: Vec<RawObservation>,
    config: &InferenceConfig,
    stops: Option<&StopDirectory>,
) -> Result<BatchReport, InferenceError> {
    let (index, unknown_vehicle_rows) = index_triples(rows);
    let triples = index.len();
    info!(triples, unknown_vehicle_rows, "Triples indexed");

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(workers) = config.workers {
        builder = builder.num_threads(workers);
    }
    let pool = builder.build()?;

    let outcomes: Vec<(TripleKey, Result<Vec<ArrivalRecord>, TripleError>)> = pool.install(|| {
        index
            .into_iter()
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|(key, rows)| {
                let outcome = process_triple(&key, rows, config, stops);
                (key, outcome)
            })
            .collect()
    });

    let mut report = BatchReport {
        triples,
        unknown_vehicle_rows,
        ..BatchReport::default()
    };

    for (key, outcome) in outcomes {
        match outcome {
            Ok(records) if records.is_empty() => {}
            Ok(records) => {
                report.resolved_triples += 1;
                report.records.extend(records);
            }
            Err(error) => {
                warn!(triple = %key, error = %error, "Triple skipped");
                report.failures.push(TripleFailure { key, error });
            }
        }
    }

    info!(
        triples,
        resolved_triples = report.resolved_triples,
        failures = report.failures.len(),
        records = report.records.len(),
        "Batch finished"
    );

    if report.records.is_empty() {
        return Err(InferenceError::NoResolvedArrivals {
            triples,
            failures: report.failures.len(),
        });
    }

    Ok(report)
}

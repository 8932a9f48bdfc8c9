//! Schedule deviation tables prepared for plotting.
//!
//! Deviation is `arrival_time - forecast_time` of a scheduled row, in
//! minutes: how late the vehicle came compared to what the timetable said.

use chrono::{DateTime, FixedOffset, Timelike};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::warn;

use crate::observation::ArrivalRecord;
use crate::stops::{StopDirectory, TransportKind};

/// Part of the day an arrival falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DayPeriod {
    Morning,
    Day,
    Evening,
    Night,
}

impl DayPeriod {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            6..=11 => DayPeriod::Morning,
            12..=17 => DayPeriod::Day,
            18..=23 => DayPeriod::Evening,
            _ => DayPeriod::Night,
        }
    }
}

impl fmt::Display for DayPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DayPeriod::Morning => "morning",
            DayPeriod::Day => "day",
            DayPeriod::Evening => "evening",
            DayPeriod::Night => "night",
        };
        f.write_str(label)
    }
}

/// Deviation of one scheduled forecast from the inferred arrival.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviationRow {
    pub vehicle_id: i64,
    pub route_direction_id: String,
    pub stop_id: String,
    pub case: usize,
    pub forecast_time: i64,
    pub arrival_time: i64,
    pub arrival_at: DateTime<FixedOffset>,
    pub deviation_minutes: f64,
    pub day_period: DayPeriod,
}

/// Deviation rows for every scheduled record. Timestamps are rendered in
/// `offset`, which also decides the day period.
pub fn deviation_rows(records: &[ArrivalRecord], offset: FixedOffset) -> Vec<DeviationRow> {
    records
        .iter()
        .filter(|r| r.is_scheduled())
        .filter_map(|r| {
            let Some(arrival_at) = DateTime::from_timestamp(r.arrival_time, 0) else {
                warn!(arrival_time = r.arrival_time, "Arrival time out of range, row skipped");
                return None;
            };
            let arrival_at = arrival_at.with_timezone(&offset);
            let Some(delta) = r.arrival_time.checked_sub(r.forecast_time) else {
                warn!(
                    arrival_time = r.arrival_time,
                    forecast_time = r.forecast_time,
                    "Deviation out of range, row skipped"
                );
                return None;
            };

            Some(DeviationRow {
                vehicle_id: r.vehicle_id,
                route_direction_id: r.route_direction_id.clone(),
                stop_id: r.stop_id.clone(),
                case: r.case,
                forecast_time: r.forecast_time,
                arrival_time: r.arrival_time,
                arrival_at,
                deviation_minutes: delta as f64 / 60.0,
                day_period: DayPeriod::from_hour(arrival_at.hour()),
            })
        })
        .collect()
}

/// The (route_direction_id, stop_id) with the most distinct cases among
/// scheduled records. Cases are told apart per vehicle. Ties keep the
/// smallest pair.
pub fn busiest_stop(records: &[ArrivalRecord]) -> Option<(String, String)> {
    let mut cases: BTreeMap<(&str, &str), BTreeSet<(i64, usize)>> = BTreeMap::new();
    for r in records.iter().filter(|r| r.is_scheduled()) {
        cases
            .entry((r.route_direction_id.as_str(), r.stop_id.as_str()))
            .or_default()
            .insert((r.vehicle_id, r.case));
    }

    let mut best: Option<((&str, &str), usize)> = None;
    for (pair, set) in &cases {
        if best.is_none_or(|(_, count)| set.len() > count) {
            best = Some((*pair, set.len()));
        }
    }

    best.map(|((route, stop), _)| (route.to_string(), stop.to_string()))
}

/// Rows of a single stop on a single route direction, ordered by forecast.
pub fn for_stop(rows: &[DeviationRow], route_direction_id: &str, stop_id: &str) -> Vec<DeviationRow> {
    let mut selected: Vec<DeviationRow> = rows
        .iter()
        .filter(|r| r.route_direction_id == route_direction_id && r.stop_id == stop_id)
        .cloned()
        .collect();
    selected.sort_by_key(|r| r.forecast_time);
    selected
}

/// Mean deviation of one case.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseDeviation {
    pub vehicle_id: i64,
    pub route_direction_id: String,
    pub stop_id: String,
    pub case: usize,
    pub arrival_at: DateTime<FixedOffset>,
    pub deviation_minutes: f64,
    pub day_period: DayPeriod,
    pub transport: Option<TransportKind>,
    pub route: Option<String>,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Collapses deviation rows to one row per (vehicle, route direction, stop,
/// case), with the first arrival time and the mean deviation. Route details
/// come from `stops` when available.
pub fn case_deviations(rows: &[DeviationRow], stops: Option<&StopDirectory>) -> Vec<CaseDeviation> {
    let mut grouped: BTreeMap<(i64, &str, &str, usize), Vec<&DeviationRow>> = BTreeMap::new();
    for row in rows {
        grouped
            .entry((
                row.vehicle_id,
                row.route_direction_id.as_str(),
                row.stop_id.as_str(),
                row.case,
            ))
            .or_default()
            .push(row);
    }

    grouped
        .into_values()
        .map(|group| {
            let first = group[0];
            let deviations: Vec<f64> = group.iter().map(|r| r.deviation_minutes).collect();
            let route = stops.and_then(|s| s.route(&first.route_direction_id));

            CaseDeviation {
                vehicle_id: first.vehicle_id,
                route_direction_id: first.route_direction_id.clone(),
                stop_id: first.stop_id.clone(),
                case: first.case,
                arrival_at: first.arrival_at,
                deviation_minutes: mean(&deviations),
                day_period: first.day_period,
                transport: route.map(|r| r.transport_kind),
                route: route.map(|r| r.label()),
            }
        })
        .collect()
}

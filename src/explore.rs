//! Pulling a single selection out of the raw log for inspection.

use std::collections::BTreeMap;

use crate::config::InferenceConfig;
use crate::inference::CaseMember;
use crate::inference::segment::{collapse_cases, segment_cases};
use crate::observation::{Observation, RawObservation};

/// Which rows to look at. Without a vehicle every vehicle on the route
/// direction is included.
#[derive(Debug, Clone)]
pub struct Selection {
    pub stop_id: String,
    pub route_direction_id: String,
    pub vehicle_id: Option<i64>,
}

impl Selection {
    pub fn matches(&self, row: &RawObservation) -> bool {
        row.stop_id == self.stop_id
            && row.route_direction_id == self.route_direction_id
            && self.vehicle_id.is_none_or(|v| v == row.vehicle_id)
    }
}

/// Rows of `selection`, ordered by `(request_time, forecast_time)`.
pub fn desired_item(rows: &[RawObservation], selection: &Selection) -> Vec<Observation> {
    let mut selected: Vec<Observation> = rows
        .iter()
        .filter(|row| selection.matches(row))
        .cloned()
        .map(Observation::from)
        .collect();
    selected.sort_by_key(|o| (o.request_time, o.forecast_time));
    selected
}

/// Scheduled rows of `selected` collapsed to one row per case. Cases are
/// segmented separately for every vehicle, in vehicle order.
pub fn collapse_per_vehicle(selected: &[Observation], config: &InferenceConfig) -> Vec<CaseMember> {
    let mut by_vehicle: BTreeMap<i64, Vec<Observation>> = BTreeMap::new();
    for observation in selected {
        by_vehicle
            .entry(observation.vehicle_id)
            .or_default()
            .push(observation.clone());
    }

    by_vehicle
        .values()
        .flat_map(|rows| collapse_cases(&segment_cases(rows, config)))
        .collect()
}

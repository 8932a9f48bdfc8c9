//! Attaching telemetry forecasts to scheduled cases.

use tracing::debug;

use crate::config::InferenceConfig;
use crate::error::TripleError;
use crate::inference::{CaseMember, CaseRow};
use crate::observation::Observation;

/// A scheduled observation considered as a home for a telemetry row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    /// Index in the forecast-sorted scheduled set.
    pub position: usize,
    pub case: usize,
    /// Absolute forecast-time difference, in seconds.
    pub distance: u64,
}

/// Finds the two scheduled members whose forecast is closest to
/// `forecast_time`. Equal distances are ordered by position, so the earlier
/// member in forecast order always wins a tie.
///
/// Returns `None` for an empty scheduled set; the second neighbor is `None`
/// when only one member exists.
pub fn nearest_two(scheduled: &[CaseMember], forecast_time: i64) -> Option<(Neighbor, Option<Neighbor>)> {
    let mut nearest: Option<Neighbor> = None;
    let mut runner_up: Option<Neighbor> = None;

    for (position, member) in scheduled.iter().enumerate() {
        let candidate = Neighbor {
            position,
            case: member.case,
            distance: forecast_time.abs_diff(member.observation.forecast_time),
        };

        match nearest {
            Some(best) if candidate.distance >= best.distance => {
                if runner_up.is_none_or(|r| candidate.distance < r.distance) {
                    runner_up = Some(candidate);
                }
            }
            _ => {
                runner_up = nearest;
                nearest = Some(candidate);
            }
        }
    }

    nearest.map(|n| (n, runner_up))
}

/// Picks the case a telemetry row joins, given its two nearest scheduled
/// neighbors.
///
/// - With a single neighbor, its case is taken if the distance is below the
///   window.
/// - When both neighbors share a case, that case is taken if either distance
///   is below the window.
/// - When they belong to different cases, the strictly nearer neighbor wins
///   (`left` on a tie), again only below the window.
///
/// The result is always a case index, whichever neighbor is chosen.
pub fn choose_case(left: Neighbor, right: Option<Neighbor>, window_secs: u64) -> Option<usize> {
    let chosen = match right {
        Some(right) if right.distance < left.distance => right,
        _ => left,
    };

    (chosen.distance < window_secs).then_some(chosen.case)
}

/// Assigns each telemetry observation to a case of `scheduled`, dropping the
/// ones no case can claim. `scheduled` must be the output of
/// [`segment_cases`](crate::inference::segment::segment_cases).
pub fn assign_telemetry(
    scheduled: &[CaseMember],
    observations: &[Observation],
    config: &InferenceConfig,
) -> Vec<CaseMember> {
    let mut assigned = Vec::new();
    let mut dropped = 0usize;

    for telemetry in observations.iter().filter(|o| o.is_telemetry()) {
        let case = nearest_two(scheduled, telemetry.forecast_time).and_then(|(left, right)| {
            choose_case(left, right, config.telemetry_assignment_window_secs)
        });

        match case {
            Some(case) => assigned.push(CaseMember {
                observation: telemetry.clone(),
                case,
            }),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        debug!(dropped, assigned = assigned.len(), "Unassignable telemetry dropped");
    }

    assigned
}

/// Merges scheduled and assigned telemetry members, computes every row's
/// forecast horizon and orders the rows by `(forecast_time, request_time)`.
pub fn with_horizons(
    scheduled: Vec<CaseMember>,
    telemetry: Vec<CaseMember>,
) -> Result<Vec<CaseRow>, TripleError> {
    let mut rows = scheduled
        .into_iter()
        .chain(telemetry)
        .map(|member| {
            let horizon = member
                .observation
                .horizon()
                .ok_or(TripleError::HorizonOverflow {
                    request_time: member.observation.request_time,
                    forecast_time: member.observation.forecast_time,
                })?;
            Ok(CaseRow {
                observation: member.observation,
                case: member.case,
                horizon,
            })
        })
        .collect::<Result<Vec<_>, TripleError>>()?;

    rows.sort_by_key(|row| (row.observation.forecast_time, row.observation.request_time));
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::segment::segment_cases;
    use crate::observation::Source;

    fn obs(source: Source, request_time: i64, forecast_time: i64) -> Observation {
        Observation {
            vehicle_id: 11,
            route_direction_id: "r".into(),
            stop_id: "s".into(),
            request_time,
            forecast_time,
            source,
        }
    }

    fn assign(observations: &[Observation]) -> Vec<CaseMember> {
        let config = InferenceConfig::default();
        let scheduled = segment_cases(observations, &config);
        assign_telemetry(&scheduled, observations, &config)
    }

    #[test]
    fn test_single_scheduled_below_window_is_assigned() {
        let observations = vec![
            obs(Source::Scheduled, 0, 1000),
            obs(Source::Telemetry, 0, 1000 + 1199),
        ];
        let assigned = assign(&observations);

        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0].case, 0);
    }

    #[test]
    fn test_single_scheduled_at_window_is_dropped() {
        let observations = vec![
            obs(Source::Scheduled, 0, 1000),
            obs(Source::Telemetry, 0, 1000 + 1200),
        ];
        assert!(assign(&observations).is_empty());
    }

    #[test]
    fn test_nearest_case_wins() {
        // cases: 0 -> {0, 500}, 1 -> {5000}
        let observations = vec![
            obs(Source::Scheduled, -600, 0),
            obs(Source::Scheduled, -100, 500),
            obs(Source::Scheduled, 4000, 5000),
            obs(Source::Telemetry, 4500, 4700),
            obs(Source::Telemetry, 300, 800),
        ];
        let assigned = assign(&observations);

        assert_eq!(assigned.len(), 2);
        assert_eq!(assigned[0].observation.forecast_time, 4700);
        assert_eq!(assigned[0].case, 1);
        assert_eq!(assigned[1].observation.forecast_time, 800);
        assert_eq!(assigned[1].case, 0);
    }

    #[test]
    fn test_far_telemetry_is_dropped() {
        let observations = vec![
            obs(Source::Scheduled, 0, 0),
            obs(Source::Scheduled, 100, 500),
            obs(Source::Telemetry, 2000, 2500),
        ];
        assert!(assign(&observations).is_empty());
    }

    #[test]
    fn test_nearest_two_breaks_ties_by_position() {
        let config = InferenceConfig::default();
        let scheduled = segment_cases(
            &[
                obs(Source::Scheduled, 0, 0),
                obs(Source::Scheduled, 0, 1000),
                obs(Source::Scheduled, 0, 2000),
            ],
            &config,
        );
        let (left, right) = nearest_two(&scheduled, 500).unwrap();

        assert_eq!(left.position, 0);
        assert_eq!(left.distance, 500);
        let right = right.unwrap();
        assert_eq!(right.position, 1);
        assert_eq!(right.distance, 500);
        // equidistant between case 0 and case 1: the earlier case wins
        assert_eq!(choose_case(left, Some(right), 1200), Some(0));
    }

    #[test]
    fn test_nearest_two_single_member() {
        let config = InferenceConfig::default();
        let scheduled = segment_cases(&[obs(Source::Scheduled, 0, 10)], &config);
        let (left, right) = nearest_two(&scheduled, 30).unwrap();

        assert_eq!(left.distance, 20);
        assert!(right.is_none());
        assert!(nearest_two(&[], 30).is_none());
    }

    #[test]
    fn test_choose_case_same_case_uses_either_neighbor() {
        let left = Neighbor { position: 0, case: 2, distance: 1500 };
        let right = Neighbor { position: 1, case: 2, distance: 300 };

        assert_eq!(choose_case(left, Some(right), 1200), Some(2));
        assert_eq!(choose_case(right, Some(left), 1200), Some(2));
    }

    #[test]
    fn test_choose_case_right_nearer_returns_case_not_distance() {
        // When the second neighbor is strictly nearer and in another case,
        // the chosen value must be its case index.
        let left = Neighbor { position: 0, case: 0, distance: 900 };
        let right = Neighbor { position: 5, case: 3, distance: 400 };

        assert_eq!(choose_case(left, Some(right), 1200), Some(3));
        assert_eq!(choose_case(left, Some(right), 400), None);
    }

    #[test]
    fn test_choose_case_different_cases_outside_window() {
        let left = Neighbor { position: 0, case: 0, distance: 1300 };
        let right = Neighbor { position: 1, case: 1, distance: 1400 };

        assert_eq!(choose_case(left, Some(right), 1200), None);
    }

    #[test]
    fn test_with_horizons_sorts_and_computes() {
        let scheduled = vec![CaseMember { observation: obs(Source::Scheduled, 0, 500), case: 0 }];
        let telemetry = vec![CaseMember { observation: obs(Source::Telemetry, 400, 490), case: 0 }];
        let rows = with_horizons(scheduled, telemetry).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].observation.forecast_time, 490);
        assert_eq!(rows[0].horizon, 90);
        assert_eq!(rows[1].horizon, 500);
    }

    #[test]
    fn test_with_horizons_overflow_is_error() {
        let scheduled = vec![CaseMember {
            observation: obs(Source::Scheduled, i64::MIN, i64::MAX),
            case: 0,
        }];
        let result = with_horizons(scheduled, Vec::new());

        assert!(matches!(result, Err(TripleError::HorizonOverflow { .. })));
    }
}

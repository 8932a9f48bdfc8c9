//! Clustering of scheduled forecasts into cases.

use crate::config::InferenceConfig;
use crate::inference::CaseMember;
use crate::observation::{Observation, Source};

/// Partitions the scheduled observations of one triple into cases.
///
/// Scheduled rows are sorted by `forecast_time` (stable, so equal forecasts
/// keep input order). A new case starts whenever the gap to the previous
/// forecast is at least the continuity window. The returned members are in
/// that sorted order and their case indices never decrease along it.
/// Telemetry rows in `observations` are ignored.
pub fn segment_cases(observations: &[Observation], config: &InferenceConfig) -> Vec<CaseMember> {
    let mut scheduled: Vec<&Observation> = observations
        .iter()
        .filter(|o| o.source == Source::Scheduled)
        .collect();
    scheduled.sort_by_key(|o| o.forecast_time);

    let mut members = Vec::with_capacity(scheduled.len());
    let mut case = 0;
    let mut previous: Option<i64> = None;

    for observation in scheduled {
        if let Some(previous) = previous {
            if observation.forecast_time.abs_diff(previous) >= config.case_continuity_window_secs {
                case += 1;
            }
        }
        previous = Some(observation.forecast_time);

        members.push(CaseMember {
            observation: observation.clone(),
            case,
        });
    }

    members
}

/// Collapses every case of segmented scheduled rows into a single row whose
/// request and forecast times are the (floored) means of its members.
///
/// Expects the output of [`segment_cases`]: members of one case adjacent.
pub fn collapse_cases(members: &[CaseMember]) -> Vec<CaseMember> {
    members
        .chunk_by(|a, b| a.case == b.case)
        .map(|chunk| {
            let first = &chunk[0];
            let len = chunk.len() as i128;
            let request_sum: i128 = chunk.iter().map(|m| m.observation.request_time as i128).sum();
            let forecast_sum: i128 = chunk.iter().map(|m| m.observation.forecast_time as i128).sum();

            CaseMember {
                observation: Observation {
                    request_time: request_sum.div_euclid(len) as i64,
                    forecast_time: forecast_sum.div_euclid(len) as i64,
                    ..first.observation.clone()
                },
                case: first.case,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduled(forecast_time: i64) -> Observation {
        Observation {
            vehicle_id: 3,
            route_direction_id: "r".into(),
            stop_id: "s".into(),
            request_time: forecast_time - 300,
            forecast_time,
            source: Source::Scheduled,
        }
    }

    fn cases(members: &[CaseMember]) -> Vec<usize> {
        members.iter().map(|m| m.case).collect()
    }

    #[test]
    fn test_gap_starts_new_case() {
        let observations = vec![scheduled(0), scheduled(500), scheduled(1300)];
        let members = segment_cases(&observations, &InferenceConfig::default());

        assert_eq!(cases(&members), vec![0, 0, 1]);
    }

    #[test]
    fn test_gap_equal_to_window_starts_new_case() {
        let observations = vec![scheduled(0), scheduled(599), scheduled(1199)];
        let members = segment_cases(&observations, &InferenceConfig::default());

        assert_eq!(cases(&members), vec![0, 0, 1]);
    }

    #[test]
    fn test_unsorted_input_is_sorted_by_forecast() {
        let observations = vec![scheduled(5000), scheduled(0), scheduled(300), scheduled(4800)];
        let members = segment_cases(&observations, &InferenceConfig::default());

        let forecasts: Vec<i64> = members.iter().map(|m| m.observation.forecast_time).collect();
        assert_eq!(forecasts, vec![0, 300, 4800, 5000]);
        assert_eq!(cases(&members), vec![0, 0, 1, 1]);
    }

    #[test]
    fn test_single_observation_is_single_case() {
        let members = segment_cases(&[scheduled(42)], &InferenceConfig::default());

        assert_eq!(members.len(), 1);
        assert_eq!(members[0].case, 0);
    }

    #[test]
    fn test_telemetry_is_ignored() {
        let mut telemetry = scheduled(100);
        telemetry.source = Source::Telemetry;
        let members = segment_cases(&[scheduled(0), telemetry], &InferenceConfig::default());

        assert_eq!(members.len(), 1);
    }

    #[test]
    fn test_partition_is_total_and_monotonic() {
        let forecasts = [9000, 10, 620, 20, 1250, 9300, 1800, 640];
        let observations: Vec<Observation> = forecasts.iter().map(|&f| scheduled(f)).collect();
        let members = segment_cases(&observations, &InferenceConfig::default());

        assert_eq!(members.len(), observations.len());
        for observation in &observations {
            let count = members.iter().filter(|m| &m.observation == observation).count();
            assert_eq!(count, 1);
        }
        assert!(members.windows(2).all(|w| w[0].case <= w[1].case));
        assert!(
            members
                .windows(2)
                .all(|w| w[0].observation.forecast_time <= w[1].observation.forecast_time)
        );
    }

    #[test]
    fn test_custom_window() {
        let config = InferenceConfig {
            case_continuity_window_secs: 100,
            ..InferenceConfig::default()
        };
        let members = segment_cases(&[scheduled(0), scheduled(150)], &config);

        assert_eq!(cases(&members), vec![0, 1]);
    }

    #[test]
    fn test_collapse_cases_takes_means() {
        let observations = vec![scheduled(0), scheduled(500), scheduled(1300)];
        let members = segment_cases(&observations, &InferenceConfig::default());
        let collapsed = collapse_cases(&members);

        assert_eq!(collapsed.len(), 2);
        assert_eq!(collapsed[0].observation.forecast_time, 250);
        assert_eq!(collapsed[0].observation.request_time, -50);
        assert_eq!(collapsed[1].observation.forecast_time, 1300);
        assert_eq!(collapsed[1].case, 1);
    }
}

//! Forecast observations and the keys used to partition them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Vehicle id reserved for rows whose vehicle is unknown or unreliable.
pub const UNKNOWN_VEHICLE: i64 = 0;

/// Where a forecast came from. Stored as `0`/`1` in the tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Source {
    Scheduled,
    Telemetry,
}

impl TryFrom<u8> for Source {
    type Error = String;

    fn try_from(flag: u8) -> Result<Self, Self::Error> {
        match flag {
            0 => Ok(Source::Scheduled),
            1 => Ok(Source::Telemetry),
            other => Err(format!("unknown source flag {other}")),
        }
    }
}

impl From<Source> for u8 {
    fn from(source: Source) -> Self {
        match source {
            Source::Scheduled => 0,
            Source::Telemetry => 1,
        }
    }
}

/// A single row of the raw forecast log, as exported.
///
/// The export names some columns differently (`tmId`, `route_path_id`,
/// `byTelemetry`, `id`); those are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawObservation {
    #[serde(alias = "tmId")]
    pub vehicle_id: i64,
    #[serde(alias = "route_path_id")]
    pub route_direction_id: String,
    pub stop_id: String,
    pub request_time: i64,
    pub forecast_time: i64,
    #[serde(alias = "byTelemetry")]
    pub source: Source,
    #[serde(default, alias = "id")]
    pub row_id: Option<String>,
}

impl RawObservation {
    pub fn key(&self) -> TripleKey {
        TripleKey {
            vehicle_id: self.vehicle_id,
            route_direction_id: self.route_direction_id.clone(),
            stop_id: self.stop_id.clone(),
        }
    }
}

/// An observation stripped of its row id. Two observations with equal
/// fields are the same observation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Observation {
    pub vehicle_id: i64,
    pub route_direction_id: String,
    pub stop_id: String,
    pub request_time: i64,
    pub forecast_time: i64,
    pub source: Source,
}

impl Observation {
    pub fn is_telemetry(&self) -> bool {
        self.source == Source::Telemetry
    }

    /// `forecast_time - request_time`, or `None` if it does not fit in an `i64`.
    pub fn horizon(&self) -> Option<i64> {
        self.forecast_time.checked_sub(self.request_time)
    }
}

impl From<RawObservation> for Observation {
    fn from(raw: RawObservation) -> Self {
        Observation {
            vehicle_id: raw.vehicle_id,
            route_direction_id: raw.route_direction_id,
            stop_id: raw.stop_id,
            request_time: raw.request_time,
            forecast_time: raw.forecast_time,
            source: raw.source,
        }
    }
}

/// Identity of one independent unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TripleKey {
    pub vehicle_id: i64,
    pub route_direction_id: String,
    pub stop_id: String,
}

impl fmt::Display for TripleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "vehicle={} route_direction={} stop={}",
            self.vehicle_id, self.route_direction_id, self.stop_id
        )
    }
}

/// One row of the resolved output table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrivalRecord {
    pub vehicle_id: i64,
    pub route_direction_id: String,
    pub stop_id: String,
    pub request_time: i64,
    pub forecast_time: i64,
    pub source: Source,
    pub case: usize,
    pub arrival_time: i64,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl ArrivalRecord {
    pub fn new(observation: &Observation, case: usize, arrival_time: i64) -> Self {
        ArrivalRecord {
            vehicle_id: observation.vehicle_id,
            route_direction_id: observation.route_direction_id.clone(),
            stop_id: observation.stop_id.clone(),
            request_time: observation.request_time,
            forecast_time: observation.forecast_time,
            source: observation.source,
            case,
            arrival_time,
            latitude: None,
            longitude: None,
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.source == Source::Scheduled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_flag_conversion() {
        assert_eq!(Source::try_from(0), Ok(Source::Scheduled));
        assert_eq!(Source::try_from(1), Ok(Source::Telemetry));
        assert!(Source::try_from(2).is_err());
        assert_eq!(u8::from(Source::Telemetry), 1);
    }

    #[test]
    fn test_horizon() {
        let obs = Observation {
            vehicle_id: 7,
            route_direction_id: "r".into(),
            stop_id: "s".into(),
            request_time: 400,
            forecast_time: 490,
            source: Source::Telemetry,
        };
        assert_eq!(obs.horizon(), Some(90));

        let overflow = Observation {
            request_time: i64::MIN,
            forecast_time: i64::MAX,
            ..obs
        };
        assert_eq!(overflow.horizon(), None);
    }

    #[test]
    fn test_triple_key_ordering() {
        let a = TripleKey {
            vehicle_id: 1,
            route_direction_id: "b".into(),
            stop_id: "a".into(),
        };
        let b = TripleKey {
            vehicle_id: 2,
            route_direction_id: "a".into(),
            stop_id: "a".into(),
        };
        assert!(a < b);
        assert_eq!(a.to_string(), "vehicle=1 route_direction=b stop=a");
    }
}

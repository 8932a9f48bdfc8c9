//! Stop and route metadata, indexed once per run.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use tracing::debug;

use crate::parser::{Column, open_table, read_table};

const STOP_COLUMNS: &[Column] = &[
    ("stop_id", &[]),
    ("latitude", &["lat"]),
    ("longitude", &["lon"]),
    ("route_direction_id", &["route_path_id"]),
    ("transport_kind", &["transport_type"]),
    ("line_number", &["number"]),
    ("stop_name", &["name"]),
];

/// One row of the stop repository export. A stop served by several routes
/// appears once per route.
#[derive(Debug, Clone, Deserialize)]
pub struct StopRecord {
    pub stop_id: String,
    #[serde(alias = "lat")]
    pub latitude: f64,
    #[serde(alias = "lon")]
    pub longitude: f64,
    #[serde(alias = "route_path_id")]
    pub route_direction_id: String,
    #[serde(alias = "transport_type")]
    pub transport_kind: String,
    #[serde(alias = "number")]
    pub line_number: String,
    #[serde(alias = "name")]
    pub stop_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Bus,
    Tram,
    Minibus,
}

impl TransportKind {
    /// Trams are reported as such. Line numbers carrying a Cyrillic `К`
    /// mark commercial minibus lines, unless they start with `т`.
    pub fn classify(transport_kind: &str, line_number: &str) -> Self {
        if transport_kind.eq_ignore_ascii_case("tram") {
            return TransportKind::Tram;
        }
        let commercial = line_number.contains('К') || line_number.contains('к');
        if commercial && !line_number.starts_with('т') {
            TransportKind::Minibus
        } else {
            TransportKind::Bus
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransportKind::Bus => "bus",
            TransportKind::Tram => "tram",
            TransportKind::Minibus => "minibus",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StopInfo {
    pub latitude: f64,
    pub longitude: f64,
    pub stop_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteInfo {
    pub transport_kind: TransportKind,
    pub line_number: String,
}

impl RouteInfo {
    /// Human readable route name, e.g. `tram 17`.
    pub fn label(&self) -> String {
        format!("{} {}", self.transport_kind, self.line_number)
    }
}

/// Lookup of stop coordinates and route descriptions.
#[derive(Debug, Default)]
pub struct StopDirectory {
    stops: HashMap<String, StopInfo>,
    routes: HashMap<String, RouteInfo>,
}

impl StopDirectory {
    /// Builds the indexes. The first record seen for an id wins.
    pub fn from_records(records: impl IntoIterator<Item = StopRecord>) -> Self {
        let mut directory = StopDirectory::default();

        for record in records {
            directory
                .routes
                .entry(record.route_direction_id)
                .or_insert_with(|| RouteInfo {
                    transport_kind: TransportKind::classify(&record.transport_kind, &record.line_number),
                    line_number: record.line_number,
                });
            directory.stops.entry(record.stop_id).or_insert(StopInfo {
                latitude: record.latitude,
                longitude: record.longitude,
                stop_name: record.stop_name,
            });
        }

        directory
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let records: Vec<StopRecord> = read_table(reader, STOP_COLUMNS)?;
        Ok(Self::from_records(records))
    }

    /// Loads the stop repository export at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let directory = Self::from_reader(open_table(path)?)?;
        debug!(
            path,
            stops = directory.stops.len(),
            routes = directory.routes.len(),
            "Stop directory loaded"
        );
        Ok(directory)
    }

    pub fn stop(&self, stop_id: &str) -> Option<&StopInfo> {
        self.stops.get(stop_id)
    }

    pub fn route(&self, route_direction_id: &str) -> Option<&RouteInfo> {
        self.routes.get(route_direction_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: &str = "\
stop_id,lat,lon,route_path_id,transport_type,number,name
s1,55.75,37.61,r1,bus,м5К,Central
s1,55.75,37.61,r2,tram,17,Central
s2,55.76,37.62,r1,bus,м5К,Park
s3,55.77,37.63,r3,bus,т25к,Depot
";

    #[test]
    fn test_classify() {
        assert_eq!(TransportKind::classify("tram", "3"), TransportKind::Tram);
        assert_eq!(TransportKind::classify("bus", "м5К"), TransportKind::Minibus);
        assert_eq!(TransportKind::classify("bus", "т25к"), TransportKind::Bus);
        assert_eq!(TransportKind::classify("bus", "905"), TransportKind::Bus);
    }

    #[test]
    fn test_directory_lookup() {
        let directory = StopDirectory::from_reader(DATA.as_bytes()).unwrap();

        let central = directory.stop("s1").unwrap();
        assert_eq!(central.stop_name, "Central");
        assert_eq!(central.latitude, 55.75);
        assert!(directory.stop("missing").is_none());

        assert_eq!(directory.route("r2").unwrap().label(), "tram 17");
        assert_eq!(directory.route("r1").unwrap().transport_kind, TransportKind::Minibus);
        assert_eq!(directory.route("r3").unwrap().transport_kind, TransportKind::Bus);
    }

    #[test]
    fn test_missing_column() {
        let data = "stop_id,lat,lon\ns1,1.0,2.0\n";
        assert!(StopDirectory::from_reader(data.as_bytes()).is_err());
    }
}

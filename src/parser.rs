//! CSV loaders for the observation log and the tables derived from it.
//!
//! Files ending in `.gz` are decompressed on the fly.

use anyhow::{Result, bail};
use csv::{ReaderBuilder, StringRecord};
use flate2::read::GzDecoder;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::Read;
use tracing::debug;

use crate::error::InferenceError;
use crate::observation::{ArrivalRecord, RawObservation};

/// A required column and the alternative header names it may appear under.
pub(crate) type Column = (&'static str, &'static [&'static str]);

const OBSERVATION_COLUMNS: &[Column] = &[
    ("vehicle_id", &["tmId"]),
    ("route_direction_id", &["route_path_id"]),
    ("stop_id", &[]),
    ("request_time", &[]),
    ("forecast_time", &[]),
    ("source", &["byTelemetry"]),
];

/// Field order of a headerless forecast log. The leading row id may be
/// absent, in which case every row has one field less.
pub const HEADLESS_OBSERVATION_ORDER: [&str; 7] = [
    "row_id",
    "vehicle_id",
    "route_direction_id",
    "stop_id",
    "request_time",
    "forecast_time",
    "source",
];

const ARRIVAL_COLUMNS: &[Column] = &[
    ("vehicle_id", &[]),
    ("route_direction_id", &[]),
    ("stop_id", &[]),
    ("request_time", &[]),
    ("forecast_time", &[]),
    ("source", &[]),
    ("case", &[]),
    ("arrival_time", &[]),
];

/// Fails with [`InferenceError::MissingColumn`] for the first required column
/// absent from `headers`.
pub(crate) fn require_columns(headers: &StringRecord, columns: &[Column]) -> Result<(), InferenceError> {
    for (name, aliases) in columns {
        let present = headers
            .iter()
            .any(|header| header == *name || aliases.contains(&header));
        if !present {
            return Err(InferenceError::MissingColumn(name.to_string()));
        }
    }
    Ok(())
}

/// Reads every row of a headed CSV table after checking its columns.
pub(crate) fn read_table<T, R>(reader: R, columns: &[Column]) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    R: Read,
{
    let mut rdr = csv::Reader::from_reader(reader);
    require_columns(rdr.headers()?, columns)?;

    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let record: T = result?;
        rows.push(record);
    }

    Ok(rows)
}

pub(crate) fn open_table(path: &str) -> Result<Box<dyn Read>> {
    let file = File::open(path)?;
    if path.ends_with(".gz") {
        Ok(Box::new(GzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

pub fn observations_from_reader<R: Read>(reader: R) -> Result<Vec<RawObservation>> {
    read_table(reader, OBSERVATION_COLUMNS)
}

/// Reads a forecast log without a header row, in
/// [`HEADLESS_OBSERVATION_ORDER`].
pub fn observations_from_headless_reader<R: Read>(reader: R) -> Result<Vec<RawObservation>> {
    let with_id = StringRecord::from(&HEADLESS_OBSERVATION_ORDER[..]);
    let without_id = StringRecord::from(&HEADLESS_OBSERVATION_ORDER[1..]);
    let mut rdr = ReaderBuilder::new().has_headers(false).from_reader(reader);

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let headers = match record.len() {
            7 => &with_id,
            6 => &without_id,
            n => bail!("headerless row has {n} fields, expected 6 or 7"),
        };
        let row: RawObservation = record.deserialize(Some(headers))?;
        rows.push(row);
    }

    Ok(rows)
}

/// Loads the raw forecast log. With `has_headers` unset the file is read in
/// [`HEADLESS_OBSERVATION_ORDER`].
///
/// # Errors
///
/// Fails if the file cannot be read, a required column is missing, or a row
/// does not parse.
pub fn load_observations(path: &str, has_headers: bool) -> Result<Vec<RawObservation>> {
    let reader = open_table(path)?;
    let rows = if has_headers {
        observations_from_reader(reader)?
    } else {
        observations_from_headless_reader(reader)?
    };
    debug!(path, rows = rows.len(), "Observations loaded");
    Ok(rows)
}

pub fn arrivals_from_reader<R: Read>(reader: R) -> Result<Vec<ArrivalRecord>> {
    read_table(reader, ARRIVAL_COLUMNS)
}

/// Loads a table previously written by the `assign` command.
pub fn load_arrivals(path: &str) -> Result<Vec<ArrivalRecord>> {
    let rows = arrivals_from_reader(open_table(path)?)?;
    debug!(path, rows = rows.len(), "Arrival records loaded");
    Ok(rows)
}

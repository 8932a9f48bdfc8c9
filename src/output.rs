//! Output formatting and persistence for result tables.
//!
//! Supports pretty-printing and CSV writing, optionally gzip-compressed.

use anyhow::Result;
use csv::{Writer, WriterBuilder};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use std::fmt::Debug;
use std::fs::File;
use std::io::Write;
use tracing::{debug, info};

/// Logs rows at `info` using Rust's debug pretty-print format, so they
/// show on the terminal under the default filter.
pub fn print_pretty<T: Debug>(rows: &[T]) {
    for row in rows {
        info!("{:#?}", row);
    }
}

fn serialize_rows<W: Write, T: Serialize>(writer: &mut Writer<W>, rows: &[T]) -> Result<()> {
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes `rows` as a CSV table with a header row, replacing any existing
/// file. The file is gzip-compressed when `gzip` is set or `path` ends in
/// `.gz`.
pub fn write_table<T: Serialize>(path: &str, rows: &[T], gzip: bool) -> Result<()> {
    let file = File::create(path)?;
    let compress = gzip || path.ends_with(".gz");
    debug!(path, rows = rows.len(), compress, "Writing CSV table");

    if compress {
        let mut writer = WriterBuilder::new().from_writer(GzEncoder::new(file, Compression::default()));
        serialize_rows(&mut writer, rows)?;
        writer.into_inner().map_err(|e| e.into_error())?.finish()?;
    } else {
        let mut writer = WriterBuilder::new().from_writer(file);
        serialize_rows(&mut writer, rows)?;
    }

    info!(path, rows = rows.len(), "Table written");
    Ok(())
}

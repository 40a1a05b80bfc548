//! CSV import and export of telemetry rows
//!
//! Files use the header `timestamp,channel_id,payload`. The older
//! `timestamp,can_id,data` header is accepted on import.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::codec::validate_payload;
use crate::types::{parse_timestamp, Channel, NewTelemetry};

#[derive(Debug, Error)]
pub enum CsvError {
    #[error("Failed to open {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid row at line {line}: {message}")]
    InvalidRow { line: u64, message: String },
}

#[derive(Debug, Deserialize)]
struct RawRow {
    timestamp: String,
    #[serde(alias = "can_id")]
    channel_id: String,
    #[serde(alias = "data")]
    payload: String,
}

#[derive(Debug, Serialize)]
struct OutRow<'a> {
    timestamp: String,
    channel_id: &'a str,
    payload: &'a str,
}

/// Parse and validate every row. The first bad row aborts the import.
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<NewTelemetry>, CsvError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut rows = Vec::new();

    for result in rdr.deserialize::<RawRow>() {
        let raw = result?;
        // header is line 1
        let line = rows.len() as u64 + 2;
        let invalid = |message: String| CsvError::InvalidRow { line, message };

        let timestamp = parse_timestamp(&raw.timestamp)
            .map_err(|e| invalid(format!("bad timestamp '{}': {e}", raw.timestamp)))?;
        let channel: Channel = raw.channel_id.parse().map_err(|e| invalid(format!("{e}")))?;
        validate_payload(&raw.payload).map_err(|e| invalid(format!("{e}")))?;

        rows.push(NewTelemetry::new(timestamp, channel, raw.payload.to_ascii_uppercase()));
    }
    Ok(rows)
}

pub fn read_rows_from_path(path: &Path) -> Result<Vec<NewTelemetry>, CsvError> {
    let file = File::open(path).map_err(|source| CsvError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let rows = read_rows(file)?;
    info!(path = %path.display(), rows = rows.len(), "Read telemetry CSV");
    Ok(rows)
}

pub fn write_rows<W: Write>(writer: W, rows: &[NewTelemetry]) -> Result<(), CsvError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(OutRow {
            timestamp: row.timestamp.to_rfc3339(),
            channel_id: row.channel_id.identifier(),
            payload: &row.payload,
        })?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Write rows to `path`, creating parent directories as needed.
pub fn write_rows_to_path(path: &Path, rows: &[NewTelemetry]) -> Result<(), CsvError> {
    let io_err = |source| CsvError::Io {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let file = File::create(path).map_err(io_err)?;
    write_rows(file, rows)?;
    info!(path = %path.display(), rows = rows.len(), "Wrote telemetry CSV");
    Ok(())
}

/// Serialize any flat record type to CSV text (dashboard exports).
pub fn to_csv_string<T: Serialize>(items: &[T]) -> Result<String, CsvError> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    for item in items {
        wtr.serialize(item)?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

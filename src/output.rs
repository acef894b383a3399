//! Output formatting and persistence for pipeline tables and query results.
//!
//! Supports pretty-printing, JSON to stdout, and CSV write, append and read
//! (with optional gzip).

use std::fmt::Debug;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use csv::WriterBuilder;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::PipelineResult;

/// Logs a value using Rust's debug pretty-print format.
pub fn print_pretty<T: Debug>(value: &T) {
    debug!("{:#?}", value);
}

/// Prints a value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> PipelineResult<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

fn is_gzip(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("gz")
}

fn serialize_all<W: Write, T: Serialize>(writer: &mut csv::Writer<W>, rows: &[T]) -> PipelineResult<()> {
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes `rows` to a CSV file with a header, replacing any existing file.
pub fn write_records<T: Serialize>(path: &Path, rows: &[T], gzip: bool) -> PipelineResult<()> {
    debug!(path = %path.display(), rows = rows.len(), gzip, "Writing CSV");
    let file = File::create(path)?;

    if gzip {
        let mut writer = csv::Writer::from_writer(GzEncoder::new(file, Compression::default()));
        serialize_all(&mut writer, rows)?;
        let encoder = writer.into_inner().map_err(|e| e.into_error())?;
        encoder.finish()?;
    } else {
        let mut writer = csv::Writer::from_writer(file);
        serialize_all(&mut writer, rows)?;
    }

    Ok(())
}

/// Appends `rows` to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_records<T: Serialize>(path: &Path, rows: &[T]) -> PipelineResult<()> {
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, "Appending CSV records");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    serialize_all(&mut writer, rows)
}

/// Reads every row of a CSV file, gzip-decoding `.gz` files.
pub fn read_records<T: DeserializeOwned>(path: &Path) -> PipelineResult<Vec<T>> {
    let file = File::open(path)?;

    let mut rows = Vec::new();
    if is_gzip(path) {
        for result in csv::Reader::from_reader(GzDecoder::new(file)).deserialize() {
            rows.push(result?);
        }
    } else {
        for result in csv::Reader::from_reader(file).deserialize() {
            rows.push(result?);
        }
    }

    debug!(path = %path.display(), rows = rows.len(), "Read CSV");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::fs;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        country: String,
        confirmed: i64,
    }

    fn rows() -> Vec<Row> {
        vec![
            Row {
                country: "Chile".into(),
                confirmed: 12,
            },
            Row {
                country: "Peru".into(),
                confirmed: 7,
            },
        ]
    }

    #[test]
    fn test_print_pretty_does_not_panic() {
        print_pretty(&rows());
    }

    #[test]
    fn test_print_json_does_not_panic() {
        print_json(&rows()).unwrap();
    }

    #[test]
    fn test_write_records_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv");

        write_records(&path, &rows(), false).unwrap();
        write_records(&path, &rows()[..1], false).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "country,confirmed\nChile,12\n");
    }

    #[test]
    fn test_append_records_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv");

        append_records(&path, &rows()).unwrap();
        append_records(&path, &rows()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        // Header line should appear exactly once
        let header_count = content.lines().filter(|l| l.contains("country")).count();
        assert_eq!(header_count, 1);
        // 1 header + 4 data rows
        assert_eq!(content.lines().count(), 5);
    }

    #[test]
    fn test_read_records_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv.gz");

        write_records(&path, &rows(), true).unwrap();

        let read: Vec<Row> = read_records(&path).unwrap();
        assert_eq!(read, rows());
    }
}

//! Wide-format CSV parser and local file discovery for the raw series.
//!
//! A raw series has one row per location (optionally a sub-location) and one
//! column per calendar date holding the cumulative count on that date.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use flate2::read::GzDecoder;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::metric::Metric;

/// Accepted date header formats, tried in order. Two-digit years first so
/// `1/22/20` is not read as the year 20.
const DATE_FORMATS: &[&str] = &["%m/%d/%y", "%m/%d/%Y", "%Y-%m-%d"];

const PROVINCE: (&str, &[&str]) = ("Province/State", &["Province/State", "Province_State"]);
const COUNTRY: (&str, &[&str]) = ("Country/Region", &["Country/Region", "Country_Region"]);
const LAT: (&str, &[&str]) = ("Lat", &["Lat"]);
const LONG: (&str, &[&str]) = ("Long", &["Long", "Long_"]);

/// One source row: a country or one of its sub-locations.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub province: Option<String>,
    pub country: String,
    pub lat: Option<f64>,
    pub long: Option<f64>,
    /// Cumulative counts aligned with [`RawSeriesTable::dates`].
    pub counts: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawSeriesTable {
    pub metric: Metric,
    pub dates: Vec<NaiveDate>,
    pub rows: Vec<RawRow>,
}

impl RawSeriesTable {
    /// Sum of every row's count in date column `idx`.
    pub fn column_total(&self, idx: usize) -> i64 {
        self.rows.iter().map(|r| r.counts[idx]).sum()
    }
}

/// Parses a header such as `1/22/20` into a calendar date.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

/// Decodes a wide-format series from CSV.
///
/// `file` only labels errors.
///
/// # Errors
///
/// Fails on a missing identifier column, a non-date header among the
/// remaining columns, a file with no date columns, or a non-numeric count.
/// Empty count cells are read as zero.
pub fn parse_series<R: Read>(metric: Metric, file: &str, reader: R) -> PipelineResult<RawSeriesTable> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers()?.clone();

    let locate = |(column, aliases): (&'static str, &[&str])| -> PipelineResult<usize> {
        headers
            .iter()
            .position(|h| aliases.contains(&h.trim()))
            .ok_or_else(|| PipelineError::MissingColumn {
                file: file.to_string(),
                column,
            })
    };

    let province_idx = locate(PROVINCE)?;
    let country_idx = locate(COUNTRY)?;
    let lat_idx = locate(LAT)?;
    let long_idx = locate(LONG)?;
    let id_columns = [province_idx, country_idx, lat_idx, long_idx];

    let mut date_columns = Vec::new();
    for (idx, header) in headers.iter().enumerate() {
        if id_columns.contains(&idx) {
            continue;
        }
        let date = parse_date(header).ok_or_else(|| PipelineError::MalformedDate {
            file: file.to_string(),
            value: header.to_string(),
        })?;
        date_columns.push((idx, date));
    }

    if date_columns.is_empty() {
        return Err(PipelineError::NoDateColumns {
            file: file.to_string(),
        });
    }

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let field = |idx: usize| record.get(idx).unwrap_or("").trim();

        let country = field(country_idx).to_string();
        let province = Some(field(province_idx))
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        let mut counts = Vec::with_capacity(date_columns.len());
        for &(idx, date) in &date_columns {
            let raw = field(idx);
            let count = parse_count(raw).ok_or_else(|| PipelineError::MalformedCount {
                file: file.to_string(),
                country: country.clone(),
                date,
                value: raw.to_string(),
            })?;
            counts.push(count);
        }

        rows.push(RawRow {
            province,
            lat: field(lat_idx).parse().ok(),
            long: field(long_idx).parse().ok(),
            country,
            counts,
        });
    }

    debug!(
        file,
        %metric,
        rows = rows.len(),
        dates = date_columns.len(),
        "Parsed raw series"
    );

    Ok(RawSeriesTable {
        metric,
        dates: date_columns.into_iter().map(|(_, d)| d).collect(),
        rows,
    })
}

/// Empty cells read as zero. Float notation is accepted only for whole
/// numbers that fit in an `i64` (`12.0`, not `12.7` or `1e19`).
fn parse_count(raw: &str) -> Option<i64> {
    if raw.is_empty() {
        return Some(0);
    }
    raw.parse::<i64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.fract() == 0.0 && *v >= i64::MIN as f64 && *v < i64::MAX as f64)
            .map(|v| v as i64)
    })
}

/// Finds the local raw file for `metric` in `dir`.
///
/// When several files match, the lexicographically smallest name wins.
pub fn find_series_file(dir: &Path, metric: Metric) -> PipelineResult<PathBuf> {
    let missing = || PipelineError::MissingInput {
        metric,
        dir: dir.to_path_buf(),
    };

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(missing()),
        Err(e) => return Err(e.into()),
    };

    let mut candidates = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if metric.matches_filename(name) {
                candidates.push(entry.path());
            }
        }
    }

    candidates.sort();
    candidates.into_iter().next().ok_or_else(missing)
}

/// Reads and parses one raw series file, gzip-decoding `.gz` files.
#[tracing::instrument(fields(path = %path.display()))]
pub fn load_series(path: &Path, metric: Metric) -> PipelineResult<RawSeriesTable> {
    let file = File::open(path)?;
    let label = path.display().to_string();

    if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        parse_series(metric, &label, GzDecoder::new(file))
    } else {
        parse_series(metric, &label, file)
    }
}

/// Loads every metric found in `dir`.
///
/// Each metric succeeds or fails on its own; callers decide what to do with
/// partial data.
#[tracing::instrument(fields(dir = %dir.display()))]
pub fn load_data(dir: &Path) -> BTreeMap<Metric, PipelineResult<RawSeriesTable>> {
    let mut data = BTreeMap::new();

    for metric in Metric::ALL {
        let result = find_series_file(dir, metric).and_then(|path| load_series(&path, metric));

        match &result {
            Ok(table) => info!(%metric, rows = table.rows.len(), "Loaded raw series"),
            Err(e) => warn!(%metric, error = %e, "Raw series unavailable"),
        }

        data.insert(metric, result);
    }

    data
}

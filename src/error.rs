//! Error taxonomy for the ingestion pipeline.

use std::path::PathBuf;

use chrono::NaiveDate;

use crate::metric::Metric;

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// A remote series could not be retrieved. Reported per file.
    #[error("failed to fetch {metric} series from {url}: {reason}")]
    Fetch {
        metric: Metric,
        url: String,
        reason: String,
    },
    #[error("no {metric} series file found in {}", dir.display())]
    MissingInput { metric: Metric, dir: PathBuf },
    /// A date header could not be parsed; the upstream schema has changed.
    #[error("unparseable date column {value:?} in {file}")]
    MalformedDate { file: String, value: String },
    #[error("missing identifier column {column:?} in {file}")]
    MissingColumn { file: String, column: &'static str },
    #[error("{file} has no date columns")]
    NoDateColumns { file: String },
    #[error("invalid count {value:?} for {country} on {date} in {file}")]
    MalformedCount {
        file: String,
        country: String,
        date: NaiveDate,
        value: String,
    },
    #[error("{metric} total for {country} on {date} overflows")]
    CountOverflow {
        metric: Metric,
        country: String,
        date: NaiveDate,
    },
    #[error("cannot merge without the {0} series")]
    MissingMetric(Metric),
    #[error("csv error")]
    Csv(#[from] csv::Error),
    #[error("serde JSON error")]
    Json(#[from] serde_json::Error),
    #[error("std IO error")]
    Io(#[from] std::io::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

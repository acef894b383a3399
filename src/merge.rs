//! Joins the three long series into one table with derived columns.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::metric::Metric;
use crate::output::{read_records, write_records};
use crate::reshape::LongRecord;
use crate::stats::pct;

/// One country on one date with all metrics and derived rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRecord {
    pub country: String,
    pub date: NaiveDate,
    pub confirmed: i64,
    pub deaths: i64,
    pub recovered: i64,
    /// `confirmed - deaths - recovered`; negative when the source is inconsistent.
    pub active: i64,
    pub death_rate: f64,
    pub recovery_rate: f64,
    pub latitude: f64,
    pub longitude: f64,
}

impl MergedRecord {
    pub fn new(
        country: impl Into<String>,
        date: NaiveDate,
        confirmed: i64,
        deaths: i64,
        recovered: i64,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        MergedRecord {
            country: country.into(),
            date,
            confirmed,
            deaths,
            recovered,
            active: confirmed - deaths - recovered,
            death_rate: pct(deaths, confirmed),
            recovery_rate: pct(recovered, confirmed),
            latitude,
            longitude,
        }
    }
}

fn index_cases(records: &[LongRecord]) -> HashMap<(&str, NaiveDate), i64> {
    records
        .iter()
        .map(|r| ((r.country.as_str(), r.date), r.cases))
        .collect()
}

/// Left-joins `deaths` and `recovered` onto `confirmed` by (country, date).
///
/// Keys present only in `deaths` or `recovered` are dropped. Unmatched
/// joins and missing coordinates are filled with zero. Output order follows
/// `confirmed`.
pub fn merge(
    confirmed: &[LongRecord],
    deaths: &[LongRecord],
    recovered: &[LongRecord],
) -> Vec<MergedRecord> {
    let deaths = index_cases(deaths);
    let recovered = index_cases(recovered);

    confirmed
        .iter()
        .map(|c| {
            let key = (c.country.as_str(), c.date);
            MergedRecord::new(
                c.country.clone(),
                c.date,
                c.cases,
                deaths.get(&key).copied().unwrap_or(0),
                recovered.get(&key).copied().unwrap_or(0),
                c.lat.unwrap_or(0.0),
                c.long.unwrap_or(0.0),
            )
        })
        .collect()
}

fn series_or_empty(processed: &BTreeMap<Metric, Vec<LongRecord>>, metric: Metric) -> &[LongRecord] {
    match processed.get(&metric) {
        Some(records) => records,
        None => {
            warn!(%metric, "Series missing, merging as zeros");
            &[]
        }
    }
}

/// Merges whatever series were processed.
///
/// `confirmed` is required as the join base. A missing `deaths` or
/// `recovered` series is merged as all zeros.
#[tracing::instrument(skip(processed))]
pub fn merge_processed(
    processed: &BTreeMap<Metric, Vec<LongRecord>>,
) -> PipelineResult<Vec<MergedRecord>> {
    let confirmed = processed
        .get(&Metric::Confirmed)
        .ok_or(PipelineError::MissingMetric(Metric::Confirmed))?;

    let merged = merge(
        confirmed,
        series_or_empty(processed, Metric::Deaths),
        series_or_empty(processed, Metric::Recovered),
    );
    info!(records = merged.len(), "Merged series");
    Ok(merged)
}

/// Writes the merged table as CSV, gzip-compressed when `gzip` is set.
#[tracing::instrument(skip(records), fields(path = %path.display(), rows = records.len()))]
pub fn write_merged(path: &Path, records: &[MergedRecord], gzip: bool) -> PipelineResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    write_records(path, records, gzip)?;
    info!("Merged table written");
    Ok(())
}

/// Reads a merged table previously written by [`write_merged`].
pub fn read_merged(path: &Path) -> PipelineResult<Vec<MergedRecord>> {
    read_records(path)
}

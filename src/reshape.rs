//! Unpivots raw wide series into one record per (country, date).

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PipelineError, PipelineResult};
use crate::metric::Metric;
use crate::output::write_records;
use crate::parser::RawSeriesTable;

/// Country-level cumulative count for one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongRecord {
    pub country: String,
    pub date: NaiveDate,
    pub cases: i64,
    /// First non-missing latitude among the country's sub-locations.
    pub lat: Option<f64>,
    pub long: Option<f64>,
}

/// Collapses sub-locations into one record per (country, date).
///
/// Counts are summed. Coordinates come from the first sub-location row (in
/// source order) that has them; which one is authoritative is unspecified
/// upstream, so they are not averaged. Rows without a country are dropped.
/// Output is ordered by country, then date. A per-country total that
/// does not fit in an `i64` is a `CountOverflow` error.
pub fn reshape(table: &RawSeriesTable) -> PipelineResult<Vec<LongRecord>> {
    let mut groups: BTreeMap<(&str, NaiveDate), LongRecord> = BTreeMap::new();

    for (col, &date) in table.dates.iter().enumerate() {
        for row in table.rows.iter().filter(|r| !r.country.is_empty()) {
            let record = groups
                .entry((row.country.as_str(), date))
                .or_insert_with(|| LongRecord {
                    country: row.country.clone(),
                    date,
                    cases: 0,
                    lat: None,
                    long: None,
                });

            record.cases = record.cases.checked_add(row.counts[col]).ok_or_else(|| {
                PipelineError::CountOverflow {
                    metric: table.metric,
                    country: row.country.clone(),
                    date,
                }
            })?;
            record.lat = record.lat.or(row.lat);
            record.long = record.long.or(row.long);
        }
    }

    debug!(metric = %table.metric, records = groups.len(), "Reshaped series");
    Ok(groups.into_values().collect())
}

/// Reshapes every loaded table, optionally saving `<metric>_processed.csv`
/// files into `processed_dir`.
#[tracing::instrument(skip(tables), fields(processed_dir = %processed_dir.display()))]
pub fn preprocess(
    tables: &BTreeMap<Metric, RawSeriesTable>,
    save_processed: bool,
    processed_dir: &Path,
) -> PipelineResult<BTreeMap<Metric, Vec<LongRecord>>> {
    let mut processed = BTreeMap::new();

    if save_processed {
        fs::create_dir_all(processed_dir)?;
    }

    for (&metric, table) in tables {
        let records = reshape(table)?;

        if save_processed {
            let path = processed_dir.join(format!("{metric}_processed.csv"));
            write_records(&path, &records, false)?;
            info!(%metric, path = %path.display(), "Saved processed series");
        }

        processed.insert(metric, records);
    }

    Ok(processed)
}

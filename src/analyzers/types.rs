//! Data types returned by the analyzers.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::merge::MergedRecord;

/// All records for one country, sorted ascending by date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryTimeSeries {
    pub country: String,
    pub records: Vec<MergedRecord>,
}

impl CountryTimeSeries {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

/// A merged record extended with day-over-day deltas, growth rates and
/// 7-point trailing averages. `None` marks a value that is undefined at
/// that position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthRecord {
    pub country: String,
    pub date: NaiveDate,
    pub confirmed: i64,
    pub deaths: i64,
    pub recovered: i64,
    pub active: i64,
    pub death_rate: f64,
    pub daily_confirmed: Option<i64>,
    pub daily_deaths: Option<i64>,
    pub confirmed_growth_rate: Option<f64>,
    pub death_growth_rate: Option<f64>,
    pub confirmed_ma7: Option<f64>,
    pub deaths_ma7: Option<f64>,
}

/// Worldwide totals on a single date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalSummary {
    /// `None` only when the dataset is empty.
    pub date: Option<NaiveDate>,
    pub total_confirmed: i64,
    pub total_deaths: i64,
    pub total_recovered: i64,
    pub total_active: i64,
    pub global_death_rate: f64,
    pub country_count: usize,
}

/// Confirmed counts pivoted to one row per country and one column per date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapTable {
    pub dates: Vec<NaiveDate>,
    pub rows: Vec<HeatmapRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapRow {
    pub country: String,
    /// Aligned with [`HeatmapTable::dates`]; `None` where the country has no record.
    pub values: Vec<Option<i64>>,
}

/// A column of [`MergedRecord`] that can be charted per country.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    Confirmed,
    Deaths,
    Recovered,
    Active,
    DeathRate,
    RecoveryRate,
}

impl Measure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Measure::Confirmed => "confirmed",
            Measure::Deaths => "deaths",
            Measure::Recovered => "recovered",
            Measure::Active => "active",
            Measure::DeathRate => "death_rate",
            Measure::RecoveryRate => "recovery_rate",
        }
    }

    pub fn value(&self, record: &MergedRecord) -> f64 {
        match self {
            Measure::Confirmed => record.confirmed as f64,
            Measure::Deaths => record.deaths as f64,
            Measure::Recovered => record.recovered as f64,
            Measure::Active => record.active as f64,
            Measure::DeathRate => record.death_rate,
            Measure::RecoveryRate => record.recovery_rate,
        }
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Measure {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "confirmed" => Ok(Measure::Confirmed),
            "deaths" => Ok(Measure::Deaths),
            "recovered" => Ok(Measure::Recovered),
            "active" => Ok(Measure::Active),
            "death_rate" => Ok(Measure::DeathRate),
            "recovery_rate" => Ok(Measure::RecoveryRate),
            other => Err(format!("unknown measure '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// One measure over time for one country.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasureSeries {
    pub country: String,
    pub measure: Measure,
    pub points: Vec<SeriesPoint>,
}

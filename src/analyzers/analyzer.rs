use std::collections::{BTreeSet, HashMap};

use chrono::{Duration, NaiveDate};
use tracing::debug;

use crate::analyzers::types::{
    CountryTimeSeries, GlobalSummary, HeatmapRow, HeatmapTable, Measure, MeasureSeries,
    SeriesPoint,
};
use crate::merge::MergedRecord;
use crate::stats::pct;

/// Days covered by a heatmap when no start date is given.
pub const DEFAULT_HEATMAP_DAYS: i64 = 30;

/// Read-only queries over a merged table.
///
/// Every `as_of` parameter defaults to the latest date present in the data,
/// not today: the dataset usually lags real time.
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    data: Vec<MergedRecord>,
}

impl Analyzer {
    pub fn new(data: Vec<MergedRecord>) -> Self {
        Self { data }
    }

    pub fn records(&self) -> &[MergedRecord] {
        &self.data
    }

    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.data.iter().map(|r| r.date).max()
    }

    /// Distinct dates, ascending.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let dates: BTreeSet<_> = self.data.iter().map(|r| r.date).collect();
        dates.into_iter().collect()
    }

    /// Distinct country names, ascending.
    pub fn countries(&self) -> Vec<String> {
        let countries: BTreeSet<_> = self.data.iter().map(|r| r.country.as_str()).collect();
        countries.into_iter().map(str::to_string).collect()
    }

    fn resolve_date(&self, as_of: Option<NaiveDate>) -> Option<NaiveDate> {
        as_of.or_else(|| self.latest_date())
    }

    /// All records on `as_of` (default: latest date).
    pub fn snapshot(&self, as_of: Option<NaiveDate>) -> Vec<&MergedRecord> {
        match self.resolve_date(as_of) {
            Some(date) => self.data.iter().filter(|r| r.date == date).collect(),
            None => Vec::new(),
        }
    }

    /// The `n` countries with the most confirmed cases on `as_of`.
    ///
    /// Ties are broken by country name, ascending.
    pub fn top_by_confirmed(&self, n: usize, as_of: Option<NaiveDate>) -> Vec<MergedRecord> {
        let mut rows = self.snapshot(as_of);
        rows.sort_by(|a, b| {
            b.confirmed
                .cmp(&a.confirmed)
                .then_with(|| a.country.cmp(&b.country))
        });
        rows.into_iter().take(n).cloned().collect()
    }

    /// The `n` highest death rates on `as_of` among countries with at least
    /// `min_confirmed` cases.
    ///
    /// The threshold suppresses the noisy rates of small case counts. Ties
    /// are broken by country name, ascending.
    pub fn top_by_death_rate(
        &self,
        n: usize,
        min_confirmed: i64,
        as_of: Option<NaiveDate>,
    ) -> Vec<MergedRecord> {
        let mut rows: Vec<_> = self
            .snapshot(as_of)
            .into_iter()
            .filter(|r| r.confirmed >= min_confirmed)
            .collect();
        rows.sort_by(|a, b| {
            b.death_rate
                .total_cmp(&a.death_rate)
                .then_with(|| a.country.cmp(&b.country))
        });
        rows.into_iter().take(n).cloned().collect()
    }

    /// Every record for `country`, sorted by date. Empty for an unknown country.
    pub fn country_time_series(&self, country: &str) -> CountryTimeSeries {
        let mut records: Vec<_> = self
            .data
            .iter()
            .filter(|r| r.country == country)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.date);

        if records.is_empty() {
            debug!(country, "No records for country");
        }

        CountryTimeSeries {
            country: country.to_string(),
            records,
        }
    }

    /// Worldwide totals on `as_of`.
    pub fn global_summary(&self, as_of: Option<NaiveDate>) -> GlobalSummary {
        let date = self.resolve_date(as_of);
        let rows = self.snapshot(date);

        let total_confirmed = rows.iter().map(|r| r.confirmed).sum();
        let total_deaths = rows.iter().map(|r| r.deaths).sum();
        let countries: BTreeSet<_> = rows.iter().map(|r| r.country.as_str()).collect();

        GlobalSummary {
            date,
            total_confirmed,
            total_deaths,
            total_recovered: rows.iter().map(|r| r.recovered).sum(),
            total_active: rows.iter().map(|r| r.active).sum(),
            global_death_rate: pct(total_deaths, total_confirmed),
            country_count: countries.len(),
        }
    }

    /// Confirmed counts for `countries` pivoted over the dates in
    /// `[start, end]`.
    ///
    /// `end` defaults to the latest date. `start` defaults to
    /// [`DEFAULT_HEATMAP_DAYS`] before the latest date, whatever `end` is.
    /// Rows keep the requested order.
    pub fn heatmap(
        &self,
        countries: &[String],
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> HeatmapTable {
        let Some(latest) = self.latest_date() else {
            return HeatmapTable {
                dates: Vec::new(),
                rows: Vec::new(),
            };
        };
        let end = end.unwrap_or(latest);
        let start = start.unwrap_or(latest - Duration::days(DEFAULT_HEATMAP_DAYS));

        let in_range: Vec<_> = self
            .data
            .iter()
            .filter(|r| r.date >= start && r.date <= end)
            .filter(|r| countries.contains(&r.country))
            .collect();

        let dates: Vec<NaiveDate> = in_range
            .iter()
            .map(|r| r.date)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let cells: HashMap<(&str, NaiveDate), i64> = in_range
            .iter()
            .map(|r| ((r.country.as_str(), r.date), r.confirmed))
            .collect();

        let rows = countries
            .iter()
            .map(|country| HeatmapRow {
                country: country.clone(),
                values: dates
                    .iter()
                    .map(|&date| cells.get(&(country.as_str(), date)).copied())
                    .collect(),
            })
            .collect();

        HeatmapTable { dates, rows }
    }

    /// One `measure` series per requested country, each sorted by date.
    pub fn compare(&self, countries: &[String], measure: Measure) -> Vec<MeasureSeries> {
        countries
            .iter()
            .map(|country| MeasureSeries {
                country: country.clone(),
                measure,
                points: self
                    .country_time_series(country)
                    .records
                    .iter()
                    .map(|r| SeriesPoint {
                        date: r.date,
                        value: measure.value(r),
                    })
                    .collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 6, day).unwrap()
    }

    fn rec(country: &str, date: NaiveDate, confirmed: i64, deaths: i64) -> MergedRecord {
        MergedRecord::new(country, date, confirmed, deaths, 0, 0.0, 0.0)
    }

    fn names(rows: &[MergedRecord]) -> Vec<&str> {
        rows.iter().map(|r| r.country.as_str()).collect()
    }

    fn ranking_fixture() -> Analyzer {
        Analyzer::new(vec![
            // an earlier date with a different order must not leak in
            rec("F", d(1), 9999, 0),
            rec("A", d(2), 1000, 10),
            rec("B", d(2), 500, 5),
            rec("C", d(2), 2000, 20),
            rec("D", d(2), 300, 3),
            rec("E", d(2), 100, 1),
            rec("F", d(2), 50, 0),
        ])
    }

    #[test]
    fn test_snapshot_defaults_to_latest_date() {
        let analyzer = ranking_fixture();

        let latest = analyzer.snapshot(None);
        assert_eq!(latest.len(), 6);
        assert!(latest.iter().all(|r| r.date == d(2)));

        let first = analyzer.snapshot(Some(d(1)));
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].country, "F");

        assert!(analyzer.snapshot(Some(d(3))).is_empty());
        assert!(Analyzer::default().snapshot(None).is_empty());
    }

    #[test]
    fn test_top_by_confirmed() {
        let top = ranking_fixture().top_by_confirmed(5, None);
        assert_eq!(names(&top), vec!["C", "A", "B", "D", "E"]);
    }

    #[test]
    fn test_top_by_confirmed_as_of_date() {
        let top = ranking_fixture().top_by_confirmed(1, Some(d(1)));
        assert_eq!(names(&top), vec!["F"]);
    }

    #[test]
    fn test_top_by_confirmed_ties_by_country() {
        let analyzer = Analyzer::new(vec![
            rec("Zambia", d(1), 10, 0),
            rec("Angola", d(1), 10, 0),
            rec("Malta", d(1), 10, 0),
        ]);
        let top = analyzer.top_by_confirmed(3, None);
        assert_eq!(names(&top), vec!["Angola", "Malta", "Zambia"]);
    }

    #[test]
    fn test_top_by_death_rate_respects_min_confirmed() {
        let analyzer = Analyzer::new(vec![
            rec("Tiny", d(1), 999, 500),
            rec("Big", d(1), 1000, 30),
            rec("Bigger", d(1), 5000, 250),
            rec("Biggest", d(1), 20000, 100),
        ]);

        let top = analyzer.top_by_death_rate(3, 1000, None);

        assert_eq!(names(&top), vec!["Bigger", "Big", "Biggest"]);
        assert!(top.iter().all(|r| r.confirmed >= 1000));
    }

    #[test]
    fn test_country_time_series_sorted() {
        let analyzer = Analyzer::new(vec![
            rec("Kenya", d(3), 30, 0),
            rec("Kenya", d(1), 10, 0),
            rec("Ghana", d(2), 5, 0),
            rec("Kenya", d(2), 20, 0),
        ]);

        let series = analyzer.country_time_series("Kenya");

        assert_eq!(series.len(), 3);
        let dates: Vec<_> = series.records.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![d(1), d(2), d(3)]);
    }

    #[test]
    fn test_country_time_series_unknown_is_empty() {
        let series = ranking_fixture().country_time_series("Atlantis");
        assert!(series.is_empty());
    }

    #[test]
    fn test_global_summary() {
        let analyzer = Analyzer::new(vec![rec("X", d(1), 100, 5), rec("Y", d(1), 200, 10)]);

        let summary = analyzer.global_summary(None);

        assert_eq!(summary.date, Some(d(1)));
        assert_eq!(summary.total_confirmed, 300);
        assert_eq!(summary.total_deaths, 15);
        assert_eq!(summary.total_active, 285);
        assert_eq!(summary.global_death_rate, 5.00);
        assert_eq!(summary.country_count, 2);
    }

    #[test]
    fn test_global_summary_empty_and_zero() {
        let empty = Analyzer::default().global_summary(None);
        assert_eq!(empty.date, None);
        assert_eq!(empty.global_death_rate, 0.0);
        assert_eq!(empty.country_count, 0);

        let zero = Analyzer::new(vec![rec("X", d(1), 0, 0)]).global_summary(None);
        assert_eq!(zero.global_death_rate, 0.0);
        assert_eq!(zero.country_count, 1);
    }

    #[test]
    fn test_heatmap_defaults_and_gaps() {
        let analyzer = Analyzer::new(vec![
            rec("A", NaiveDate::from_ymd_opt(2021, 4, 1).unwrap(), 1, 0),
            rec("A", d(1), 10, 0),
            rec("A", d(2), 20, 0),
            rec("B", d(2), 7, 0),
            rec("C", d(2), 99, 0),
        ]);
        let countries = vec!["B".to_string(), "A".to_string()];

        let heatmap = analyzer.heatmap(&countries, None, None);

        // April 1st is more than 30 days before the latest date
        assert_eq!(heatmap.dates, vec![d(1), d(2)]);
        assert_eq!(heatmap.rows[0].country, "B");
        assert_eq!(heatmap.rows[0].values, vec![None, Some(7)]);
        assert_eq!(heatmap.rows[1].values, vec![Some(10), Some(20)]);
    }

    #[test]
    fn test_heatmap_default_start_follows_latest_date() {
        let may = |day| NaiveDate::from_ymd_opt(2021, 5, day).unwrap();
        let analyzer = Analyzer::new(vec![
            rec("A", may(2), 5, 0),
            rec("A", may(3), 6, 0),
            rec("A", d(1), 10, 0),
            rec("A", d(2), 20, 0),
        ]);
        let countries = vec!["A".to_string()];

        // latest is June 2nd, so the window opens on May 3rd even with an earlier end
        let heatmap = analyzer.heatmap(&countries, None, Some(d(1)));

        assert_eq!(heatmap.dates, vec![may(3), d(1)]);
        assert_eq!(heatmap.rows[0].values, vec![Some(6), Some(10)]);
    }

    #[test]
    fn test_compare_measure() {
        let analyzer = Analyzer::new(vec![rec("A", d(2), 200, 4), rec("A", d(1), 100, 1)]);
        let countries = vec!["A".to_string(), "Nowhere".to_string()];

        let series = analyzer.compare(&countries, Measure::DeathRate);

        assert_eq!(series.len(), 2);
        let values: Vec<_> = series[0].points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![1.0, 2.0]);
        assert!(series[1].points.is_empty());
    }

    #[test]
    fn test_dates_and_countries_distinct() {
        let analyzer = ranking_fixture();
        assert_eq!(analyzer.dates(), vec![d(1), d(2)]);
        assert_eq!(analyzer.countries(), vec!["A", "B", "C", "D", "E", "F"]);
    }
}

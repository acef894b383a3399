use std::path::PathBuf;

use chrono::NaiveDate;
use covid_trends::analyzers::{Analyzer, derive_growth};
use covid_trends::merge::{merge_processed, read_merged, write_merged};
use covid_trends::metric::Metric;
use covid_trends::parser::load_data;
use covid_trends::reshape::preprocess;

fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/raw")
}

fn march(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 3, day).unwrap()
}

fn run_pipeline(scratch: &std::path::Path) -> Analyzer {
    let tables = load_data(&fixtures())
        .into_iter()
        .map(|(metric, table)| (metric, table.expect("fixture should parse")))
        .collect();

    let processed = preprocess(&tables, true, &scratch.join("processed")).unwrap();
    let merged = merge_processed(&processed).unwrap();

    let path = scratch.join("processed/merged_covid_data.csv");
    write_merged(&path, &merged, false).unwrap();

    Analyzer::new(read_merged(&path).unwrap())
}

#[test]
fn test_full_pipeline() {
    let scratch = tempfile::tempdir().unwrap();
    let analyzer = run_pipeline(scratch.path());

    assert_eq!(analyzer.latest_date(), Some(march(10)));
    assert_eq!(analyzer.countries(), vec!["Australia", "France", "Italy"]);
    assert_eq!(analyzer.records().len(), 30);

    for name in ["confirmed", "deaths", "recovered"] {
        assert!(scratch.path().join(format!("processed/{name}_processed.csv")).exists());
    }
}

#[test]
fn test_reshape_conserves_fixture_totals() {
    let data = load_data(&fixtures());
    let table = data[&Metric::Confirmed].as_ref().unwrap();
    let records = covid_trends::reshape::reshape(table).unwrap();

    for (idx, date) in table.dates.iter().enumerate() {
        let total: i64 = records.iter().filter(|r| r.date == *date).map(|r| r.cases).sum();
        assert_eq!(total, table.column_total(idx));
    }
}

#[test]
fn test_rankings_and_summary() {
    let scratch = tempfile::tempdir().unwrap();
    let analyzer = run_pipeline(scratch.path());

    let top: Vec<_> = analyzer
        .top_by_confirmed(3, None)
        .into_iter()
        .map(|r| (r.country, r.confirmed))
        .collect();
    assert_eq!(
        top,
        vec![
            ("Italy".to_string(), 10149),
            ("France".to_string(), 1214),
            ("Australia".to_string(), 32),
        ]
    );

    let deadly: Vec<_> = analyzer
        .top_by_death_rate(10, 1000, None)
        .into_iter()
        .map(|r| (r.country, r.death_rate))
        .collect();
    assert_eq!(
        deadly,
        vec![("Italy".to_string(), 6.22), ("France".to_string(), 1.57)]
    );

    let summary = analyzer.global_summary(None);
    assert_eq!(summary.total_confirmed, 11395);
    assert_eq!(summary.total_deaths, 652);
    assert_eq!(summary.total_recovered, 17);
    assert_eq!(summary.total_active, 10726);
    assert_eq!(summary.global_death_rate, 5.72);
    assert_eq!(summary.country_count, 3);
}

#[test]
fn test_left_join_behaviour() {
    let scratch = tempfile::tempdir().unwrap();
    let analyzer = run_pipeline(scratch.path());

    // only present in the deaths series
    assert!(analyzer.country_time_series("Atlantis").is_empty());

    // no recovered rows for Italy
    let italy = analyzer.country_time_series("Italy");
    assert!(italy.records.iter().all(|r| r.recovered == 0 && r.recovery_rate == 0.0));
    assert!(italy
        .records
        .iter()
        .all(|r| r.active == r.confirmed - r.deaths - r.recovered));
}

#[test]
fn test_country_growth() {
    let scratch = tempfile::tempdir().unwrap();
    let analyzer = run_pipeline(scratch.path());

    let growth = derive_growth(&analyzer.country_time_series("Italy"));

    assert_eq!(growth.len(), 10);
    assert_eq!(growth[0].daily_confirmed, None);
    assert_eq!(growth[1].daily_confirmed, Some(342));
    assert_eq!(growth[1].confirmed_growth_rate, Some(20.19));
    assert!(growth[..7].iter().all(|g| g.confirmed_ma7.is_none()));
    assert_eq!(growth[7].confirmed_ma7, Some(5681.0 / 7.0));
}

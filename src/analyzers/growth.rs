use crate::analyzers::types::{CountryTimeSeries, GrowthRecord};
use crate::stats::{mean, round2};

/// Window of the trailing moving averages.
pub const MA_WINDOW: usize = 7;

/// Derives daily deltas, growth rates and 7-point moving averages for a
/// country series.
///
/// The input is not modified; records are re-sorted by date in the copy.
/// Position 0 has no delta or growth rate. A growth rate is also undefined
/// when the previous value is zero. A moving average is defined only once
/// its whole window of daily deltas is defined, so the first seven
/// positions are `None`.
pub fn derive_growth(series: &CountryTimeSeries) -> Vec<GrowthRecord> {
    let mut records = series.records.clone();
    records.sort_by_key(|r| r.date);

    let confirmed: Vec<i64> = records.iter().map(|r| r.confirmed).collect();
    let deaths: Vec<i64> = records.iter().map(|r| r.deaths).collect();

    let daily_confirmed = deltas(&confirmed);
    let daily_deaths = deltas(&deaths);
    let confirmed_growth = growth_rates(&confirmed);
    let death_growth = growth_rates(&deaths);
    let confirmed_ma7 = trailing_mean(&daily_confirmed, MA_WINDOW);
    let deaths_ma7 = trailing_mean(&daily_deaths, MA_WINDOW);

    records
        .into_iter()
        .enumerate()
        .map(|(i, r)| GrowthRecord {
            country: r.country,
            date: r.date,
            confirmed: r.confirmed,
            deaths: r.deaths,
            recovered: r.recovered,
            active: r.active,
            death_rate: r.death_rate,
            daily_confirmed: daily_confirmed[i],
            daily_deaths: daily_deaths[i],
            confirmed_growth_rate: confirmed_growth[i],
            death_growth_rate: death_growth[i],
            confirmed_ma7: confirmed_ma7[i],
            deaths_ma7: deaths_ma7[i],
        })
        .collect()
}

fn deltas(values: &[i64]) -> Vec<Option<i64>> {
    if values.is_empty() {
        return Vec::new();
    }
    std::iter::once(None)
        .chain(values.windows(2).map(|w| Some(w[1] - w[0])))
        .collect()
}

fn growth_rates(values: &[i64]) -> Vec<Option<f64>> {
    if values.is_empty() {
        return Vec::new();
    }
    std::iter::once(None)
        .chain(values.windows(2).map(|w| {
            let (prev, cur) = (w[0], w[1]);
            (prev != 0).then(|| round2((cur - prev) as f64 / prev as f64 * 100.0))
        }))
        .collect()
}

fn trailing_mean(values: &[Option<i64>], window: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                return None;
            }
            let slice = &values[i + 1 - window..=i];
            let defined: Option<Vec<f64>> = slice.iter().map(|v| v.map(|v| v as f64)).collect();
            defined.map(|v| mean(&v))
        })
        .collect()
}

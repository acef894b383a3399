//! The three cumulative series published by the CSSE repository.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Metric {
    Confirmed,
    Deaths,
    Recovered,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Confirmed, Metric::Deaths, Metric::Recovered];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Confirmed => "confirmed",
            Metric::Deaths => "deaths",
            Metric::Recovered => "recovered",
        }
    }

    /// File name of the series in the upstream repository.
    pub fn remote_filename(&self) -> String {
        format!("time_series_covid19_{}_global.csv", self.as_str())
    }

    /// File name written by the downloader, prefixed with the metric.
    pub fn local_filename(&self) -> String {
        format!("{}_{}", self.as_str(), self.remote_filename())
    }

    /// Whether a directory entry looks like this metric's raw series.
    ///
    /// Matching is by substring so upstream renames that keep the metric
    /// name and `time_series` marker are still picked up.
    pub fn matches_filename(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        (name.ends_with(".csv") || name.ends_with(".csv.gz"))
            && name.contains("time_series")
            && name.contains(self.as_str())
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//! Read-only queries and derived statistics over the merged table.
//!
//! [`Analyzer`] answers snapshot queries (rankings, global totals, per-country
//! series, heatmap pivots). [`derive_growth`] turns a country series into
//! daily deltas, growth rates and moving averages.

pub mod analyzer;
pub mod growth;
pub mod types;

pub use analyzer::Analyzer;
pub use growth::derive_growth;

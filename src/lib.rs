pub mod analyzers;
pub mod error;
pub mod fetch;
pub mod merge;
pub mod metric;
pub mod output;
pub mod parser;
pub mod reshape;
pub mod stats;

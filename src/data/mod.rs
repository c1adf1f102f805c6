pub mod features;
pub mod historical;

pub use features::{FeatureProvisioner, FeatureVector};
pub use historical::{HistoricalPoint, HistoricalStore};

use csv::StringRecord;

/// Position of `name` among the CSV headers.
fn column_index(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim() == name)
}

/// Numeric CSV cell; empty cells and non-finite values count as missing.
fn parse_cell(record: &StringRecord, index: usize) -> Option<f64> {
    record
        .get(index)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

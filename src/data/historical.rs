use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::path::PathBuf;
use tracing::warn;

use super::{column_index, parse_cell};
use crate::config::DataConfig;
use crate::format::format_amount;

#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalPoint {
    pub year: i32,
    pub quarter: i32,
    pub value: f64,
}

impl Serialize for HistoricalPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("HistoricalPoint", 4)?;
        s.serialize_field("year", &self.year)?;
        s.serialize_field("quarter", &self.quarter)?;
        s.serialize_field("sales", &self.value)?;
        s.serialize_field("sales_formatted", &format_amount(self.value))?;
        s.end()
    }
}

/// Same-quarter actuals from earlier years.
#[derive(Debug, Clone)]
pub struct HistoricalStore {
    path: PathBuf,
    year_column: String,
    quarter_column: String,
    target_column: String,
}

impl HistoricalStore {
    pub fn new(config: &DataConfig) -> Self {
        Self {
            path: config.history_file.clone(),
            year_column: config.year_column.clone(),
            quarter_column: config.quarter_column.clone(),
            target_column: config.target_column.clone(),
        }
    }

    /// Up to `years_back` points for `quarter` in the years before `year`,
    /// most recent first. Years without data are skipped; a missing or
    /// unreadable dataset yields no points.
    pub fn lookup(&self, year: i32, quarter: i32, years_back: u32) -> Vec<HistoricalPoint> {
        let rows = match self.read_rows() {
            Ok(rows) => rows,
            Err(reason) => {
                warn!("Historical data unavailable ({}): {}", self.path.display(), reason);
                return Vec::new();
            }
        };

        (1..=years_back as i32)
            .filter_map(|offset| year.checked_sub(offset))
            .filter_map(|target_year| {
                rows.iter()
                    .find(|p| p.year == target_year && p.quarter == quarter)
                    .cloned()
            })
            .collect()
    }

    fn read_rows(&self) -> Result<Vec<HistoricalPoint>, String> {
        let mut reader = csv::Reader::from_path(&self.path).map_err(|e| e.to_string())?;
        let headers = reader.headers().map_err(|e| e.to_string())?.clone();

        let locate = |name: &str| column_index(&headers, name).ok_or_else(|| format!("no column {}", name));
        let year_idx = locate(&self.year_column)?;
        let quarter_idx = locate(&self.quarter_column)?;
        let target_idx = locate(&self.target_column)?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| e.to_string())?;
            // rows lacking any of the three fields are dropped
            let (Some(y), Some(q), Some(value)) = (
                parse_cell(&record, year_idx),
                parse_cell(&record, quarter_idx),
                parse_cell(&record, target_idx),
            ) else {
                continue;
            };
            if !(1.0..=4.0).contains(&q) {
                continue;
            }
            rows.push(HistoricalPoint {
                year: y.round() as i32,
                quarter: q.round() as i32,
                value,
            });
        }
        Ok(rows)
    }
}

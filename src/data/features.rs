use std::path::PathBuf;
use tracing::debug;

use super::{column_index, parse_cell};
use crate::config::DataConfig;
use crate::error::FeatureError;

/// Reduced-dimension input shared by every point-estimate model.
pub type FeatureVector = Vec<f64>;

/// Serves the latest row of the pre-computed reduced-feature dataset.
///
/// The snapshot does not depend on the quarter being forecast: point-estimate
/// models always see current conditions.
#[derive(Debug, Clone)]
pub struct FeatureProvisioner {
    path: PathBuf,
    columns: Vec<String>,
}

impl FeatureProvisioner {
    pub fn new(config: &DataConfig) -> Self {
        Self {
            path: config.features_file.clone(),
            columns: config.feature_columns.clone(),
        }
    }

    pub fn current_features(&self) -> Result<FeatureVector, FeatureError> {
        let unavailable =
            |reason: String| FeatureError::SourceUnavailable(format!("{}: {}", self.path.display(), reason));

        let mut reader = csv::Reader::from_path(&self.path).map_err(|e| unavailable(e.to_string()))?;
        let headers = reader.headers().map_err(|e| unavailable(e.to_string()))?.clone();

        let indices = self
            .columns
            .iter()
            .map(|c| column_index(&headers, c).ok_or_else(|| unavailable(format!("no column {}", c))))
            .collect::<Result<Vec<usize>, _>>()?;

        let mut last = None;
        for record in reader.records() {
            last = Some(record.map_err(|e| unavailable(e.to_string()))?);
        }
        let row = last.ok_or_else(|| unavailable("dataset is empty".to_string()))?;

        let features = indices
            .iter()
            .zip(&self.columns)
            .map(|(&i, c)| parse_cell(&row, i).ok_or_else(|| unavailable(format!("latest {} is not numeric", c))))
            .collect::<Result<FeatureVector, _>>()?;

        debug!("Feature snapshot with {} components", features.len());
        Ok(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn provisioner(file: &NamedTempFile, columns: &[&str]) -> FeatureProvisioner {
        FeatureProvisioner {
            path: file.path().to_path_buf(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn takes_last_row_in_configured_order() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Year,PC2,PC1,target").unwrap();
        writeln!(file, "2023,0.1,0.2,100").unwrap();
        writeln!(file, "2024,-1.5,3.25,200").unwrap();

        let features = provisioner(&file, &["PC1", "PC2"]).current_features().unwrap();
        assert_eq!(features, vec![3.25, -1.5]);
    }

    #[test]
    fn empty_dataset_is_unavailable() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "PC1,PC2").unwrap();

        assert!(matches!(
            provisioner(&file, &["PC1", "PC2"]).current_features(),
            Err(FeatureError::SourceUnavailable(_))
        ));
    }

    #[test]
    fn missing_column_is_unavailable() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "PC1\n1.0").unwrap();

        assert!(provisioner(&file, &["PC1", "PC6"]).current_features().is_err());
    }

    #[test]
    fn missing_file_is_unavailable() {
        let provisioner = FeatureProvisioner {
            path: PathBuf::from("/nonexistent/pca_features.csv"),
            columns: vec!["PC1".to_string()],
        };
        assert!(provisioner.current_features().is_err());
    }
}

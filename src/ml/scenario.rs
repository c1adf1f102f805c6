use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::format::format_amount;
use crate::registry::Metrics;

pub const DEFAULT_MAE: f64 = 0.0;
pub const DEFAULT_MAPE: f64 = 10.0;

/// Optimistic/base/pessimistic triple around a point prediction.
///
/// The band is `point ± 0.5 * test_mae`. `test_mape` is carried as the
/// reported uncertainty only and does not affect the bounds. Bounds are not
/// clamped at zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScenarioBand {
    pub optimistic: f64,
    pub base: f64,
    pub pessimistic: f64,
    pub uncertainty_mape: f64,
    pub uncertainty_mae: f64,
}

impl ScenarioBand {
    pub fn from_prediction(point: f64, metrics: &Metrics) -> Self {
        let mae = metrics.get_or("test_mae", DEFAULT_MAE);
        let mape = metrics.get_or("test_mape", DEFAULT_MAPE);
        let half = 0.5 * mae;

        Self {
            optimistic: point + half,
            base: point,
            pessimistic: point - half,
            uncertainty_mape: mape,
            uncertainty_mae: mae,
        }
    }

    pub fn width(&self) -> f64 {
        self.optimistic - self.pessimistic
    }
}

impl Serialize for ScenarioBand {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ScenarioBand", 8)?;
        s.serialize_field("optimistic", &self.optimistic)?;
        s.serialize_field("optimistic_formatted", &format_amount(self.optimistic))?;
        s.serialize_field("base", &self.base)?;
        s.serialize_field("base_formatted", &format_amount(self.base))?;
        s.serialize_field("pessimistic", &self.pessimistic)?;
        s.serialize_field("pessimistic_formatted", &format_amount(self.pessimistic))?;
        s.serialize_field("uncertainty_mape", &self.uncertainty_mape)?;
        s.serialize_field("uncertainty_mae", &self.uncertainty_mae)?;
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn metrics(pairs: &[(&str, f64)]) -> Metrics {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn band_uses_half_mae_each_side() {
        let band = ScenarioBand::from_prediction(1000.0, &metrics(&[("test_mae", 100.0), ("test_mape", 4.2)]));
        assert_eq!(band.optimistic, 1050.0);
        assert_eq!(band.base, 1000.0);
        assert_eq!(band.pessimistic, 950.0);
        assert_eq!(band.uncertainty_mape, 4.2);
        assert_eq!(band.uncertainty_mae, 100.0);
    }

    #[test]
    fn missing_metrics_collapse_band_and_report_default_mape() {
        let band = ScenarioBand::from_prediction(42.0, &Metrics::default());
        assert_eq!(band.optimistic, 42.0);
        assert_eq!(band.pessimistic, 42.0);
        assert_eq!(band.uncertainty_mape, DEFAULT_MAPE);
    }

    #[test]
    fn mape_never_moves_the_band() {
        let low = ScenarioBand::from_prediction(500.0, &metrics(&[("test_mae", 10.0), ("test_mape", 1.0)]));
        let high = ScenarioBand::from_prediction(500.0, &metrics(&[("test_mae", 10.0), ("test_mape", 90.0)]));
        assert_eq!(low.optimistic, high.optimistic);
        assert_eq!(low.pessimistic, high.pessimistic);
    }

    #[test]
    fn pessimistic_may_go_negative() {
        let band = ScenarioBand::from_prediction(10.0, &metrics(&[("test_mae", 100.0)]));
        assert_eq!(band.pessimistic, -40.0);
    }

    #[test]
    fn serializes_formatted_fields() {
        let band = ScenarioBand::from_prediction(1000.0, &metrics(&[("test_mae", 100.0)]));
        let json = serde_json::to_value(band).unwrap();
        assert_eq!(json["optimistic"], 1050.0);
        assert_eq!(json["optimistic_formatted"], "1,050.00");
        assert_eq!(json["pessimistic_formatted"], "950.00");
        assert_eq!(json["uncertainty_mape"], 10.0);
    }

    proptest! {
        #[test]
        fn band_width_equals_mae(point in -1e6f64..1e6, mae in 0.0f64..1e5) {
            let band = ScenarioBand::from_prediction(point, &metrics(&[("test_mae", mae)]));
            prop_assert!((band.width() - mae).abs() <= 1e-6 * (1.0 + point.abs()));
            prop_assert!(((band.optimistic - point) - (point - band.pessimistic)).abs() <= 1e-6 * (1.0 + point.abs()));
        }

        #[test]
        fn wider_mae_gives_wider_band(point in -1e6f64..1e6, mae in 0.0f64..1e4, extra in 1.0f64..1e4) {
            let narrow = ScenarioBand::from_prediction(point, &metrics(&[("test_mae", mae)]));
            let wide = ScenarioBand::from_prediction(point, &metrics(&[("test_mae", mae + extra)]));
            prop_assert!(wide.width() > narrow.width());
        }
    }
}

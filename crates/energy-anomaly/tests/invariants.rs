//! Properties that hold for arbitrary numeric input.

use energy_anomaly::{Algorithm, Column, DetectionConfig, FeatureMatrix, TimeSeriesTable};
use proptest::prelude::*;

fn cell() -> impl Strategy<Value = f64> {
    prop_oneof![
        8 => -1.0e4..1.0e4f64,
        1 => Just(f64::NAN),
    ]
}

fn series() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(cell(), 3..80).prop_filter("needs a finite value", |v| {
        v.iter().any(|x| x.is_finite())
    })
}

fn table(values: &[f64]) -> TimeSeriesTable {
    let stamps: Vec<f64> = (0..values.len()).map(|i| i as f64 * 3600.0).collect();
    TimeSeriesTable::from_columns(vec![
        Column::numeric("timestamp", &stamps),
        Column::numeric("load_kw", values),
    ])
    .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn count_matches_flags_and_rows_align(values in series()) {
        let t = table(&values);
        let config = DetectionConfig::default();
        for algorithm in Algorithm::ALL {
            let (result, metrics) = config
                .detector(algorithm)
                .detect_anomalies(&t, Some("timestamp"), Some("load_kw"))
                .unwrap();
            prop_assert_eq!(result.len(), values.len());
            prop_assert_eq!(result.anomaly_score.len(), values.len());
            prop_assert_eq!(metrics.total_points, values.len());
            prop_assert_eq!(
                metrics.anomaly_count,
                result.is_anomaly.iter().map(|&f| usize::from(f)).sum::<usize>()
            );
            prop_assert!(result.is_anomaly.iter().all(|&f| f <= 1));
            prop_assert!(result.anomaly_score.iter().all(|s| s.is_finite()));
            if let Some(clusters) = &result.cluster {
                prop_assert_eq!(clusters.len(), values.len());
            }
        }
    }

    #[test]
    fn detection_is_deterministic(values in series()) {
        let t = table(&values);
        let config = DetectionConfig::default();
        for algorithm in Algorithm::ALL {
            let detector = config.detector(algorithm);
            let (a, _) = detector.detect_anomalies(&t, None, None).unwrap();
            let (b, _) = detector.detect_anomalies(&t, None, None).unwrap();
            prop_assert_eq!(a.is_anomaly, b.is_anomaly);
            prop_assert_eq!(a.anomaly_score, b.anomaly_score);
        }
    }

    #[test]
    fn feature_matrices_are_always_finite(values in series()) {
        let m = FeatureMatrix::from_columns(vec![("v".to_string(), values.clone())]).unwrap();
        prop_assert!(m.is_finite());
        prop_assert!(m.standardize().is_finite());
    }
}

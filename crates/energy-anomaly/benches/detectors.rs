//! Criterion benchmarks for the detectors on a 1000-row hourly series.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use energy_anomaly::sample::{self, SampleConfig, SAMPLE_TIME_COLUMN, SAMPLE_VALUE_COLUMN};
use energy_anomaly::{Algorithm, DetectionConfig, PreprocessConfig, Preprocessor};

fn bench_detectors(c: &mut Criterion) {
    let series = sample::generate(&SampleConfig::default()).expect("sample series");
    let config = DetectionConfig::default();

    let mut group = c.benchmark_group("detect_1000_rows");
    group.sample_size(20);
    for algorithm in Algorithm::ALL {
        let detector = config.detector(algorithm);
        group.bench_function(algorithm.as_str(), |b| {
            b.iter(|| {
                detector
                    .detect_anomalies(
                        black_box(&series.table),
                        Some(SAMPLE_TIME_COLUMN),
                        Some(SAMPLE_VALUE_COLUMN),
                    )
                    .expect("detection")
            })
        });
    }
    group.finish();
}

fn bench_preprocess(c: &mut Criterion) {
    let series = sample::generate(&SampleConfig::default()).expect("sample series");
    let preprocessor = Preprocessor::new(PreprocessConfig::default());
    c.bench_function("preprocess_1000_rows", |b| {
        b.iter(|| {
            preprocessor
                .preprocess(
                    black_box(&series.table),
                    Some(SAMPLE_TIME_COLUMN),
                    Some(SAMPLE_VALUE_COLUMN),
                )
                .expect("preprocess")
        })
    });
}

criterion_group!(benches, bench_detectors, bench_preprocess);
criterion_main!(benches);

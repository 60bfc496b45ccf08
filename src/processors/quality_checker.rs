use std::collections::HashMap;

use crate::models::{Source, SourceStream};
use crate::processors::stream_merger::TimeSignature;
use crate::readers::TelemetryData;

/// Data-quality facts about one stream, gathered before merging. None of
/// these are fatal on their own; they explain what the merge will do.
#[derive(Debug, Clone, Default)]
pub struct StreamStatistics {
    pub samples: usize,
    pub fields: usize,
    pub time_range: Option<(i64, i64)>,
    pub out_of_order: usize,
    pub duplicate_timestamps: usize,
    pub signature: Option<TimeSignature>,
}

#[derive(Debug, Clone)]
pub struct QualityReport {
    pub total_samples: usize,
    pub stream_statistics: HashMap<Source, StreamStatistics>,
}

impl QualityReport {
    pub fn has_defects(&self) -> bool {
        self.stream_statistics
            .values()
            .any(|s| s.out_of_order > 0 || s.duplicate_timestamps > 0 || s.samples == 0)
    }
}

pub struct QualityChecker;

impl QualityChecker {
    pub fn new() -> Self {
        Self
    }

    pub fn check(&self, data: &TelemetryData) -> QualityReport {
        let mut stream_statistics = HashMap::new();
        let mut total_samples = 0;

        for source in Source::ALL {
            let stats = self.check_stream(data.stream(source));
            total_samples += stats.samples;
            stream_statistics.insert(source, stats);
        }

        QualityReport {
            total_samples,
            stream_statistics,
        }
    }

    fn check_stream(&self, stream: &SourceStream) -> StreamStatistics {
        let samples = &stream.samples;

        let out_of_order = samples
            .windows(2)
            .filter(|w| w[1].timestamp < w[0].timestamp)
            .count();

        let mut sorted: Vec<i64> = samples.iter().map(|s| s.timestamp).collect();
        sorted.sort_unstable();
        let distinct = {
            let mut d = sorted.clone();
            d.dedup();
            d.len()
        };

        let time_range = stream.time_range();
        let signature = time_range.map(|(_, max_ts)| TimeSignature::classify(max_ts));

        StreamStatistics {
            samples: samples.len(),
            fields: stream.schema.len(),
            time_range,
            out_of_order,
            duplicate_timestamps: samples.len() - distinct,
            signature,
        }
    }

    pub fn generate_summary(&self, report: &QualityReport) -> String {
        let mut summary = String::new();
        summary.push_str("Stream Quality Report\n");
        summary.push_str("=====================\n");
        summary.push_str(&format!("Total samples: {}\n", report.total_samples));

        for source in Source::ALL {
            let stats = &report.stream_statistics[&source];
            summary.push_str(&format!("\n{} stream:\n", source));
            summary.push_str(&format!("  Samples: {}\n", stats.samples));
            summary.push_str(&format!("  Fields: {}\n", stats.fields));
            match stats.time_range {
                Some((start, end)) => {
                    summary.push_str(&format!("  Time range: {} .. {}\n", start, end));
                }
                None => summary.push_str("  Time range: (empty)\n"),
            }
            if let Some(signature) = stats.signature {
                summary.push_str(&format!("  Timestamps: {}\n", signature));
            }
            if stats.out_of_order > 0 {
                summary.push_str(&format!(
                    "  Out-of-order records: {} (will be sorted)\n",
                    stats.out_of_order
                ));
            }
            if stats.duplicate_timestamps > 0 {
                summary.push_str(&format!(
                    "  Duplicate timestamps: {} (earlier record wins)\n",
                    stats.duplicate_timestamps
                ));
            }
        }

        summary
    }
}

impl Default for QualityChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldValue, RawSample};
    use std::collections::BTreeMap;

    fn sample(source: Source, ts: i64) -> RawSample {
        let mut fields = BTreeMap::new();
        fields.insert("v".to_string(), FieldValue::Number(ts as f64));
        RawSample::new(source, ts, fields)
    }

    fn stream(source: Source, timestamps: &[i64]) -> SourceStream {
        SourceStream::new(source, timestamps.iter().map(|&t| sample(source, t)).collect())
            .unwrap()
    }

    #[test]
    fn test_clean_streams_report_no_defects() {
        let data = TelemetryData {
            state: stream(Source::State, &[0, 10, 20]),
            pmc: stream(Source::Pmc, &[1, 11]),
            rapl: stream(Source::Rapl, &[0, 10, 20, 30]),
        };

        let report = QualityChecker::new().check(&data);
        assert_eq!(report.total_samples, 9);
        assert!(!report.has_defects());
        assert_eq!(
            report.stream_statistics[&Source::Rapl].time_range,
            Some((0, 30))
        );
    }

    #[test]
    fn test_defects_are_counted() {
        let data = TelemetryData {
            state: stream(Source::State, &[10, 5, 5]),
            pmc: stream(Source::Pmc, &[1]),
            rapl: stream(Source::Rapl, &[]),
        };

        let report = QualityChecker::new().check(&data);
        assert!(report.has_defects());

        let state = &report.stream_statistics[&Source::State];
        assert_eq!(state.out_of_order, 1);
        assert_eq!(state.duplicate_timestamps, 1);
        assert_eq!(report.stream_statistics[&Source::Rapl].samples, 0);

        let summary = QualityChecker::new().generate_summary(&report);
        assert!(summary.contains("Out-of-order records: 1"));
        assert!(summary.contains("Duplicate timestamps: 1"));
    }
}

use std::collections::BTreeSet;
use std::fmt;

use validator::Validate;

use crate::error::{MergeError, Result};
use crate::models::{
    ColumnSpec, FieldKind, FieldValue, MergedDataset, MergedRow, RawSample, Source, SourceStream,
};
use crate::readers::TelemetryData;
use crate::utils::constants::DEFAULT_BUCKET_WIDTH_NS;
use tracing::{debug, warn};

/// How a source's contribution to a canonical instant is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignPolicy {
    /// Closest sample within tolerance; equidistant ties go to the earlier
    /// sample. This is the default, matching an as-of nearest join.
    Nearest,
    /// Most recent at-or-before sample carried forward.
    ForwardFill,
    /// Fixed-width buckets; numeric fields averaged, text fields take the
    /// last in-bucket value. Empty buckets are null, never zero.
    Bucket,
}

impl fmt::Display for AlignPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlignPolicy::Nearest => f.write_str("nearest"),
            AlignPolicy::ForwardFill => f.write_str("forward-fill"),
            AlignPolicy::Bucket => f.write_str("bucket"),
        }
    }
}

/// Which canonical instants survive into the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapPolicy {
    /// Only instants inside every stream's time range.
    Intersection,
    /// The full hull of all streams, null-filled at the edges.
    Union,
}

impl fmt::Display for OverlapPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverlapPolicy::Intersection => f.write_str("intersection"),
            OverlapPolicy::Union => f.write_str("union"),
        }
    }
}

/// Where the canonical instants come from under `Nearest`/`ForwardFill`
/// (`Bucket` always uses its own grid).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisPolicy {
    /// Every distinct timestamp across the three streams.
    Union,
    /// One stream's timestamps only; the other two are joined onto it, an
    /// as-of style join typically anchored on the state stream.
    Anchor(Source),
}

impl fmt::Display for AxisPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisPolicy::Union => f.write_str("union"),
            AxisPolicy::Anchor(source) => write!(f, "anchor:{}", source),
        }
    }
}

#[derive(Debug, Clone, Validate)]
pub struct MergeConfig {
    pub policy: AlignPolicy,

    /// Maximum |sample - instant| distance under `Nearest`, in nanoseconds.
    /// `None` means unbounded. Misses are nulls, not errors.
    #[validate(range(min = 0))]
    pub tolerance_ns: Option<i64>,

    #[validate(range(min = 1))]
    pub bucket_width_ns: i64,

    pub overlap: OverlapPolicy,

    pub axis: AxisPolicy,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            policy: AlignPolicy::Nearest,
            tolerance_ns: None,
            bucket_width_ns: DEFAULT_BUCKET_WIDTH_NS,
            overlap: OverlapPolicy::Intersection,
            axis: AxisPolicy::Union,
        }
    }
}

/// Timestamp magnitude band, used to detect irreconcilable clocks before
/// aligning anything. Same-band epoch skews are the caller's problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSignature {
    /// Small values: offsets relative to a run start.
    Relative,
    SecondsEpoch,
    MillisEpoch,
    MicrosEpoch,
    NanosEpoch,
}

impl TimeSignature {
    pub fn classify(timestamp: i64) -> Self {
        match timestamp {
            t if t >= 100_000_000_000_000_000 => TimeSignature::NanosEpoch,
            t if t >= 100_000_000_000_000 => TimeSignature::MicrosEpoch,
            t if t >= 100_000_000_000 => TimeSignature::MillisEpoch,
            t if t >= 100_000_000 => TimeSignature::SecondsEpoch,
            _ => TimeSignature::Relative,
        }
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeSignature::Relative => f.write_str("relative offsets"),
            TimeSignature::SecondsEpoch => f.write_str("seconds since epoch"),
            TimeSignature::MillisEpoch => f.write_str("milliseconds since epoch"),
            TimeSignature::MicrosEpoch => f.write_str("microseconds since epoch"),
            TimeSignature::NanosEpoch => f.write_str("nanoseconds since epoch"),
        }
    }
}

/// One stream after merge-side preparation: stably sorted by timestamp with
/// duplicate instants collapsed to the earlier-in-file sample.
struct PreparedStream {
    source: Source,
    samples: Vec<RawSample>,
}

impl PreparedStream {
    fn prepare(stream: &SourceStream) -> Self {
        let mut samples = stream.samples.clone();

        let inversions = samples
            .windows(2)
            .filter(|w| w[1].timestamp < w[0].timestamp)
            .count();
        if inversions > 0 {
            warn!(
                source = %stream.source,
                inversions,
                "out-of-order records in stream; sorting before alignment"
            );
        }

        // Stable sort keeps file order among equal timestamps, so the
        // keep-first dedup below means earlier-in-file wins.
        samples.sort_by_key(|s| s.timestamp);
        let before = samples.len();
        samples.dedup_by_key(|s| s.timestamp);
        let duplicates = before - samples.len();
        if duplicates > 0 {
            debug!(
                source = %stream.source,
                duplicates,
                "collapsed duplicate timestamps (earlier record wins)"
            );
        }

        Self {
            source: stream.source,
            samples,
        }
    }

    fn time_range(&self) -> Option<(i64, i64)> {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => Some((first.timestamp, last.timestamp)),
            _ => None,
        }
    }
}

/// Aligns three time-ordered streams on a canonical axis into one dataset.
///
/// The merge is sequential and deterministic: the same inputs and config
/// always produce the same rows.
pub struct StreamMerger {
    config: MergeConfig,
}

impl StreamMerger {
    pub fn new(config: MergeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    pub fn merge(&self, data: &TelemetryData) -> Result<MergedDataset> {
        self.config.validate()?;
        self.check_clock_signatures(data)?;

        if self.config.overlap == OverlapPolicy::Intersection {
            for source in Source::ALL {
                if data.stream(source).is_empty() {
                    return Err(MergeError::EmptyStream { stream: source });
                }
            }
        }

        let prepared: Vec<PreparedStream> = Source::ALL
            .iter()
            .map(|&source| PreparedStream::prepare(data.stream(source)))
            .collect();

        let columns = self.build_columns(data);

        let window = match self.window(&prepared) {
            Some(window) => window,
            None => return Ok(MergedDataset::new(columns, Vec::new())),
        };

        let axis = self.canonical_axis(&prepared, window);
        if axis.is_empty() {
            warn!(
                overlap = %self.config.overlap,
                "no canonical instant falls inside the overlap window; output is empty"
            );
            return Ok(MergedDataset::new(columns, Vec::new()));
        }

        let mut per_source_cells: Vec<Vec<Vec<Option<FieldValue>>>> = Vec::new();
        for (stream, source) in prepared.iter().zip(Source::ALL) {
            let source_columns: Vec<&ColumnSpec> =
                columns.iter().filter(|c| c.source == source).collect();
            per_source_cells.push(match self.config.policy {
                AlignPolicy::Nearest => self.resolve_nearest(stream, &axis, &source_columns),
                AlignPolicy::ForwardFill => self.resolve_forward_fill(stream, &axis, &source_columns),
                AlignPolicy::Bucket => self.resolve_bucket(stream, &axis, &source_columns),
            });
        }

        let rows = axis
            .iter()
            .enumerate()
            .map(|(i, &timestamp)| {
                let mut cells = Vec::with_capacity(columns.len());
                for source_cells in &mut per_source_cells {
                    cells.append(&mut source_cells[i]);
                }
                MergedRow { timestamp, cells }
            })
            .collect();

        Ok(MergedDataset::new(columns, rows))
    }

    /// Streams whose timestamps sit in different magnitude bands cannot be
    /// aligned without unit conversion, which is out of scope by contract.
    fn check_clock_signatures(&self, data: &TelemetryData) -> Result<()> {
        let mut signatures: Vec<(Source, TimeSignature)> = Vec::new();
        for source in Source::ALL {
            if let Some((_, max_ts)) = data.stream(source).time_range() {
                signatures.push((source, TimeSignature::classify(max_ts)));
            }
        }

        if let Some((_, first_sig)) = signatures.first() {
            if signatures.iter().any(|(_, sig)| sig != first_sig) {
                let details = signatures
                    .iter()
                    .map(|(source, sig)| format!("{} stream looks like {}", source, sig))
                    .collect::<Vec<_>>()
                    .join("; ");
                return Err(MergeError::ClockMismatch { details });
            }
        }

        Ok(())
    }

    /// Column superset in deterministic order: state fields, then pmc, then
    /// rapl, each alphabetical within the source.
    fn build_columns(&self, data: &TelemetryData) -> Vec<ColumnSpec> {
        let mut columns = Vec::new();
        for source in Source::ALL {
            let schema = &data.stream(source).schema;
            for field in schema.field_names() {
                let kind = schema.kind_of(field).unwrap_or(FieldKind::Number);
                columns.push(ColumnSpec::new(source, field, kind));
            }
        }
        columns
    }

    fn window(&self, prepared: &[PreparedStream]) -> Option<(i64, i64)> {
        let ranges: Vec<(i64, i64)> = prepared.iter().filter_map(|s| s.time_range()).collect();
        if ranges.is_empty() {
            return None;
        }

        let window = match self.config.overlap {
            OverlapPolicy::Intersection => {
                let start = ranges.iter().map(|r| r.0).max()?;
                let end = ranges.iter().map(|r| r.1).min()?;
                (start, end)
            }
            OverlapPolicy::Union => {
                let start = ranges.iter().map(|r| r.0).min()?;
                let end = ranges.iter().map(|r| r.1).max()?;
                (start, end)
            }
        };

        Some(window)
    }

    /// Canonical instants: distinct sample timestamps inside the window, or a
    /// regular bucket grid covering it.
    fn canonical_axis(&self, prepared: &[PreparedStream], window: (i64, i64)) -> Vec<i64> {
        let (start, end) = window;

        match self.config.policy {
            AlignPolicy::Nearest | AlignPolicy::ForwardFill => {
                let axis: BTreeSet<i64> = prepared
                    .iter()
                    .filter(|s| match self.config.axis {
                        AxisPolicy::Union => true,
                        AxisPolicy::Anchor(anchor) => s.source == anchor,
                    })
                    .flat_map(|s| s.samples.iter().map(|sample| sample.timestamp))
                    .filter(|&t| t >= start && t <= end)
                    .collect();
                axis.into_iter().collect()
            }
            AlignPolicy::Bucket => {
                // The grid is anchored at the window start so no bucket
                // timestamp falls before the overlap window.
                let width = self.config.bucket_width_ns;
                let mut axis = Vec::new();
                let mut bucket = start;
                while bucket <= end {
                    axis.push(bucket);
                    bucket += width;
                }
                axis
            }
        }
    }

    fn resolve_nearest(
        &self,
        stream: &PreparedStream,
        axis: &[i64],
        columns: &[&ColumnSpec],
    ) -> Vec<Vec<Option<FieldValue>>> {
        let samples = &stream.samples;
        let mut cells = Vec::with_capacity(axis.len());
        let mut cursor = 0usize;

        for &instant in axis {
            if samples.is_empty() {
                cells.push(null_cells(columns));
                continue;
            }

            // Advance only while the next sample is strictly closer, so an
            // equidistant pair resolves to the earlier sample.
            while cursor + 1 < samples.len()
                && distance(samples[cursor + 1].timestamp, instant)
                    < distance(samples[cursor].timestamp, instant)
            {
                cursor += 1;
            }

            let candidate = &samples[cursor];
            let within = match self.config.tolerance_ns {
                Some(tolerance) => distance(candidate.timestamp, instant) <= tolerance,
                None => true,
            };

            if within {
                cells.push(sample_cells(candidate, columns));
            } else {
                cells.push(null_cells(columns));
            }
        }

        cells
    }

    fn resolve_forward_fill(
        &self,
        stream: &PreparedStream,
        axis: &[i64],
        columns: &[&ColumnSpec],
    ) -> Vec<Vec<Option<FieldValue>>> {
        let samples = &stream.samples;
        let mut cells = Vec::with_capacity(axis.len());
        let mut cursor = 0usize;

        for &instant in axis {
            while cursor + 1 < samples.len() && samples[cursor + 1].timestamp <= instant {
                cursor += 1;
            }

            match samples.get(cursor) {
                Some(sample) if sample.timestamp <= instant => {
                    cells.push(sample_cells(sample, columns));
                }
                // Before the stream's first sample: nothing to carry forward.
                _ => cells.push(null_cells(columns)),
            }
        }

        cells
    }

    fn resolve_bucket(
        &self,
        stream: &PreparedStream,
        axis: &[i64],
        columns: &[&ColumnSpec],
    ) -> Vec<Vec<Option<FieldValue>>> {
        let samples = &stream.samples;
        let width = self.config.bucket_width_ns;
        let mut cells = Vec::with_capacity(axis.len());
        let mut lo = 0usize;

        for &bucket in axis {
            while lo < samples.len() && samples[lo].timestamp < bucket {
                lo += 1;
            }
            let mut hi = lo;
            while hi < samples.len() && samples[hi].timestamp < bucket + width {
                hi += 1;
            }

            let in_bucket = &samples[lo..hi];
            if in_bucket.is_empty() {
                cells.push(null_cells(columns));
            } else {
                cells.push(aggregate_cells(in_bucket, columns));
            }
        }

        cells
    }
}

impl Default for StreamMerger {
    fn default() -> Self {
        Self::new(MergeConfig::default())
    }
}

fn distance(a: i64, b: i64) -> i64 {
    (a - b).abs()
}

fn null_cells(columns: &[&ColumnSpec]) -> Vec<Option<FieldValue>> {
    vec![None; columns.len()]
}

fn sample_cells(sample: &RawSample, columns: &[&ColumnSpec]) -> Vec<Option<FieldValue>> {
    columns
        .iter()
        .map(|column| sample.fields.get(&column.field).cloned())
        .collect()
}

/// Bucket aggregation: mean for numeric fields, last in-bucket value for text
/// fields. A field absent from every in-bucket sample stays null.
fn aggregate_cells(samples: &[RawSample], columns: &[&ColumnSpec]) -> Vec<Option<FieldValue>> {
    columns
        .iter()
        .map(|column| match column.kind {
            FieldKind::Number => {
                let values: Vec<f64> = samples
                    .iter()
                    .filter_map(|s| s.fields.get(&column.field).and_then(|v| v.as_number()))
                    .collect();
                if values.is_empty() {
                    None
                } else {
                    Some(FieldValue::Number(
                        values.iter().sum::<f64>() / values.len() as f64,
                    ))
                }
            }
            FieldKind::Text => samples
                .iter()
                .rev()
                .find_map(|s| s.fields.get(&column.field).cloned()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sample(source: Source, ts: i64, fields: &[(&str, FieldValue)]) -> RawSample {
        let map: BTreeMap<String, FieldValue> = fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        RawSample::new(source, ts, map)
    }

    fn num(v: f64) -> FieldValue {
        FieldValue::Number(v)
    }

    fn data(
        state: Vec<RawSample>,
        pmc: Vec<RawSample>,
        rapl: Vec<RawSample>,
    ) -> TelemetryData {
        TelemetryData {
            state: SourceStream::new(Source::State, state).unwrap(),
            pmc: SourceStream::new(Source::Pmc, pmc).unwrap(),
            rapl: SourceStream::new(Source::Rapl, rapl).unwrap(),
        }
    }

    /// The canonical alignment scenario: state at {0,10,20}, pmc at {1,11},
    /// rapl at {0,10,20,30}; nearest, tolerance 2, intersection.
    #[test]
    fn test_nearest_with_tolerance_and_intersection() {
        let telemetry = data(
            vec![
                sample(Source::State, 0, &[("load", num(1.0))]),
                sample(Source::State, 10, &[("load", num(2.0))]),
                sample(Source::State, 20, &[("load", num(3.0))]),
            ],
            vec![
                sample(Source::Pmc, 1, &[("runtime_ns", num(100.0))]),
                sample(Source::Pmc, 11, &[("runtime_ns", num(200.0))]),
            ],
            vec![
                sample(Source::Rapl, 0, &[("energy_uj", num(10.0))]),
                sample(Source::Rapl, 10, &[("energy_uj", num(20.0))]),
                sample(Source::Rapl, 20, &[("energy_uj", num(30.0))]),
                sample(Source::Rapl, 30, &[("energy_uj", num(40.0))]),
            ],
        );

        let merger = StreamMerger::new(MergeConfig {
            policy: AlignPolicy::Nearest,
            tolerance_ns: Some(2),
            overlap: OverlapPolicy::Intersection,
            ..MergeConfig::default()
        });

        let dataset = merger.merge(&telemetry).unwrap();

        // Intersection window is [1, 11]: state starts at 0 but pmc at 1,
        // pmc ends at 11 while rapl runs to 30.
        let timestamps: Vec<i64> = dataset.rows.iter().map(|r| r.timestamp).collect();
        assert_eq!(timestamps, vec![1, 10, 11]);
        assert!(dataset.is_strictly_ordered());

        // t=1: state t=0 within tolerance 2, pmc exact, rapl t=0 within.
        assert_eq!(dataset.cell(0, "state_load"), Some(&num(1.0)));
        assert_eq!(dataset.cell(0, "pmc_runtime_ns"), Some(&num(100.0)));
        assert_eq!(dataset.cell(0, "rapl_energy_uj"), Some(&num(10.0)));

        // t=10: pmc t=11 within tolerance.
        assert_eq!(dataset.cell(1, "state_load"), Some(&num(2.0)));
        assert_eq!(dataset.cell(1, "pmc_runtime_ns"), Some(&num(200.0)));
        assert_eq!(dataset.cell(1, "rapl_energy_uj"), Some(&num(20.0)));
    }

    /// Same inputs anchored on the state stream, an as-of style join:
    /// rows exactly at state's instants {0,10,20}, PMC
    /// joined within tolerance (t=0 from pmc t=1, t=10 from pmc t=11, t=20
    /// null), rapl joined exactly and its t=30 never surfacing.
    #[test]
    fn test_state_anchored_axis_matches_asof_join() {
        let telemetry = data(
            vec![
                sample(Source::State, 0, &[("load", num(1.0))]),
                sample(Source::State, 10, &[("load", num(2.0))]),
                sample(Source::State, 20, &[("load", num(3.0))]),
            ],
            vec![
                sample(Source::Pmc, 1, &[("runtime_ns", num(100.0))]),
                sample(Source::Pmc, 11, &[("runtime_ns", num(200.0))]),
            ],
            vec![
                sample(Source::Rapl, 0, &[("energy_uj", num(10.0))]),
                sample(Source::Rapl, 10, &[("energy_uj", num(20.0))]),
                sample(Source::Rapl, 20, &[("energy_uj", num(30.0))]),
                sample(Source::Rapl, 30, &[("energy_uj", num(40.0))]),
            ],
        );

        let merger = StreamMerger::new(MergeConfig {
            policy: AlignPolicy::Nearest,
            tolerance_ns: Some(2),
            overlap: OverlapPolicy::Union,
            axis: AxisPolicy::Anchor(Source::State),
            ..MergeConfig::default()
        });

        let dataset = merger.merge(&telemetry).unwrap();
        let timestamps: Vec<i64> = dataset.rows.iter().map(|r| r.timestamp).collect();
        assert_eq!(timestamps, vec![0, 10, 20]);

        assert_eq!(dataset.cell(0, "pmc_runtime_ns"), Some(&num(100.0)));
        assert_eq!(dataset.cell(1, "pmc_runtime_ns"), Some(&num(200.0)));
        assert_eq!(dataset.cell(2, "pmc_runtime_ns"), None); // 11 is 9 away
        assert_eq!(dataset.cell(0, "rapl_energy_uj"), Some(&num(10.0)));
        assert_eq!(dataset.cell(2, "rapl_energy_uj"), Some(&num(30.0)));
    }

    #[test]
    fn test_nearest_beyond_tolerance_is_null_not_error() {
        let telemetry = data(
            vec![
                sample(Source::State, 0, &[("load", num(1.0))]),
                sample(Source::State, 100, &[("load", num(2.0))]),
            ],
            vec![sample(Source::Pmc, 50, &[("cpu", num(3.0))])],
            vec![
                sample(Source::Rapl, 0, &[("energy_uj", num(10.0))]),
                sample(Source::Rapl, 100, &[("energy_uj", num(20.0))]),
            ],
        );

        let merger = StreamMerger::new(MergeConfig {
            policy: AlignPolicy::Nearest,
            tolerance_ns: Some(5),
            overlap: OverlapPolicy::Union,
            ..MergeConfig::default()
        });

        let dataset = merger.merge(&telemetry).unwrap();
        let t50 = dataset.rows.iter().position(|r| r.timestamp == 50).unwrap();
        assert_eq!(dataset.cell(t50, "state_load"), None);
        assert_eq!(dataset.cell(t50, "pmc_cpu"), Some(&num(3.0)));
    }

    #[test]
    fn test_nearest_tie_prefers_earlier_sample() {
        let telemetry = data(
            vec![
                sample(Source::State, 0, &[("load", num(1.0))]),
                sample(Source::State, 20, &[("load", num(2.0))]),
            ],
            // t=10 is equidistant from both state samples.
            vec![sample(Source::Pmc, 10, &[("cpu", num(0.0))])],
            vec![
                sample(Source::Rapl, 0, &[("energy_uj", num(1.0))]),
                sample(Source::Rapl, 20, &[("energy_uj", num(2.0))]),
            ],
        );

        let merger = StreamMerger::new(MergeConfig::default());
        let dataset = merger.merge(&telemetry).unwrap();
        let t10 = dataset.rows.iter().position(|r| r.timestamp == 10).unwrap();
        assert_eq!(dataset.cell(t10, "state_load"), Some(&num(1.0)));
    }

    #[test]
    fn test_duplicate_timestamps_earlier_in_file_wins() {
        let telemetry = data(
            vec![
                sample(Source::State, 5, &[("load", num(11.0))]),
                sample(Source::State, 5, &[("load", num(99.0))]),
            ],
            vec![sample(Source::Pmc, 5, &[("cpu", num(0.0))])],
            vec![sample(Source::Rapl, 5, &[("energy_uj", num(1.0))])],
        );

        let merger = StreamMerger::new(MergeConfig::default());
        let dataset = merger.merge(&telemetry).unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.cell(0, "state_load"), Some(&num(11.0)));
    }

    #[test]
    fn test_forward_fill_nulls_before_first_sample() {
        let telemetry = data(
            vec![
                sample(Source::State, 0, &[("load", num(1.0))]),
                sample(Source::State, 30, &[("load", num(4.0))]),
            ],
            vec![sample(Source::Pmc, 20, &[("cpu", num(7.0))])],
            vec![
                sample(Source::Rapl, 0, &[("energy_uj", num(5.0))]),
                sample(Source::Rapl, 30, &[("energy_uj", num(6.0))]),
            ],
        );

        let merger = StreamMerger::new(MergeConfig {
            policy: AlignPolicy::ForwardFill,
            overlap: OverlapPolicy::Union,
            ..MergeConfig::default()
        });

        let dataset = merger.merge(&telemetry).unwrap();
        let timestamps: Vec<i64> = dataset.rows.iter().map(|r| r.timestamp).collect();
        assert_eq!(timestamps, vec![0, 20, 30]);

        // pmc has nothing to carry before t=20, then fills forward.
        assert_eq!(dataset.cell(0, "pmc_cpu"), None);
        assert_eq!(dataset.cell(1, "pmc_cpu"), Some(&num(7.0)));
        assert_eq!(dataset.cell(2, "pmc_cpu"), Some(&num(7.0)));
        // state carries t=0 forward through t=20.
        assert_eq!(dataset.cell(1, "state_load"), Some(&num(1.0)));
    }

    #[test]
    fn test_bucket_means_numbers_and_nulls_empty_buckets() {
        let telemetry = data(
            vec![
                sample(Source::State, 0, &[("load", num(10.0))]),
                sample(Source::State, 5, &[("load", num(20.0))]),
                sample(Source::State, 25, &[("load", num(40.0))]),
            ],
            vec![
                sample(Source::Pmc, 2, &[("comm", FieldValue::Text("a".into()))]),
                sample(Source::Pmc, 8, &[("comm", FieldValue::Text("b".into()))]),
                sample(Source::Pmc, 25, &[("comm", FieldValue::Text("c".into()))]),
            ],
            vec![
                sample(Source::Rapl, 0, &[("energy_uj", num(1.0))]),
                sample(Source::Rapl, 29, &[("energy_uj", num(2.0))]),
            ],
        );

        let merger = StreamMerger::new(MergeConfig {
            policy: AlignPolicy::Bucket,
            bucket_width_ns: 10,
            overlap: OverlapPolicy::Union,
            ..MergeConfig::default()
        });

        let dataset = merger.merge(&telemetry).unwrap();
        let timestamps: Vec<i64> = dataset.rows.iter().map(|r| r.timestamp).collect();
        assert_eq!(timestamps, vec![0, 10, 20]);

        // Bucket [0,10): mean of 10 and 20; text takes last value.
        assert_eq!(dataset.cell(0, "state_load"), Some(&num(15.0)));
        assert_eq!(
            dataset.cell(0, "pmc_comm"),
            Some(&FieldValue::Text("b".into()))
        );
        // Bucket [10,20): empty for every source.
        assert_eq!(dataset.cell(1, "state_load"), None);
        assert_eq!(dataset.cell(1, "pmc_comm"), None);
        assert_eq!(dataset.cell(1, "rapl_energy_uj"), None);
        // Bucket [20,30): single values, not zeros.
        assert_eq!(dataset.cell(2, "state_load"), Some(&num(40.0)));
        assert_eq!(dataset.cell(2, "rapl_energy_uj"), Some(&num(2.0)));
    }

    #[test]
    fn test_bucket_grid_is_anchored_at_window_start() {
        let telemetry = data(
            vec![
                sample(Source::State, 105, &[("load", num(1.0))]),
                sample(Source::State, 295, &[("load", num(3.0))]),
            ],
            vec![
                sample(Source::Pmc, 105, &[("cpu", num(0.0))]),
                sample(Source::Pmc, 295, &[("cpu", num(1.0))]),
            ],
            vec![
                sample(Source::Rapl, 105, &[("energy_uj", num(10.0))]),
                sample(Source::Rapl, 295, &[("energy_uj", num(20.0))]),
            ],
        );

        let merger = StreamMerger::new(MergeConfig {
            policy: AlignPolicy::Bucket,
            bucket_width_ns: 100,
            overlap: OverlapPolicy::Intersection,
            ..MergeConfig::default()
        });

        let dataset = merger.merge(&telemetry).unwrap();
        let timestamps: Vec<i64> = dataset.rows.iter().map(|r| r.timestamp).collect();
        // Window is [105, 295]; the grid starts at 105, not at an aligned
        // multiple of the width before any stream has begun.
        assert_eq!(timestamps, vec![105, 205]);
        assert!(timestamps.iter().all(|&t| t >= 105));
        assert_eq!(dataset.cell(0, "state_load"), Some(&num(1.0)));
        assert_eq!(dataset.cell(1, "rapl_energy_uj"), Some(&num(20.0)));
    }

    #[test]
    fn test_empty_stream_under_intersection_fails() {
        let telemetry = data(
            vec![sample(Source::State, 0, &[("load", num(1.0))])],
            vec![],
            vec![sample(Source::Rapl, 0, &[("energy_uj", num(1.0))])],
        );

        let err = StreamMerger::new(MergeConfig::default())
            .merge(&telemetry)
            .unwrap_err();
        match err {
            MergeError::EmptyStream { stream } => assert_eq!(stream, Source::Pmc),
            other => panic!("expected EmptyStream, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_stream_under_union_yields_nulls() {
        let telemetry = data(
            vec![sample(Source::State, 0, &[("load", num(1.0))])],
            vec![],
            vec![sample(Source::Rapl, 10, &[("energy_uj", num(2.0))])],
        );

        let merger = StreamMerger::new(MergeConfig {
            overlap: OverlapPolicy::Union,
            ..MergeConfig::default()
        });
        let dataset = merger.merge(&telemetry).unwrap();

        assert_eq!(dataset.len(), 2);
        // pmc contributed no columns at all, so only state/rapl appear.
        assert!(dataset
            .columns
            .iter()
            .all(|c| c.source != Source::Pmc));
        assert_eq!(dataset.cell(0, "state_load"), Some(&num(1.0)));
    }

    #[test]
    fn test_single_sample_stream_is_valid_under_union() {
        let telemetry = data(
            vec![sample(Source::State, 50, &[("load", num(9.0))])],
            vec![
                sample(Source::Pmc, 0, &[("cpu", num(0.0))]),
                sample(Source::Pmc, 100, &[("cpu", num(1.0))]),
            ],
            vec![sample(Source::Rapl, 100, &[("energy_uj", num(5.0))])],
        );

        let merger = StreamMerger::new(MergeConfig {
            policy: AlignPolicy::Nearest,
            tolerance_ns: Some(10),
            overlap: OverlapPolicy::Union,
            ..MergeConfig::default()
        });
        let dataset = merger.merge(&telemetry).unwrap();

        let timestamps: Vec<i64> = dataset.rows.iter().map(|r| r.timestamp).collect();
        assert_eq!(timestamps, vec![0, 50, 100]);
        assert_eq!(dataset.cell(0, "state_load"), None); // 50 away, outside 10
        assert_eq!(dataset.cell(1, "state_load"), Some(&num(9.0)));
        assert_eq!(dataset.cell(2, "state_load"), None);
    }

    #[test]
    fn test_clock_mismatch_detected() {
        let telemetry = data(
            // Nanosecond-epoch timestamps, as the collectors emit.
            vec![sample(Source::State, 1_700_000_000_000_000_000, &[("load", num(1.0))])],
            // Second-epoch timestamps: same instant, wrong unit.
            vec![sample(Source::Pmc, 1_700_000_000, &[("cpu", num(1.0))])],
            vec![sample(Source::Rapl, 1_700_000_000_000_000_000, &[("energy_uj", num(1.0))])],
        );

        let err = StreamMerger::new(MergeConfig::default())
            .merge(&telemetry)
            .unwrap_err();
        assert_eq!(err.kind(), "clock-mismatch");
    }

    #[test]
    fn test_out_of_order_stream_is_sorted_not_fatal() {
        let telemetry = data(
            vec![
                sample(Source::State, 20, &[("load", num(2.0))]),
                sample(Source::State, 0, &[("load", num(1.0))]),
            ],
            vec![sample(Source::Pmc, 10, &[("cpu", num(0.0))])],
            vec![sample(Source::Rapl, 10, &[("energy_uj", num(1.0))])],
        );

        let merger = StreamMerger::new(MergeConfig {
            overlap: OverlapPolicy::Union,
            ..MergeConfig::default()
        });
        let dataset = merger.merge(&telemetry).unwrap();
        assert!(dataset.is_strictly_ordered());
        assert_eq!(dataset.rows[0].timestamp, 0);
    }

    #[test]
    fn test_merge_is_deterministic() {
        let make = || {
            data(
                vec![
                    sample(Source::State, 0, &[("load", num(1.0))]),
                    sample(Source::State, 10, &[("load", num(2.0))]),
                ],
                vec![sample(Source::Pmc, 5, &[("cpu", num(3.0))])],
                vec![sample(Source::Rapl, 7, &[("energy_uj", num(4.0))])],
            )
        };

        let merger = StreamMerger::new(MergeConfig {
            overlap: OverlapPolicy::Union,
            ..MergeConfig::default()
        });
        let first = merger.merge(&make()).unwrap();
        let second = merger.merge(&make()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let merger = StreamMerger::new(MergeConfig {
            bucket_width_ns: 0,
            ..MergeConfig::default()
        });
        let telemetry = data(
            vec![sample(Source::State, 0, &[("load", num(1.0))])],
            vec![sample(Source::Pmc, 0, &[("cpu", num(1.0))])],
            vec![sample(Source::Rapl, 0, &[("energy_uj", num(1.0))])],
        );
        assert_eq!(merger.merge(&telemetry).unwrap_err().kind(), "validation");
    }

    #[test]
    fn test_time_signature_bands() {
        assert_eq!(TimeSignature::classify(30), TimeSignature::Relative);
        assert_eq!(
            TimeSignature::classify(1_700_000_000),
            TimeSignature::SecondsEpoch
        );
        assert_eq!(
            TimeSignature::classify(1_700_000_000_000),
            TimeSignature::MillisEpoch
        );
        assert_eq!(
            TimeSignature::classify(1_700_000_000_000_000_000),
            TimeSignature::NanosEpoch
        );
    }
}

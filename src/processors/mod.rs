pub mod quality_checker;
pub mod stream_merger;

pub use quality_checker::{QualityChecker, QualityReport, StreamStatistics};
pub use stream_merger::{
    AlignPolicy, AxisPolicy, MergeConfig, OverlapPolicy, StreamMerger, TimeSignature,
};

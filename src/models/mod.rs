pub mod merged;
pub mod sample;
pub mod schema;

pub use merged::{ColumnSpec, MergedDataset, MergedRow};
pub use sample::{FieldValue, RawSample, Source};
pub use schema::{FieldKind, SourceStream, StreamSchema};

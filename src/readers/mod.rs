pub mod concurrent_reader;
pub mod log_reader;

pub use concurrent_reader::{ConcurrentReader, LogPaths, TelemetryData};
pub use log_reader::{LogReader, SampleIterator};

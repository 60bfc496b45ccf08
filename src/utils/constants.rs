/// Source log field conventions
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Alignment defaults
pub const DEFAULT_BUCKET_WIDTH_NS: i64 = 100_000_000; // 100ms, the collectors' sampling interval
pub const NANOS_PER_MILLI: i64 = 1_000_000;

/// Processing defaults
pub const DEFAULT_ROW_GROUP_SIZE: usize = 10000;
pub const DEFAULT_BUFFER_SIZE: usize = 8192 * 16; // 128KB

/// Output defaults
pub const DEFAULT_OUTPUT_PREFIX: &str = "merged-telemetry";

/// Parquet compression options
pub const COMPRESSION_SNAPPY: &str = "snappy";
pub const COMPRESSION_GZIP: &str = "gzip";
pub const COMPRESSION_LZ4: &str = "lz4";
pub const COMPRESSION_ZSTD: &str = "zstd";
pub const COMPRESSION_NONE: &str = "none";

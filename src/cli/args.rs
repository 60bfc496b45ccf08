use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "telemetry-merger")]
#[command(about = "Time-aligned merger for scheduler telemetry logs (state, PMC, RAPL)")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Merge the three telemetry logs into one time-aligned dataset
    Merge {
        #[arg(long, help = "State samples log (JSONL)")]
        state: PathBuf,

        #[arg(long, help = "PMC samples log (JSONL)")]
        pmc: PathBuf,

        #[arg(long, help = "RAPL samples log (JSONL)")]
        rapl: PathBuf,

        #[arg(
            short,
            long,
            help = "Output file path [default: output/merged-telemetry-{YYMMDD}.{ext}]"
        )]
        output: Option<PathBuf>,

        #[arg(
            long,
            default_value = "nearest",
            help = "Alignment policy: nearest, forward-fill or bucket"
        )]
        policy: String,

        #[arg(
            long,
            help = "Max |sample - instant| distance in ms under 'nearest' (unbounded if omitted)"
        )]
        tolerance_ms: Option<i64>,

        #[arg(long, default_value = "100", help = "Bucket width in ms under 'bucket'")]
        bucket_width_ms: i64,

        #[arg(
            long,
            default_value = "intersection",
            help = "Overlap policy: intersection or union"
        )]
        overlap: String,

        #[arg(
            long,
            default_value = "union",
            help = "Canonical axis: union, or anchor on one stream (state, pmc, rapl)"
        )]
        axis: String,

        #[arg(long, default_value = "parquet", help = "Output format: parquet or csv")]
        format: String,

        #[arg(short, long, default_value = "snappy")]
        compression: String,

        #[arg(long, default_value = "false", help = "Memory-map input logs")]
        mmap: bool,

        #[arg(long, default_value = "10000")]
        chunk_size: usize,
    },

    /// Parse the three logs and report stream quality without merging
    Validate {
        #[arg(long, help = "State samples log (JSONL)")]
        state: PathBuf,

        #[arg(long, help = "PMC samples log (JSONL)")]
        pmc: PathBuf,

        #[arg(long, help = "RAPL samples log (JSONL)")]
        rapl: PathBuf,

        #[arg(long, default_value = "false", help = "Memory-map input logs")]
        mmap: bool,
    },

    /// Display information about a merged Parquet file
    Info {
        #[arg(short, long)]
        file: PathBuf,

        #[arg(short, long, default_value = "10")]
        sample: usize,
    },
}

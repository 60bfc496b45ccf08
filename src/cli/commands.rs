use std::path::Path;

use crate::cli::args::{Cli, Commands};
use crate::error::{MergeError, Result};
use crate::models::{FieldValue, Source};
use crate::processors::{AlignPolicy, AxisPolicy, MergeConfig, OverlapPolicy, QualityChecker, StreamMerger};
use crate::readers::{ConcurrentReader, LogPaths};
use crate::utils::constants::NANOS_PER_MILLI;
use crate::utils::filename::{generate_default_output_filename, guess_source_from_filename};
use crate::utils::progress::ProgressReporter;
use crate::writers::{CsvWriter, ParquetWriter};

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Merge {
            state,
            pmc,
            rapl,
            output,
            policy,
            tolerance_ms,
            bucket_width_ms,
            overlap,
            axis,
            format,
            compression,
            mmap,
            chunk_size,
        } => {
            let config = MergeConfig {
                policy: parse_policy(&policy)?,
                tolerance_ns: tolerance_ms.map(|ms| ms.saturating_mul(NANOS_PER_MILLI)),
                bucket_width_ns: bucket_width_ms.saturating_mul(NANOS_PER_MILLI),
                overlap: parse_overlap(&overlap)?,
                axis: parse_axis(&axis)?,
            };
            let format = parse_format(&format)?;

            let output_file = output.unwrap_or_else(|| {
                generate_default_output_filename(match format {
                    OutputFormat::Parquet => "parquet",
                    OutputFormat::Csv => "csv",
                })
            });

            println!("Merging telemetry data...");
            println!("State log: {}", state.display());
            println!("PMC log: {}", pmc.display());
            println!("RAPL log: {}", rapl.display());
            println!("Output file: {}", output_file.display());
            println!(
                "Policy: {}, overlap: {}, axis: {}",
                config.policy, config.overlap, config.axis
            );

            warn_on_filename_mismatch(&state, Source::State);
            warn_on_filename_mismatch(&pmc, Source::Pmc);
            warn_on_filename_mismatch(&rapl, Source::Rapl);

            let progress = ProgressReporter::new_spinner("Reading logs...", false);

            let reader = ConcurrentReader::with_mmap(mmap);
            let paths = LogPaths::new(&state, &pmc, &rapl);
            let data = reader.read_all(&paths).await?;

            progress.set_message("Aligning streams...");

            let checker = QualityChecker::new();
            let report = checker.check(&data);

            let merger = StreamMerger::new(config);
            let dataset = merger.merge(&data)?;

            progress.finish_with_message(&format!(
                "Merged {} samples into {} rows",
                report.total_samples,
                dataset.len()
            ));

            println!("\n{}", checker.generate_summary(&report));

            for (source, nulls) in dataset.null_counts() {
                if nulls > 0 {
                    println!(
                        "Note: {} {} cells are null (tolerance misses, empty buckets or range edges)",
                        nulls, source
                    );
                }
            }

            println!("\nWriting {} rows to {}...", dataset.len(), output_file.display());
            match format {
                OutputFormat::Parquet => {
                    let writer = ParquetWriter::new().with_compression(&compression)?;
                    writer.write_dataset_batched(&dataset, &output_file, chunk_size)?;
                    let file_info = writer.get_file_info(&output_file)?;
                    println!("\n{}", file_info.summary());
                }
                OutputFormat::Csv => {
                    CsvWriter::new().write_dataset(&dataset, &output_file)?;
                }
            }

            println!("Merge complete!");
        }

        Commands::Validate {
            state,
            pmc,
            rapl,
            mmap,
        } => {
            println!("Validating telemetry logs...");

            let progress = ProgressReporter::new_spinner("Reading logs...", false);

            let reader = ConcurrentReader::with_mmap(mmap);
            let paths = LogPaths::new(&state, &pmc, &rapl);
            let data = reader.read_all(&paths).await?;

            progress.finish_with_message("Validation complete");

            let checker = QualityChecker::new();
            let report = checker.check(&data);
            println!("\n{}", checker.generate_summary(&report));

            if report.has_defects() {
                println!("⚠️  Streams have quality defects (see report above)");
            } else {
                println!("✅ All streams parsed cleanly");
            }
        }

        Commands::Info { file, sample } => {
            println!("Analyzing merged file: {}", file.display());

            let writer = ParquetWriter::new();
            let file_info = writer.get_file_info(&file)?;
            println!("\n{}", file_info.summary());

            if sample > 0 {
                let dataset = writer.read_dataset(&file)?;
                println!("\nColumns: {}", dataset.column_names().join(", "));
                println!("\nSample rows (showing up to {}):", sample);
                for row in dataset.rows.iter().take(sample) {
                    let cells: Vec<String> = row
                        .cells
                        .iter()
                        .map(|cell| match cell {
                            Some(FieldValue::Number(n)) => format!("{}", n),
                            Some(FieldValue::Text(s)) => s.clone(),
                            None => "∅".to_string(),
                        })
                        .collect();
                    println!("  t={}: [{}]", row.timestamp, cells.join(", "));
                }
            }
        }
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Parquet,
    Csv,
}

fn parse_policy(value: &str) -> Result<AlignPolicy> {
    match value.to_lowercase().as_str() {
        "nearest" => Ok(AlignPolicy::Nearest),
        "forward-fill" | "forward_fill" | "ffill" => Ok(AlignPolicy::ForwardFill),
        "bucket" => Ok(AlignPolicy::Bucket),
        other => Err(MergeError::Config(format!(
            "Unknown alignment policy: {} (expected nearest, forward-fill or bucket)",
            other
        ))),
    }
}

fn parse_overlap(value: &str) -> Result<OverlapPolicy> {
    match value.to_lowercase().as_str() {
        "intersection" => Ok(OverlapPolicy::Intersection),
        "union" => Ok(OverlapPolicy::Union),
        other => Err(MergeError::Config(format!(
            "Unknown overlap policy: {} (expected intersection or union)",
            other
        ))),
    }
}

fn parse_axis(value: &str) -> Result<AxisPolicy> {
    match value.to_lowercase().as_str() {
        "union" => Ok(AxisPolicy::Union),
        "state" => Ok(AxisPolicy::Anchor(Source::State)),
        "pmc" => Ok(AxisPolicy::Anchor(Source::Pmc)),
        "rapl" => Ok(AxisPolicy::Anchor(Source::Rapl)),
        other => Err(MergeError::Config(format!(
            "Unknown axis: {} (expected union, state, pmc or rapl)",
            other
        ))),
    }
}

fn parse_format(value: &str) -> Result<OutputFormat> {
    match value.to_lowercase().as_str() {
        "parquet" => Ok(OutputFormat::Parquet),
        "csv" => Ok(OutputFormat::Csv),
        other => Err(MergeError::Config(format!(
            "Unknown output format: {} (expected parquet or csv)",
            other
        ))),
    }
}

/// The `<source>_<timestamp>.<ext>` convention is informational only, but a
/// rapl log passed as --state is almost certainly a mistake worth flagging.
fn warn_on_filename_mismatch(path: &Path, expected: Source) {
    if let Some(guessed) = guess_source_from_filename(path) {
        if guessed != expected {
            println!(
                "Warning: {} was passed as the {} log but its name suggests {}",
                path.display(),
                expected,
                guessed
            );
        }
    }
}

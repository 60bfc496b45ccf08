use chrono::{Datelike, Local};
use std::path::{Path, PathBuf};

use crate::models::Source;
use crate::utils::constants::DEFAULT_OUTPUT_PREFIX;

/// Generate default output filename with format: merged-telemetry-{YYMMDD}.{ext}
pub fn generate_default_output_filename(extension: &str) -> PathBuf {
    let now = Local::now();
    let year = now.year() % 100; // Get last 2 digits of year
    let month = now.month();
    let day = now.day();

    let filename = format!(
        "{}-{:02}{:02}{:02}.{}",
        DEFAULT_OUTPUT_PREFIX, year, month, day, extension
    );
    PathBuf::from("output").join(filename)
}

/// Guess the source kind from the `<source>_<timestamp>.<ext>` naming
/// convention. Informational only: used to warn when a log is passed under
/// the wrong flag, never to decide semantics.
pub fn guess_source_from_filename(path: &Path) -> Option<Source> {
    let stem = path.file_stem()?.to_str()?.to_lowercase();
    let prefix = stem.split('_').next()?;
    match prefix {
        "state" => Some(Source::State),
        "pmc" => Some(Source::Pmc),
        "rapl" => Some(Source::Rapl),
        _ => None,
    }
}

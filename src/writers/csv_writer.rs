use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{MergeError, Result};
use crate::models::{FieldValue, MergedDataset};

/// Writes a merged dataset as CSV for downstream analysis tooling that does
/// not read Parquet. Nulls are empty cells; numbers keep full precision.
pub struct CsvWriter;

impl CsvWriter {
    pub fn new() -> Self {
        Self
    }

    pub fn write_dataset(&self, dataset: &MergedDataset, path: &Path) -> Result<()> {
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(parent) = dir {
            std::fs::create_dir_all(parent)?;
        }
        let staging = match dir {
            Some(parent) => NamedTempFile::new_in(parent)?,
            None => NamedTempFile::new_in(".")?,
        };

        let mut writer = csv::Writer::from_writer(staging.reopen()?);
        writer.write_record(dataset.column_names())?;

        for row in &dataset.rows {
            let mut record = Vec::with_capacity(row.cells.len() + 1);
            record.push(row.timestamp.to_string());
            for cell in &row.cells {
                record.push(match cell {
                    Some(FieldValue::Number(n)) => format_number(*n),
                    Some(FieldValue::Text(s)) => s.clone(),
                    None => String::new(),
                });
            }
            writer.write_record(&record)?;
        }

        writer.flush()?;
        drop(writer);
        staging
            .persist(path)
            .map_err(|e| MergeError::Io(e.error))?;
        Ok(())
    }
}

impl Default for CsvWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Integral floats print without a trailing `.0` so counters look like the
/// integers they were in the source logs.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use serde_json::Value;

use crate::error::{MergeError, Result};
use crate::models::{FieldValue, RawSample, Source, SourceStream};
use crate::utils::constants::{DEFAULT_BUFFER_SIZE, TIMESTAMP_FIELD};

/// Reads one newline-delimited JSONL telemetry log into typed samples.
///
/// Parsing is fail-fast: any malformed line aborts with a `Parse` error
/// naming the file and line. Lenient skipping would silently corrupt the
/// downstream alignment, so there is none.
pub struct LogReader {
    use_mmap: bool,
}

impl LogReader {
    pub fn new() -> Self {
        Self { use_mmap: false }
    }

    pub fn with_mmap(use_mmap: bool) -> Self {
        Self { use_mmap }
    }

    /// Read a whole log into a `SourceStream`, preserving file order and
    /// reconciling the stream schema. Sorting is the merger's job.
    pub fn read_samples(&self, path: &Path, source: Source) -> Result<SourceStream> {
        let samples = if self.use_mmap {
            self.read_samples_mmap(path, source)?
        } else {
            self.read_samples_buffered(path, source)?
        };
        SourceStream::new(source, samples)
    }

    fn read_samples_buffered(&self, path: &Path, source: Source) -> Result<Vec<RawSample>> {
        let file = File::open(path)?;
        let reader = BufReader::with_capacity(DEFAULT_BUFFER_SIZE, file);
        let mut samples = Vec::new();

        for (index, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            samples.push(parse_record_line(&line, source, path, index + 1)?);
        }

        Ok(samples)
    }

    /// Memory-mapped variant for large logs.
    fn read_samples_mmap(&self, path: &Path, source: Source) -> Result<Vec<RawSample>> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        let content = std::str::from_utf8(&mmap)
            .map_err(|e| MergeError::InvalidFormat(format!("invalid UTF-8 in log: {}", e)))?;

        let mut samples = Vec::new();
        for (index, line) in content.lines().enumerate() {
            samples.push(parse_record_line(line, source, path, index + 1)?);
        }

        Ok(samples)
    }

    /// Stream samples lazily; the file handle is held by the iterator and
    /// released when it is dropped.
    pub fn stream_samples(&self, path: &Path, source: Source) -> Result<SampleIterator> {
        SampleIterator::new(path, source)
    }
}

impl Default for LogReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse one JSONL record: an object with an integer `timestamp` plus
/// arbitrary numeric/text fields.
fn parse_record_line(line: &str, source: Source, path: &Path, line_no: usize) -> Result<RawSample> {
    let parse_err = |message: String| MergeError::Parse {
        path: path.to_path_buf(),
        line: line_no,
        message,
    };

    if line.trim().is_empty() {
        return Err(parse_err("blank line is not a record".to_string()));
    }

    let value: Value = serde_json::from_str(line)
        .map_err(|e| parse_err(format!("{} (record: {:?})", e, truncate(line, 120))))?;

    let object = value
        .as_object()
        .ok_or_else(|| parse_err(format!("record is not a JSON object: {:?}", truncate(line, 120))))?;

    let timestamp = object
        .get(TIMESTAMP_FIELD)
        .ok_or_else(|| parse_err("record has no 'timestamp' field".to_string()))?
        .as_i64()
        .ok_or_else(|| parse_err("'timestamp' is not an integer".to_string()))?;

    let mut fields = BTreeMap::new();
    for (name, raw) in object {
        if name == TIMESTAMP_FIELD {
            continue;
        }
        match FieldValue::from_json(raw) {
            Ok(Some(value)) => {
                fields.insert(name.clone(), value);
            }
            Ok(None) => {} // JSON null: absent field, widened with null downstream
            Err(e) => return Err(parse_err(format!("field '{}': {}", name, e))),
        }
    }

    Ok(RawSample::new(source, timestamp, fields))
}

fn truncate(line: &str, max: usize) -> &str {
    let mut end = line.len().min(max);
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    &line[..end]
}

/// Lazy, restartable record iterator over one log file.
pub struct SampleIterator {
    reader: BufReader<File>,
    source: Source,
    path: PathBuf,
    line_no: usize,
    failed: bool,
}

impl SampleIterator {
    fn new(path: &Path, source: Source) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, file),
            source,
            path: path.to_path_buf(),
            line_no: 0,
            failed: false,
        })
    }
}

impl Iterator for SampleIterator {
    type Item = Result<RawSample>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => {
                self.line_no += 1;
                let trimmed = line.trim_end_matches(['\n', '\r']);
                let result = parse_record_line(trimmed, self.source, &self.path, self.line_no);
                if result.is_err() {
                    self.failed = true;
                }
                Some(result)
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e.into()))
            }
        }
    }
}

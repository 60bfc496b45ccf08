use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use tempfile::NamedTempFile;

use crate::error::{MergeError, Result};
use crate::models::{ColumnSpec, FieldKind, FieldValue, MergedDataset, MergedRow, Source};
use crate::utils::constants::{
    COMPRESSION_GZIP, COMPRESSION_LZ4, COMPRESSION_NONE, COMPRESSION_SNAPPY, COMPRESSION_ZSTD,
    DEFAULT_ROW_GROUP_SIZE,
};

/// Writes a merged dataset to Parquet with explicit nulls.
///
/// The file is staged in a temp file next to the target and persisted only
/// after a successful close, so a failed merge never leaves a partial
/// artifact behind.
pub struct ParquetWriter {
    compression: Compression,
    row_group_size: usize,
}

impl ParquetWriter {
    pub fn new() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
        }
    }

    pub fn with_compression(mut self, compression: &str) -> Result<Self> {
        self.compression = match compression.to_lowercase().as_str() {
            COMPRESSION_SNAPPY => Compression::SNAPPY,
            COMPRESSION_GZIP => Compression::GZIP(GzipLevel::default()),
            COMPRESSION_LZ4 => Compression::LZ4,
            COMPRESSION_ZSTD => Compression::ZSTD(ZstdLevel::default()),
            COMPRESSION_NONE => Compression::UNCOMPRESSED,
            _ => {
                return Err(MergeError::Config(format!(
                    "Unsupported compression: {}",
                    compression
                )))
            }
        };
        Ok(self)
    }

    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size;
        self
    }

    /// Write the dataset, in row batches, all-or-nothing.
    pub fn write_dataset(&self, dataset: &MergedDataset, path: &Path) -> Result<()> {
        self.write_dataset_batched(dataset, path, self.row_group_size)
    }

    pub fn write_dataset_batched(
        &self,
        dataset: &MergedDataset,
        path: &Path,
        batch_size: usize,
    ) -> Result<()> {
        let schema = self.create_schema(dataset);

        let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(parent) = dir {
            std::fs::create_dir_all(parent)?;
        }
        let staging = match dir {
            Some(parent) => NamedTempFile::new_in(parent)?,
            None => NamedTempFile::new_in(".")?,
        };

        let props = WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .build();

        let mut writer = ArrowWriter::try_new(staging.reopen()?, schema.clone(), Some(props))?;

        if dataset.is_empty() {
            // Schema-only file: still a valid, readable artifact.
            let batch = self.rows_to_batch(dataset, &[], schema.clone())?;
            writer.write(&batch)?;
        } else {
            for chunk in dataset.rows.chunks(batch_size.max(1)) {
                let batch = self.rows_to_batch(dataset, chunk, schema.clone())?;
                writer.write(&batch)?;
            }
        }

        writer.close()?;
        staging
            .persist(path)
            .map_err(|e| MergeError::Io(e.error))?;
        Ok(())
    }

    fn create_schema(&self, dataset: &MergedDataset) -> Arc<Schema> {
        let mut fields = vec![Field::new("timestamp", DataType::Int64, false)];
        for column in &dataset.columns {
            let data_type = match column.kind {
                FieldKind::Number => DataType::Float64,
                FieldKind::Text => DataType::Utf8,
            };
            fields.push(Field::new(column.name.as_str(), data_type, true));
        }
        Arc::new(Schema::new(fields))
    }

    fn rows_to_batch(
        &self,
        dataset: &MergedDataset,
        rows: &[MergedRow],
        schema: Arc<Schema>,
    ) -> Result<RecordBatch> {
        let timestamps: Vec<i64> = rows.iter().map(|r| r.timestamp).collect();
        let mut arrays: Vec<ArrayRef> = vec![Arc::new(Int64Array::from(timestamps))];

        for (index, column) in dataset.columns.iter().enumerate() {
            let array: ArrayRef = match column.kind {
                FieldKind::Number => {
                    let values: Vec<Option<f64>> = rows
                        .iter()
                        .map(|r| r.cells[index].as_ref().and_then(|v| v.as_number()))
                        .collect();
                    Arc::new(Float64Array::from(values))
                }
                FieldKind::Text => {
                    let values: Vec<Option<String>> = rows
                        .iter()
                        .map(|r| {
                            r.cells[index]
                                .as_ref()
                                .and_then(|v| v.as_text().map(str::to_string))
                        })
                        .collect();
                    Arc::new(StringArray::from(values))
                }
            };
            arrays.push(array);
        }

        Ok(RecordBatch::try_new(schema, arrays)?)
    }

    /// Read a merged dataset back. Column sources are recovered from the
    /// `<source>_` name prefixes; the round trip preserves rows and nulls.
    pub fn read_dataset(&self, path: &Path) -> Result<MergedDataset> {
        let file = File::open(path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?.with_batch_size(8192);
        let columns = self.columns_from_schema(builder.schema().as_ref())?;
        let reader = builder.build()?;

        let mut rows: Vec<MergedRow> = Vec::new();

        for batch_result in reader {
            let batch = batch_result?;

            let timestamps = batch
                .column(0)
                .as_any()
                .downcast_ref::<Int64Array>()
                .ok_or_else(|| {
                    MergeError::InvalidFormat("timestamp column is not Int64".to_string())
                })?;

            for row_index in 0..batch.num_rows() {
                let mut cells = Vec::with_capacity(columns.len());
                for (col_index, spec) in columns.iter().enumerate() {
                    let array = batch.column(col_index + 1);
                    let cell = match spec.kind {
                        FieldKind::Number => {
                            let values = array
                                .as_any()
                                .downcast_ref::<Float64Array>()
                                .ok_or_else(|| {
                                    MergeError::InvalidFormat(format!(
                                        "column '{}' is not Float64",
                                        spec.name
                                    ))
                                })?;
                            if values.is_null(row_index) {
                                None
                            } else {
                                Some(FieldValue::Number(values.value(row_index)))
                            }
                        }
                        FieldKind::Text => {
                            let values = array
                                .as_any()
                                .downcast_ref::<StringArray>()
                                .ok_or_else(|| {
                                    MergeError::InvalidFormat(format!(
                                        "column '{}' is not Utf8",
                                        spec.name
                                    ))
                                })?;
                            if values.is_null(row_index) {
                                None
                            } else {
                                Some(FieldValue::Text(values.value(row_index).to_string()))
                            }
                        }
                    };
                    cells.push(cell);
                }
                rows.push(MergedRow {
                    timestamp: timestamps.value(row_index),
                    cells,
                });
            }
        }

        Ok(MergedDataset::new(columns, rows))
    }

    fn columns_from_schema(&self, schema: &Schema) -> Result<Vec<ColumnSpec>> {
        let mut columns = Vec::new();
        for field in schema.fields().iter().skip(1) {
            let (source, bare) = split_namespaced(field.name()).ok_or_else(|| {
                MergeError::InvalidFormat(format!(
                    "column '{}' has no recognized source prefix",
                    field.name()
                ))
            })?;
            let kind = match field.data_type() {
                DataType::Float64 => FieldKind::Number,
                DataType::Utf8 => FieldKind::Text,
                other => {
                    return Err(MergeError::InvalidFormat(format!(
                        "column '{}' has unsupported type {:?}",
                        field.name(),
                        other
                    )))
                }
            };
            columns.push(ColumnSpec::new(source, bare, kind));
        }
        Ok(columns)
    }

    /// File statistics for the info command.
    pub fn get_file_info(&self, path: &Path) -> Result<ParquetFileInfo> {
        use parquet::file::reader::{FileReader, SerializedFileReader};

        let file = File::open(path)?;
        let reader = SerializedFileReader::new(file)?;
        let metadata = reader.metadata();

        let total_rows = metadata.file_metadata().num_rows();
        let row_groups = metadata.num_row_groups();
        let columns = metadata.file_metadata().schema_descr().num_columns();
        let file_size = std::fs::metadata(path)?.len();

        Ok(ParquetFileInfo {
            total_rows,
            row_groups: row_groups as i32,
            columns,
            file_size,
            compression: self.compression,
        })
    }
}

impl Default for ParquetWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn split_namespaced(name: &str) -> Option<(Source, &str)> {
    for source in Source::ALL {
        let prefix = source.column_prefix();
        if let Some(bare) = name
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return Some((source, bare));
        }
    }
    None
}

pub struct ParquetFileInfo {
    pub total_rows: i64,
    pub row_groups: i32,
    pub columns: usize,
    pub file_size: u64,
    pub compression: Compression,
}

impl ParquetFileInfo {
    pub fn summary(&self) -> String {
        format!(
            "Parquet File Summary:\n\
            - Total rows: {}\n\
            - Columns: {}\n\
            - Row groups: {}\n\
            - File size: {:.2} KB\n\
            - Compression: {:?}",
            self.total_rows,
            self.columns,
            self.row_groups,
            self.file_size as f64 / 1024.0,
            self.compression,
        )
    }
}

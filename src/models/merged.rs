use crate::models::{FieldKind, FieldValue, Source};

/// One output column: a source field widened into the merged superset,
/// namespaced as `<source>_<field>` to avoid collisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub source: Source,
    pub field: String,
    pub kind: FieldKind,
}

impl ColumnSpec {
    pub fn new(source: Source, field: &str, kind: FieldKind) -> Self {
        Self {
            name: format!("{}_{}", source.column_prefix(), field),
            source,
            field: field.to_string(),
            kind,
        }
    }
}

/// One merged output row: a canonical instant plus one cell per column.
/// Cells are positionally aligned with the dataset's column list; a `None`
/// cell is an explicit null, never a fabricated value.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRow {
    pub timestamp: i64,
    pub cells: Vec<Option<FieldValue>>,
}

/// The final output artifact: named columns and strictly time-ordered rows.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedDataset {
    pub columns: Vec<ColumnSpec>,
    pub rows: Vec<MergedRow>,
}

impl MergedDataset {
    pub fn new(columns: Vec<ColumnSpec>, rows: Vec<MergedRow>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Full header: canonical timestamp column followed by namespaced fields.
    pub fn column_names(&self) -> Vec<&str> {
        let mut names = vec!["timestamp"];
        names.extend(self.columns.iter().map(|c| c.name.as_str()));
        names
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Cell lookup by row index and namespaced column name.
    pub fn cell(&self, row: usize, column: &str) -> Option<&FieldValue> {
        let col = self.column_index(column)?;
        self.rows.get(row)?.cells.get(col)?.as_ref()
    }

    /// Whether row timestamps are strictly increasing.
    pub fn is_strictly_ordered(&self) -> bool {
        self.rows.windows(2).all(|w| w[0].timestamp < w[1].timestamp)
    }

    /// Count of null cells per source, for the post-merge summary.
    pub fn null_counts(&self) -> Vec<(Source, usize)> {
        Source::ALL
            .iter()
            .map(|&source| {
                let nulls = self
                    .columns
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| c.source == source)
                    .map(|(i, _)| self.rows.iter().filter(|r| r.cells[i].is_none()).count())
                    .sum();
                (source, nulls)
            })
            .collect()
    }
}

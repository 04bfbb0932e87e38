//! Table sources: CSV files on disk and in-memory record sets

use crate::{CatalogueError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A typed scalar cell as supplied by a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Date(NaiveDate),
    Text(String),
}

static NULL_CELL: CellValue = CellValue::Null;

impl CellValue {
    /// Blank or whitespace-only text is treated as a null cell.
    pub fn from_text(raw: &str) -> Self {
        if raw.trim().is_empty() {
            CellValue::Null
        } else {
            CellValue::Text(raw.to_string())
        }
    }

    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => CellValue::Null,
            serde_json::Value::Bool(b) => CellValue::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => CellValue::Integer(i),
                None => n.as_f64().map(CellValue::Float).unwrap_or(CellValue::Null),
            },
            serde_json::Value::String(s) => CellValue::from_text(s),
            other => CellValue::Text(other.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Canonical string form used by type inference and distinct counting.
    pub fn render(&self) -> Option<Cow<'_, str>> {
        match self {
            CellValue::Null => None,
            CellValue::Bool(b) => Some(Cow::Borrowed(if *b { "true" } else { "false" })),
            CellValue::Integer(i) => Some(Cow::Owned(i.to_string())),
            CellValue::Float(f) => Some(Cow::Owned(f.to_string())),
            CellValue::Date(d) => Some(Cow::Owned(d.format("%Y-%m-%d").to_string())),
            CellValue::Text(s) => Some(Cow::Borrowed(s.as_str())),
        }
    }
}

/// One fully loaded table snapshot.
#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
    pub size_bytes: u64,
    pub modified: Option<DateTime<Utc>>,
}

impl Table {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of one column in row order. Short rows read as null.
    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = &CellValue> + '_ {
        self.rows
            .iter()
            .map(move |row| row.get(idx).unwrap_or(&NULL_CELL))
    }

    pub fn cell(&self, row: usize, idx: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(idx))
            .unwrap_or(&NULL_CELL)
    }
}

/// Configuration for different data sources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DataSourceConfig {
    Csv {
        path: PathBuf,
        delimiter: Option<u8>,
        has_headers: bool,
    },
    Memory {
        columns: Vec<String>,
        rows: Vec<Vec<serde_json::Value>>,
    },
    /// Several files claim the same table name; loading always fails
    Ambiguous { paths: Vec<PathBuf> },
}

/// A named table source that can be loaded into a [`Table`]
#[derive(Debug, Clone)]
pub struct DataSource {
    name: String,
    layer: Option<String>,
    config: DataSourceConfig,
}

impl DataSource {
    pub fn new(name: impl Into<String>, config: DataSourceConfig) -> Self {
        Self {
            name: name.into(),
            layer: None,
            config,
        }
    }

    /// Create a CSV data source with a header row and comma delimiter
    pub fn csv(name: impl Into<String>, path: PathBuf) -> Self {
        Self::new(
            name,
            DataSourceConfig::Csv {
                path,
                delimiter: Some(b','),
                has_headers: true,
            },
        )
    }

    pub fn memory(
        name: impl Into<String>,
        columns: Vec<String>,
        rows: Vec<Vec<serde_json::Value>>,
    ) -> Self {
        Self::new(name, DataSourceConfig::Memory { columns, rows })
    }

    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layer(&self) -> Option<&str> {
        self.layer.as_deref()
    }

    pub fn config(&self) -> &DataSourceConfig {
        &self.config
    }

    /// Read the whole table. Any failure, including an empty table, is a
    /// `SourceRead` error scoped to this table.
    pub fn load(&self) -> Result<Table> {
        let table = match &self.config {
            DataSourceConfig::Csv {
                path,
                delimiter,
                has_headers,
            } => self.load_csv(path, *delimiter, *has_headers)?,
            DataSourceConfig::Memory { columns, rows } => self.load_memory(columns, rows)?,
            DataSourceConfig::Ambiguous { paths } => {
                let paths: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
                return Err(CatalogueError::source_read(
                    &self.name,
                    format!("table name is claimed by {}", paths.join(", ")),
                ));
            }
        };

        if table.columns.is_empty() {
            return Err(CatalogueError::source_read(&self.name, "table has no columns"));
        }
        if table.rows.is_empty() {
            return Err(CatalogueError::source_read(&self.name, "table has no rows"));
        }

        debug!(
            "Loaded {}: {} rows x {} columns",
            self.name,
            table.row_count(),
            table.columns.len()
        );
        Ok(table)
    }

    fn load_csv(&self, path: &Path, delimiter: Option<u8>, has_headers: bool) -> Result<Table> {
        use csv::ReaderBuilder;
        use std::fs::File;

        let read_err = |reason: String| CatalogueError::source_read(&self.name, reason);

        let file = File::open(path).map_err(|e| read_err(format!("{}: {}", path.display(), e)))?;
        let metadata = file.metadata().map_err(|e| read_err(e.to_string()))?;

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter.unwrap_or(b','))
            .has_headers(has_headers)
            .from_reader(file);

        let mut columns: Vec<String> = if has_headers {
            reader
                .headers()
                .map_err(|e| read_err(e.to_string()))?
                .iter()
                .map(|h| h.trim().to_string())
                .collect()
        } else {
            Vec::new()
        };

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|e| read_err(e.to_string()))?;
            if columns.is_empty() {
                columns = (1..=record.len()).map(|i| format!("column_{}", i)).collect();
            }
            rows.push(record.iter().map(CellValue::from_text).collect());
        }

        Ok(Table {
            name: self.name.clone(),
            columns,
            rows,
            size_bytes: metadata.len(),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        })
    }

    fn load_memory(&self, columns: &[String], rows: &[Vec<serde_json::Value>]) -> Result<Table> {
        let mut size_bytes = 0u64;
        let mut cells = Vec::with_capacity(rows.len());

        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(CatalogueError::source_read(
                    &self.name,
                    format!(
                        "row {} has {} cells, expected {}",
                        i,
                        row.len(),
                        columns.len()
                    ),
                ));
            }
            let converted: Vec<CellValue> = row.iter().map(CellValue::from_json).collect();
            // One delimiter per cell plus the rendered text approximates a CSV footprint
            size_bytes += converted
                .iter()
                .map(|c| c.render().map_or(0, |s| s.len()) as u64 + 1)
                .sum::<u64>();
            cells.push(converted);
        }

        Ok(Table {
            name: self.name.clone(),
            columns: columns.to_vec(),
            rows: cells,
            size_bytes,
            modified: None,
        })
    }
}

/// Find `<data_dir>/<layer>/<table>.csv` files. Files directly under
/// `data_dir` are returned without a layer. A table name found in more
/// than one place becomes a single source that fails to load.
pub fn discover_tables(data_dir: &Path) -> Result<Vec<DataSource>> {
    let mut sources = Vec::new();

    for entry in WalkDir::new(data_dir)
        .min_depth(1)
        .max_depth(2)
        .sort_by_file_name()
    {
        let entry = entry.map_err(std::io::Error::from)?;
        let path = entry.path();
        if !entry.file_type().is_file()
            || path.extension().and_then(|e| e.to_str()) != Some("csv")
        {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        let mut source = DataSource::csv(name, path.to_path_buf());
        if entry.depth() == 2 {
            if let Some(layer) = path
                .parent()
                .and_then(|p| p.file_name())
                .and_then(|l| l.to_str())
            {
                source = source.with_layer(layer);
            }
        }
        sources.push(source);
    }

    sources.sort_by(|a, b| a.name.cmp(&b.name));

    let mut unique: Vec<DataSource> = Vec::with_capacity(sources.len());
    for source in sources {
        let Some(last) = unique.last_mut().filter(|last| last.name == source.name) else {
            unique.push(source);
            continue;
        };
        let mut paths = match &last.config {
            DataSourceConfig::Csv { path, .. } => vec![path.clone()],
            DataSourceConfig::Ambiguous { paths } => paths.clone(),
            DataSourceConfig::Memory { .. } => Vec::new(),
        };
        if let DataSourceConfig::Csv { path, .. } = source.config {
            paths.push(path);
        }
        warn!(
            "Table name '{}' found in {} locations; it will not be profiled",
            source.name,
            paths.len()
        );
        *last = DataSource::new(source.name, DataSourceConfig::Ambiguous { paths });
    }
    Ok(unique)
}

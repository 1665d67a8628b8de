//! Table persistence.
//!
//! A [`TableSink`] receives a table as a column schema followed by rows of
//! typed [`Cell`]s. Rows are validated against the schema as they arrive and
//! staged; nothing becomes visible until [`TableSink::commit()`] succeeds.
//! A failed insert discards everything staged for that table.
//!
//! Three sinks are provided: [`MemorySink`] keeps committed tables in memory,
//! [`CsvDirSink`] writes one CSV per table and [`SqlScriptSink`] writes one
//! transactional `DROP`/`CREATE`/`INSERT` script per table.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::Context;
use itertools::Itertools;
use log::{debug, info};
use thiserror::Error;

use crate::{data::format_value, io_utils};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticType {
    Text { max_len: usize },
    Integer,
    Float,
}

impl SemanticType {
    pub fn sql_type(&self) -> String {
        match self {
            SemanticType::Text { max_len } => format!("NCHAR({max_len})"),
            SemanticType::Integer => "INT".to_string(),
            SemanticType::Float => "FLOAT".to_string(),
        }
    }

    fn check(&self, cell: &Cell) -> Result<(), String> {
        match (self, cell) {
            (_, Cell::Null) => Ok(()),
            (SemanticType::Text { max_len }, Cell::Text(text)) => {
                let len = text.chars().count();
                if len > *max_len {
                    Err(format!("text of {len} character(s) exceeds NCHAR({max_len})"))
                } else {
                    Ok(())
                }
            }
            (SemanticType::Integer, Cell::Integer(_)) => Ok(()),
            (SemanticType::Float, Cell::Float(value)) if value.is_finite() => Ok(()),
            (SemanticType::Float, Cell::Float(value)) => {
                Err(format!("non-finite float {value}"))
            }
            (expected, other) => Err(format!(
                "expected {} but found {}",
                expected.sql_type(),
                other.kind()
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub ty: SemanticType,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, ty: SemanticType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    pub fn text(name: impl Into<String>, max_len: usize) -> Self {
        Self::new(name, SemanticType::Text { max_len })
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, SemanticType::Integer)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, SemanticType::Float)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Integer(i64),
    Float(f64),
    Null,
}

impl Cell {
    fn kind(&self) -> &'static str {
        match self {
            Cell::Text(_) => "text",
            Cell::Integer(_) => "integer",
            Cell::Float(_) => "float",
            Cell::Null => "null",
        }
    }

    /// CSV rendering; nulls become an empty field.
    pub fn to_csv_field(&self) -> String {
        match self {
            Cell::Text(text) => text.clone(),
            Cell::Integer(value) => value.to_string(),
            Cell::Float(value) => format_value(*value),
            Cell::Null => String::new(),
        }
    }

    pub fn to_sql_literal(&self) -> String {
        match self {
            Cell::Text(text) => format!("N'{}'", text.replace('\'', "''")),
            Cell::Integer(value) => value.to_string(),
            Cell::Float(value) => format_value(*value),
            Cell::Null => "NULL".to_string(),
        }
    }
}

impl From<Option<f64>> for Cell {
    fn from(value: Option<f64>) -> Self {
        value.map(Cell::Float).unwrap_or(Cell::Null)
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Table '{0}' has not been created")]
    UnknownTable(String),
    #[error("Table '{table}' row {row}: expected {expected} cell(s), found {found}")]
    Arity {
        table: String,
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Table '{table}' row {row} column '{column}': {reason}")]
    InvalidCell {
        table: String,
        row: usize,
        column: String,
        reason: String,
    },
    #[error("Writing table '{table}' to {path:?} failed")]
    Io {
        table: String,
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

pub trait TableSink {
    /// Starts a new staged version of `table`, replacing any earlier one.
    fn create_or_replace(&mut self, table: &str, columns: &[ColumnSpec]) -> Result<(), SinkError>;

    fn insert_rows(&mut self, table: &str, rows: Vec<Vec<Cell>>) -> Result<(), SinkError>;

    /// Publishes the staged table.
    fn commit(&mut self, table: &str) -> Result<(), SinkError>;
}

/// Creates, fills and commits one table; returns the number of rows written.
pub fn write_table(
    sink: &mut dyn TableSink,
    table: &str,
    columns: &[ColumnSpec],
    rows: Vec<Vec<Cell>>,
) -> Result<usize, SinkError> {
    let count = rows.len();
    sink.create_or_replace(table, columns)?;
    sink.insert_rows(table, rows)?;
    sink.commit(table)?;
    info!("Wrote {count} row(s) to table '{table}'");
    Ok(count)
}

#[derive(Debug, Clone, PartialEq)]
pub struct StagedTable {
    pub columns: Vec<ColumnSpec>,
    pub rows: Vec<Vec<Cell>>,
}

/// Validated, uncommitted tables shared by every sink implementation.
#[derive(Debug, Default)]
struct Staging {
    tables: HashMap<String, StagedTable>,
}

impl Staging {
    fn create(&mut self, table: &str, columns: &[ColumnSpec]) {
        self.tables.insert(
            table.to_string(),
            StagedTable {
                columns: columns.to_vec(),
                rows: Vec::new(),
            },
        );
    }

    fn insert(&mut self, table: &str, rows: Vec<Vec<Cell>>) -> Result<(), SinkError> {
        let staged = self
            .tables
            .get_mut(table)
            .ok_or_else(|| SinkError::UnknownTable(table.to_string()))?;
        let offset = staged.rows.len();
        if let Err(err) = validate_rows(table, &staged.columns, &rows, offset) {
            self.tables.remove(table);
            return Err(err);
        }
        staged.rows.extend(rows);
        Ok(())
    }

    fn take(&mut self, table: &str) -> Result<StagedTable, SinkError> {
        self.tables
            .remove(table)
            .ok_or_else(|| SinkError::UnknownTable(table.to_string()))
    }
}

fn validate_rows(
    table: &str,
    columns: &[ColumnSpec],
    rows: &[Vec<Cell>],
    offset: usize,
) -> Result<(), SinkError> {
    for (idx, row) in rows.iter().enumerate() {
        let row_number = offset + idx + 1;
        if row.len() != columns.len() {
            return Err(SinkError::Arity {
                table: table.to_string(),
                row: row_number,
                expected: columns.len(),
                found: row.len(),
            });
        }
        for (column, cell) in columns.iter().zip(row) {
            column
                .ty
                .check(cell)
                .map_err(|reason| SinkError::InvalidCell {
                    table: table.to_string(),
                    row: row_number,
                    column: column.name.clone(),
                    reason,
                })?;
        }
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct MemorySink {
    staging: Staging,
    committed: BTreeMap<String, StagedTable>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self, name: &str) -> Option<&StagedTable> {
        self.committed.get(name)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.committed.keys().map(String::as_str)
    }
}

impl TableSink for MemorySink {
    fn create_or_replace(&mut self, table: &str, columns: &[ColumnSpec]) -> Result<(), SinkError> {
        self.staging.create(table, columns);
        Ok(())
    }

    fn insert_rows(&mut self, table: &str, rows: Vec<Vec<Cell>>) -> Result<(), SinkError> {
        self.staging.insert(table, rows)
    }

    fn commit(&mut self, table: &str) -> Result<(), SinkError> {
        let staged = self.staging.take(table)?;
        self.committed.insert(table.to_string(), staged);
        Ok(())
    }
}

/// Writes the file through a temporary sibling and renames it into place, so
/// a failed commit leaves any previous version untouched.
fn publish_file(
    table: &str,
    path: &Path,
    write: impl FnOnce(&Path) -> anyhow::Result<()>,
) -> Result<(), SinkError> {
    let tmp = path.with_extension("tmp");
    let result =
        write(&tmp).and_then(|()| fs::rename(&tmp, path).context("Renaming staged file"));
    result.map_err(|source| {
        let _ = fs::remove_file(&tmp);
        SinkError::Io {
            table: table.to_string(),
            path: path.to_path_buf(),
            source: source.into(),
        }
    })
}

/// Writes a header row of column names followed by the rendered cells.
pub fn write_csv(path: &Path, columns: &[ColumnSpec], rows: &[Vec<Cell>]) -> anyhow::Result<()> {
    let mut writer = io_utils::open_csv_writer(path)?;
    writer.write_record(columns.iter().map(|c| c.name.as_str()))?;
    for row in rows {
        writer.write_record(row.iter().map(Cell::to_csv_field))?;
    }
    writer.flush()?;
    Ok(())
}

/// One `{table}.csv` per table under a directory.
#[derive(Debug)]
pub struct CsvDirSink {
    dir: PathBuf,
    staging: Staging,
}

impl CsvDirSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            staging: Staging::default(),
        }
    }

    pub fn path_for(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{table}.csv"))
    }
}

impl TableSink for CsvDirSink {
    fn create_or_replace(&mut self, table: &str, columns: &[ColumnSpec]) -> Result<(), SinkError> {
        self.staging.create(table, columns);
        Ok(())
    }

    fn insert_rows(&mut self, table: &str, rows: Vec<Vec<Cell>>) -> Result<(), SinkError> {
        self.staging.insert(table, rows)
    }

    fn commit(&mut self, table: &str) -> Result<(), SinkError> {
        let staged = self.staging.take(table)?;
        let path = self.path_for(table);
        publish_file(table, &path, |tmp| {
            write_csv(tmp, &staged.columns, &staged.rows)
        })?;
        debug!("Committed {} row(s) to {path:?}", staged.rows.len());
        Ok(())
    }
}

/// One `{table}.sql` script per table, wrapped in a single transaction.
#[derive(Debug)]
pub struct SqlScriptSink {
    dir: PathBuf,
    staging: Staging,
}

impl SqlScriptSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            staging: Staging::default(),
        }
    }

    pub fn path_for(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{table}.sql"))
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Renders the full script for one table.
pub fn render_sql_script(table: &str, staged: &StagedTable) -> String {
    let name = quote_ident(table);
    let column_list = staged
        .columns
        .iter()
        .map(|c| quote_ident(&c.name))
        .join(", ");
    let mut script = String::new();
    script.push_str("BEGIN TRANSACTION;\n");
    script.push_str(&format!("DROP TABLE IF EXISTS {name};\n"));
    script.push_str(&format!("CREATE TABLE {name} (\n"));
    script.push_str(
        &staged
            .columns
            .iter()
            .map(|c| format!("    {} {}", quote_ident(&c.name), c.ty.sql_type()))
            .join(",\n"),
    );
    script.push_str("\n);\n");
    for row in &staged.rows {
        let values = row.iter().map(Cell::to_sql_literal).join(", ");
        script.push_str(&format!(
            "INSERT INTO {name} ({column_list}) VALUES ({values});\n"
        ));
    }
    script.push_str("COMMIT;\n");
    script
}

impl TableSink for SqlScriptSink {
    fn create_or_replace(&mut self, table: &str, columns: &[ColumnSpec]) -> Result<(), SinkError> {
        self.staging.create(table, columns);
        Ok(())
    }

    fn insert_rows(&mut self, table: &str, rows: Vec<Vec<Cell>>) -> Result<(), SinkError> {
        self.staging.insert(table, rows)
    }

    fn commit(&mut self, table: &str) -> Result<(), SinkError> {
        let staged = self.staging.take(table)?;
        let path = self.path_for(table);
        publish_file(table, &path, |tmp| {
            let file = fs::File::create(tmp)?;
            let mut writer = BufWriter::new(file);
            writer.write_all(render_sql_script(table, &staged).as_bytes())?;
            writer.flush()?;
            Ok(())
        })?;
        debug!("Committed {} row(s) to {path:?}", staged.rows.len());
        Ok(())
    }
}

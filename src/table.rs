//! Tabular interchange type
//!
//! Every connector hands its results back as a [`Table`]: named columns over
//! rows of [`Cell`]s. Column categories are not declared up front; they are
//! inferred from the values each column holds (see [`ColumnKind`]).

use chrono::NaiveDateTime;
use serde_json::Value;
use std::fmt;
use std::io::Write;

/// Timestamp layout used when cells are rendered as text
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    DateTime(NaiveDateTime),
}

impl Cell {
    /// Infer a typed cell from raw delimited-text content
    pub fn infer(raw: &str) -> Self {
        if raw.is_empty() {
            return Cell::Null;
        }
        if let Ok(i) = raw.parse::<i64>() {
            return Cell::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            return Cell::Float(f);
        }
        match raw.to_ascii_lowercase().as_str() {
            "true" => Cell::Bool(true),
            "false" => Cell::Bool(false),
            _ => Cell::Text(raw.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// JSON form used for workbook range writes
    pub fn to_json(&self) -> Value {
        match self {
            Cell::Null => Value::Null,
            Cell::Bool(b) => Value::Bool(*b),
            Cell::Int(i) => Value::from(*i),
            Cell::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Cell::Text(s) => Value::String(s.clone()),
            Cell::DateTime(dt) => Value::String(dt.format(DATETIME_FORMAT).to_string()),
        }
    }

    /// Cell from a JSON value; nested structures are kept as their JSON text
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Cell::Null,
            Value::Bool(b) => Cell::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Cell::Int(i),
                None => n.as_f64().map(Cell::Float).unwrap_or(Cell::Null),
            },
            Value::String(s) => Cell::Text(s.clone()),
            other => Cell::Text(other.to_string()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::Int(i) => write!(f, "{i}"),
            Cell::Float(v) => write!(f, "{v}"),
            Cell::Text(s) => f.write_str(s),
            Cell::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
        }
    }
}

/// Value category of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Only nulls
    Empty,
    Integer,
    Float,
    Boolean,
    DateTime,
    Text,
}

impl ColumnKind {
    pub fn of<'a>(cells: impl IntoIterator<Item = &'a Cell>) -> Self {
        let mut kind = ColumnKind::Empty;
        for cell in cells {
            let this = match cell {
                Cell::Null => continue,
                Cell::Int(_) => ColumnKind::Integer,
                Cell::Float(_) => ColumnKind::Float,
                Cell::Bool(_) => ColumnKind::Boolean,
                Cell::DateTime(_) => ColumnKind::DateTime,
                Cell::Text(_) => return ColumnKind::Text,
            };
            kind = match (kind, this) {
                (ColumnKind::Empty, k) => k,
                (a, b) if a == b => a,
                (ColumnKind::Integer, ColumnKind::Float) | (ColumnKind::Float, ColumnKind::Integer) => {
                    ColumnKind::Float
                }
                _ => return ColumnKind::Text,
            };
        }
        kind
    }
}

/// Rows × named columns
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row; short rows are padded with nulls, long rows truncated
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Null);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cells of one column, top to bottom
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Cell> + '_> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| &row[idx]))
    }

    pub fn column_kind(&self, idx: usize) -> ColumnKind {
        ColumnKind::of(self.rows.iter().map(|row| &row[idx]))
    }

    /// Add (or overwrite) a column holding the same value on every row
    pub fn set_constant_column(&mut self, name: &str, value: Cell) {
        match self.column_index(name) {
            Some(idx) => {
                for row in &mut self.rows {
                    row[idx] = value.clone();
                }
            }
            None => {
                self.columns.push(name.to_string());
                for row in &mut self.rows {
                    row.push(value.clone());
                }
            }
        }
    }

    /// Rewrite every cell of a column in place
    pub fn map_column(&mut self, name: &str, mut f: impl FnMut(&Cell) -> Cell) -> bool {
        let Some(idx) = self.column_index(name) else {
            return false;
        };
        for row in &mut self.rows {
            row[idx] = f(&row[idx]);
        }
        true
    }

    /// Append the rows of `other`, matching columns by name.
    ///
    /// Columns only present in `other` are added; cells missing on either
    /// side become null.
    pub fn append(&mut self, other: Table) {
        for name in &other.columns {
            if self.column_index(name).is_none() {
                self.set_constant_column(name, Cell::Null);
            }
        }
        let mapping: Vec<Option<usize>> = self
            .columns
            .iter()
            .map(|c| other.column_index(c))
            .collect();
        for mut row in other.rows {
            let aligned = mapping
                .iter()
                .map(|m| m.map(|i| std::mem::take(&mut row[i])).unwrap_or_default())
                .collect();
            self.rows.push(aligned);
        }
    }

    /// Keep rows for which `keep` returns true
    pub fn retain_rows(&mut self, mut keep: impl FnMut(&[Cell]) -> bool) {
        self.rows.retain(|row| keep(row));
    }

    /// Make numeric columns uniform: a column mixing integers and floats
    /// becomes all floats.
    pub fn normalize_numeric(&mut self) {
        for idx in 0..self.columns.len() {
            if self.column_kind(idx) != ColumnKind::Float {
                continue;
            }
            for row in &mut self.rows {
                if let Cell::Int(i) = row[idx] {
                    row[idx] = Cell::Float(i as f64);
                }
            }
        }
    }

    /// Build a table from JSON objects; columns follow first-seen key order
    pub fn from_json_records(records: &[Value]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            if let Some(obj) = record.as_object() {
                for key in obj.keys() {
                    if !columns.iter().any(|c| c == key) {
                        columns.push(key.clone());
                    }
                }
            }
        }

        let mut table = Table::new(columns.clone());
        for record in records {
            let row = columns
                .iter()
                .map(|c| record.get(c).map(Cell::from_json).unwrap_or_default())
                .collect();
            table.push_row(row);
        }
        table
    }

    /// Rows as JSON arrays (header excluded)
    pub fn to_json_rows(&self) -> Vec<Vec<Value>> {
        self.rows
            .iter()
            .map(|row| row.iter().map(Cell::to_json).collect())
            .collect()
    }

    /// Write the table as CSV, header first
    pub fn write_csv<W: Write>(&self, writer: W) -> csv::Result<()> {
        let mut out = csv::Writer::from_writer(writer);
        out.write_record(&self.columns)?;
        for row in &self.rows {
            out.write_record(row.iter().map(|c| c.to_string()))?;
        }
        out.flush()?;
        Ok(())
    }
}

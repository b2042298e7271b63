//! Tabular collection of dissertations, keyed and deduplicated by id.
//!
//! Every row carries the same column set. Metric columns are added with
//! [`DissertationCorpus::add_column`] and filled in place by the pipeline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

use memoria_common::{MemoriaError, Result};

use crate::dissertation::Dissertation;

pub const COL_TITLE: &str = "title";
pub const COL_PUBLICATION_DATE: &str = "publication_date";
pub const COL_URL: &str = "url";
pub const COL_DELETED: &str = "deleted";

pub const BASE_COLUMNS: &[&str] = &[COL_TITLE, COL_PUBLICATION_DATE, COL_URL, COL_DELETED];

/// One cell of the corpus table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Date(NaiveDate),
    Text(String),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            CellValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            CellValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CellValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Integer(v) => write!(f, "{v}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for CellValue {
    fn from(v: &str) -> Self { CellValue::Text(v.to_string()) }
}
impl From<String> for CellValue {
    fn from(v: String) -> Self { CellValue::Text(v) }
}
impl From<bool> for CellValue {
    fn from(v: bool) -> Self { CellValue::Bool(v) }
}
impl From<i64> for CellValue {
    fn from(v: i64) -> Self { CellValue::Integer(v) }
}
impl From<usize> for CellValue {
    fn from(v: usize) -> Self { CellValue::Integer(v as i64) }
}
impl From<f64> for CellValue {
    fn from(v: f64) -> Self { CellValue::Float(v) }
}
impl From<NaiveDate> for CellValue {
    fn from(v: NaiveDate) -> Self { CellValue::Date(v) }
}
impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(CellValue::Null)
    }
}

/// Borrowed view of one row, with cells addressable by column name.
#[derive(Debug, Clone, Copy)]
pub struct RowRef<'a> {
    columns: &'a [String],
    values: &'a [CellValue],
}

impl<'a> RowRef<'a> {
    pub fn get(&self, column: &str) -> Option<&'a CellValue> {
        self.columns.iter().position(|c| c == column).map(|i| &self.values[i])
    }

    pub fn values(&self) -> &'a [CellValue] {
        self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a CellValue)> + 'a {
        self.columns.iter().map(String::as_str).zip(self.values.iter())
    }
}

/// Owned snapshot of the whole table, used for bulk replacement.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CorpusFrame {
    pub columns: Vec<String>,
    pub rows: Vec<(String, Vec<CellValue>)>,
}

#[derive(Debug, Clone)]
pub struct DissertationCorpus {
    columns: Vec<String>,
    defaults: Vec<CellValue>,
    rows: Vec<(String, Vec<CellValue>)>,
    index: HashMap<String, usize>,
}

impl Default for DissertationCorpus {
    fn default() -> Self {
        Self::new()
    }
}

impl DissertationCorpus {
    pub fn new() -> Self {
        Self {
            columns: BASE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            defaults: vec![CellValue::Null; BASE_COLUMNS.len()],
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Add a dissertation as a new row. Returns `false` and logs a warning
    /// when a row with the same id already exists; the table is left as is.
    pub fn append(&mut self, dissertation: &Dissertation) -> bool {
        let id = dissertation.id();
        if self.contains(id) {
            warn!(id = %id, "Duplicate found: dissertation {} not added to list", id);
            return false;
        }

        let mut values = self.defaults.clone();
        values[0] = dissertation.title().into();
        values[1] = dissertation.canonical_date().into();
        values[2] = dissertation.canonical_url().into();
        values[3] = dissertation.is_deleted().into();

        self.index.insert(id.to_string(), self.rows.len());
        self.rows.push((id.to_string(), values));
        true
    }

    /// Add a column filled with `default` for every existing row and for
    /// rows appended later.
    pub fn add_column(&mut self, name: &str, default: impl Into<CellValue>) -> Result<()> {
        if name.trim().is_empty() {
            return Err(MemoriaError::InvalidArgument(
                "column label must be a non-empty string".to_string(),
            ));
        }
        if self.has_column(name) {
            return Err(MemoriaError::InvalidArgument(format!("Column {} already exists.", name)));
        }

        let default = default.into();
        for (_, values) in &mut self.rows {
            values.push(default.clone());
        }
        self.columns.push(name.to_string());
        self.defaults.push(default);
        Ok(())
    }

    pub fn row(&self, id: &str) -> Option<RowRef<'_>> {
        self.index.get(id).map(|&i| RowRef {
            columns: &self.columns,
            values: &self.rows[i].1,
        })
    }

    pub fn get(&self, id: &str, column: &str) -> Option<&CellValue> {
        self.row(id).and_then(|row| row.get(column))
    }

    /// Overwrite one cell. Both the row and the column must exist.
    pub fn set(&mut self, id: &str, column: &str, value: impl Into<CellValue>) -> Result<()> {
        let col = self
            .columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| MemoriaError::InvalidArgument(format!("unknown column {}", column)))?;
        let &row = self
            .index
            .get(id)
            .ok_or_else(|| MemoriaError::InvalidArgument(format!("unknown row {}", id)))?;
        self.rows[row].1[col] = value.into();
        Ok(())
    }

    /// Rows in table order. Each call starts a fresh pass.
    pub fn iter(&self) -> impl Iterator<Item = (&str, RowRef<'_>)> + '_ {
        self.rows.iter().map(move |(id, values)| {
            (
                id.as_str(),
                RowRef {
                    columns: &self.columns,
                    values,
                },
            )
        })
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.rows.iter().map(|(id, _)| id.as_str())
    }

    /// Keep only the rows for which `keep` returns true.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str, RowRef<'_>) -> bool,
    {
        let columns = &self.columns;
        self.rows.retain(|(id, values)| keep(id, RowRef { columns, values }));
        self.reindex();
    }

    pub fn to_frame(&self) -> CorpusFrame {
        CorpusFrame {
            columns: self.columns.clone(),
            rows: self.rows.clone(),
        }
    }

    /// Replace every row with those of `frame`. The frame must carry
    /// exactly the current column set, in the same order.
    pub fn replace(&mut self, frame: CorpusFrame) -> Result<()> {
        if frame.columns != self.columns {
            return Err(MemoriaError::SchemaMismatch {
                expected: self.columns.clone(),
                found: frame.columns,
            });
        }

        let mut index = HashMap::with_capacity(frame.rows.len());
        for (i, (id, values)) in frame.rows.iter().enumerate() {
            if values.len() != self.columns.len() {
                return Err(MemoriaError::SchemaMismatch {
                    expected: self.columns.clone(),
                    found: vec![format!("{} values in row {}", values.len(), id)],
                });
            }
            if index.insert(id.clone(), i).is_some() {
                return Err(MemoriaError::InvalidArgument(format!("duplicate row id {}", id)));
            }
        }

        self.rows = frame.rows;
        self.index = index;
        Ok(())
    }

    fn reindex(&mut self) {
        self.index = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, (id, _))| (id.clone(), i))
            .collect();
    }
}

//! Typed module results and their text rendering.

use std::fmt::{self, Write};

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Errors constructing a result value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResultError {
    #[error("table row {row} has {found} columns, expected {expected}")]
    RaggedTable {
        row: usize,
        found: usize,
        expected: usize,
    },

    #[error("{what} has {found} entries, table has {expected}")]
    LabelMismatch {
        what: &'static str,
        found: usize,
        expected: usize,
    },
}

/// Kind tag of a [`ModuleResult`], used by modules to declare their output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    Scalar,
    Table,
    Mapping,
    Figure,
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Scalar => "scalar",
            Self::Table => "table",
            Self::Mapping => "mapping",
            Self::Figure => "figure",
        };
        f.write_str(s)
    }
}

/// A rectangular numeric table with optional column headers and row labels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    values: Vec<Vec<f64>>,
    header: Option<Vec<String>>,
    row_labels: Option<Vec<String>>,
}

impl Table {
    /// Creates a table. Every row must have the same length, and a header
    /// must name every column.
    pub fn new(values: Vec<Vec<f64>>, header: Option<Vec<String>>) -> Result<Self, ResultError> {
        let expected = values.first().map_or(0, Vec::len);
        if let Some((row, found)) = values
            .iter()
            .map(Vec::len)
            .enumerate()
            .find(|&(_, len)| len != expected)
        {
            return Err(ResultError::RaggedTable {
                row,
                found,
                expected,
            });
        }
        if let Some(header) = &header {
            if !values.is_empty() && header.len() != expected {
                return Err(ResultError::LabelMismatch {
                    what: "header",
                    found: header.len(),
                    expected,
                });
            }
        }
        Ok(Self {
            values,
            header,
            row_labels: None,
        })
    }

    /// Attaches one label per row.
    pub fn with_row_labels(mut self, labels: Vec<String>) -> Result<Self, ResultError> {
        if labels.len() != self.values.len() {
            return Err(ResultError::LabelMismatch {
                what: "row labels",
                found: labels.len(),
                expected: self.values.len(),
            });
        }
        self.row_labels = Some(labels);
        Ok(self)
    }

    /// `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.values.len(), self.values.first().map_or(0, Vec::len))
    }

    pub fn values(&self) -> &[Vec<f64>] {
        &self.values
    }

    pub fn header(&self) -> Option<&[String]> {
        self.header.as_deref()
    }

    pub fn row_labels(&self) -> Option<&[String]> {
        self.row_labels.as_deref()
    }

    /// Value at `(row, column)`.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.values.get(row)?.get(col).copied()
    }

    /// Value in `row` under the column named `name`.
    pub fn get_by_name(&self, row: usize, name: &str) -> Option<f64> {
        let col = self.header.as_ref()?.iter().position(|h| h == name)?;
        self.get(row, col)
    }
}

/// Ordered key/value pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mapping(Vec<(String, f64)>);

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry, replacing an existing entry with the same key.
    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for Mapping {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        let mut mapping = Self::new();
        for (key, value) in iter {
            mapping.insert(key, value);
        }
        mapping
    }
}

impl Serialize for Mapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Opaque handle to a rendered plot. The core never produces or inspects
/// figure content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Figure {
    pub name: String,
    #[serde(skip)]
    pub data: Vec<u8>,
}

/// One typed output of a module.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ModuleResult {
    Scalar(f64),
    Table(Table),
    Mapping(Mapping),
    Figure(Figure),
}

impl ModuleResult {
    pub const fn kind(&self) -> ResultKind {
        match self {
            Self::Scalar(_) => ResultKind::Scalar,
            Self::Table(_) => ResultKind::Table,
            Self::Mapping(_) => ResultKind::Mapping,
            Self::Figure(_) => ResultKind::Figure,
        }
    }

    pub const fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(value) => Some(*value),
            _ => None,
        }
    }

    pub const fn as_table(&self) -> Option<&Table> {
        match self {
            Self::Table(table) => Some(table),
            _ => None,
        }
    }

    pub const fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Self::Mapping(mapping) => Some(mapping),
            _ => None,
        }
    }
}

impl fmt::Display for ModuleResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(value) => writeln!(f, "{}", format_number(*value)),
            Self::Table(table) => {
                let mut header: Option<Vec<String>> = table.header.clone();
                let mut rows: Vec<Vec<String>> = table
                    .values
                    .iter()
                    .map(|row| row.iter().map(|&v| format_number(v)).collect())
                    .collect();
                if let Some(labels) = &table.row_labels {
                    if let Some(header) = header.as_mut() {
                        header.insert(0, String::new());
                    }
                    for (row, label) in rows.iter_mut().zip(labels) {
                        row.insert(0, label.clone());
                    }
                }
                f.write_str(&render_grid(header.as_deref(), &rows))
            }
            Self::Mapping(mapping) => {
                let header = ["Key".to_string(), "Value".to_string()];
                let rows: Vec<Vec<String>> = mapping
                    .iter()
                    .map(|(k, v)| vec![k.to_string(), format_number(v)])
                    .collect();
                f.write_str(&render_grid(Some(&header), &rows))
            }
            Self::Figure(figure) => {
                writeln!(f, "figure {} ({} bytes)", figure.name, figure.data.len())
            }
        }
    }
}

/// Formats whole numbers without a fractional part, everything else with
/// four decimals.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        format!("{value:.4}")
    }
}

/// Renders a bordered, left-aligned text grid.
fn render_grid(header: Option<&[String]>, rows: &[Vec<String>]) -> String {
    let columns = header
        .map(<[String]>::len)
        .or_else(|| rows.first().map(Vec::len))
        .unwrap_or(0);
    let mut widths = vec![0; columns];
    for line in header.into_iter().chain(rows.iter().map(Vec::as_slice)) {
        for (width, cell) in widths.iter_mut().zip(line) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let border = |fill: char| {
        let mut line = String::from("+");
        for &width in &widths {
            line.extend(std::iter::repeat_n(fill, width + 2));
            line.push('+');
        }
        line.push('\n');
        line
    };
    let row_line = |cells: &[String]| {
        let mut line = String::from("|");
        for (cell, &width) in cells.iter().zip(&widths) {
            let _ = write!(line, " {cell:<width$} |");
        }
        line.push('\n');
        line
    };

    let mut out = border('-');
    if let Some(header) = header {
        out.push_str(&row_line(header));
        out.push_str(&border('='));
    }
    for row in rows {
        out.push_str(&row_line(row));
    }
    out.push_str(&border('-'));
    out
}

// 📋 Table Model - in-memory spreadsheet rows
// Headers + rows of typed cells, with the provenance line of every row

use crate::error::{InputRole, PipelineError, PipelineResult};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use tracing::warn;

// ============================================================================
// CELL
// ============================================================================

/// One spreadsheet value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Display form; empty cells read as ""
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Cell::Empty => Cow::Borrowed(""),
            Cell::Text(s) => Cow::Borrowed(s.as_str()),
            Cell::Number(n) => Cow::Owned(format_number(*n)),
            Cell::Bool(b) => Cow::Borrowed(if *b { "TRUE" } else { "FALSE" }),
            Cell::DateTime(dt) => Cow::Owned(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }

    /// Join key for account identifiers
    ///
    /// `1001.0` and `"1001"` produce the same key. Empty cells have no key.
    pub fn key(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            other => Some(other.as_text().into_owned()),
        }
    }

    /// Numeric value for amount arithmetic
    ///
    /// Blank cells count as 0. Text is trimmed and thousands separators are
    /// dropped before parsing. Booleans, dates and non-finite values are not
    /// amounts.
    pub fn to_amount(&self) -> Option<f64> {
        match self {
            Cell::Empty => Some(0.0),
            Cell::Number(n) if n.is_finite() => Some(*n),
            Cell::Number(_) => None,
            Cell::Text(s) => {
                let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
                if cleaned.is_empty() {
                    return Some(0.0);
                }
                cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
            }
            Cell::Bool(_) | Cell::DateTime(_) => None,
        }
    }
}

/// Integers print without decimals
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

// ============================================================================
// ROW
// ============================================================================

static EMPTY_CELL: Cell = Cell::Empty;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// 1-based line in the source spreadsheet (the header is line 1)
    pub line: usize,
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn new(line: usize, cells: Vec<Cell>) -> Self {
        Row { line, cells }
    }

    pub fn get(&self, index: usize) -> &Cell {
        self.cells.get(index).unwrap_or(&EMPTY_CELL)
    }
}

// ============================================================================
// TABLE
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Table {
            headers,
            rows: Vec::new(),
        }
    }

    /// Build a table from plain cell rows, numbering lines from 2
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let mut table = Table::new(headers);
        for (i, cells) in rows.into_iter().enumerate() {
            table.push_row(Row::new(i + 2, cells));
        }
        table
    }

    /// Append a row, padding or truncating it to the header width
    pub fn push_row(&mut self, mut row: Row) {
        let dropped = row.cells.iter().skip(self.headers.len()).filter(|c| !c.is_empty()).count();
        if dropped > 0 {
            warn!(line = row.line, dropped, "row wider than header; extra cells dropped");
        }
        row.cells.resize(self.headers.len(), Cell::Empty);
        self.rows.push(row);
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Exact header lookup
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Exact header lookup that fails with a `MissingColumn` for `role`
    pub fn require_column(&self, name: &str, role: InputRole) -> PipelineResult<usize> {
        self.column_index(name)
            .ok_or_else(|| PipelineError::missing_column(role, name))
    }

    /// Copy of the table with surrounding whitespace trimmed from every header
    pub fn with_trimmed_headers(&self) -> Table {
        Table {
            headers: self.headers.iter().map(|h| h.trim().to_string()).collect(),
            rows: self.rows.clone(),
        }
    }

    /// Project onto `names` in that order, silently skipping absent headers
    pub fn select_columns(&self, names: &[&str]) -> Table {
        let picked: Vec<(usize, &str)> = names
            .iter()
            .filter_map(|name| self.column_index(name).map(|i| (i, *name)))
            .collect();

        Table {
            headers: picked.iter().map(|(_, name)| name.to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| Row {
                    line: row.line,
                    cells: picked.iter().map(|(i, _)| row.get(*i).clone()).collect(),
                })
                .collect(),
        }
    }

    /// Keep the rows matching `keep`, preserving order
    pub fn filter_rows<F>(&self, mut keep: F) -> Table
    where
        F: FnMut(&Row) -> bool,
    {
        Table {
            headers: self.headers.clone(),
            rows: self.rows.iter().filter(|&row| keep(row)).cloned().collect(),
        }
    }

    /// Append a column; `values` must hold one cell per row
    pub fn with_column(&self, name: &str, values: Vec<Cell>) -> Table {
        debug_assert_eq!(values.len(), self.rows.len());

        let mut headers = self.headers.clone();
        headers.push(name.to_string());

        let rows = self
            .rows
            .iter()
            .zip(values)
            .map(|(row, value)| {
                let mut cells = row.cells.clone();
                cells.push(value);
                Row {
                    line: row.line,
                    cells,
                }
            })
            .collect();

        Table { headers, rows }
    }

    /// SHA-256 over headers and cell values (row lines excluded)
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for header in &self.headers {
            hasher.update(header.as_bytes());
            hasher.update([0x1f]);
        }
        hasher.update([0x1e]);

        for row in &self.rows {
            for cell in &row.cells {
                let tag: u8 = match cell {
                    Cell::Empty => b'E',
                    Cell::Text(_) => b'T',
                    Cell::Number(_) => b'N',
                    Cell::Bool(_) => b'B',
                    Cell::DateTime(_) => b'D',
                };
                hasher.update([tag]);
                match cell {
                    Cell::Number(n) => hasher.update(n.to_bits().to_be_bytes()),
                    other => hasher.update(other.as_text().as_bytes()),
                }
                hasher.update([0x1f]);
            }
            hasher.update([0x1e]);
        }

        format!("{:x}", hasher.finalize())
    }
}

/// Coerce one cell to an amount, attributing failures to its source row
pub(crate) fn amount_at(
    row: &Row,
    index: usize,
    column: &str,
    role: InputRole,
) -> PipelineResult<f64> {
    let cell = row.get(index);
    cell.to_amount().ok_or_else(|| PipelineError::NumericCoercion {
        role,
        column: column.to_string(),
        row: row.line,
        value: cell.as_text().into_owned(),
    })
}

// ============================================================================
// TESTS
// ============================================================================

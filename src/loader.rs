// 📂 Table Loader - spreadsheet and CSV exports → Table
// One reader per file format behind a common trait; the first worksheet of a
// workbook is the data, its first row the headers.

use crate::table::{Cell, Row, Table};
use anyhow::{anyhow, bail, Context, Result};
use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Range, Reader, Sheets};
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use tracing::debug;

// ============================================================================
// CORE TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceFormat {
    /// xlsx, xlsm, xls, xlsb, ods
    Spreadsheet,
    Csv,
}

impl SourceFormat {
    pub fn name(&self) -> &str {
        match self {
            SourceFormat::Spreadsheet => "Spreadsheet",
            SourceFormat::Csv => "CSV",
        }
    }

    /// Detect the format from a file name's extension
    pub fn detect(file_name: &str) -> Result<SourceFormat> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Ok(SourceFormat::Spreadsheet),
            "csv" => Ok(SourceFormat::Csv),
            _ => Err(anyhow!("Unsupported file type for {}: expected .xlsx, .xls or .csv", file_name)),
        }
    }
}

/// TableReader - decode one input file into a Table
pub trait TableReader: Send + Sync {
    fn read_path(&self, path: &Path) -> Result<Table>;

    /// Decode an in-memory upload; `name` is only used in messages
    fn read_bytes(&self, name: &str, bytes: Vec<u8>) -> Result<Table>;

    fn format(&self) -> SourceFormat;
}

pub fn get_reader(format: SourceFormat) -> Box<dyn TableReader> {
    match format {
        SourceFormat::Spreadsheet => Box::new(SpreadsheetReader::new()),
        SourceFormat::Csv => Box::new(CsvReader::new()),
    }
}

/// Load a table from disk, choosing the reader by extension
pub fn load_table(path: &Path) -> Result<Table> {
    let name = path.display().to_string();
    let reader = get_reader(SourceFormat::detect(&name)?);
    let table = reader.read_path(path)?;
    debug!(file = %name, format = reader.format().name(), rows = table.row_count(), columns = table.column_count(), "table loaded");
    Ok(table)
}

/// Load a table from uploaded bytes, choosing the reader by file name
pub fn load_table_bytes(file_name: &str, bytes: Vec<u8>) -> Result<Table> {
    let reader = get_reader(SourceFormat::detect(file_name)?);
    let table = reader.read_bytes(file_name, bytes)?;
    debug!(file = %file_name, format = reader.format().name(), rows = table.row_count(), columns = table.column_count(), "upload decoded");
    Ok(table)
}

// ============================================================================
// SPREADSHEET READER
// ============================================================================

pub struct SpreadsheetReader;

impl SpreadsheetReader {
    pub fn new() -> Self {
        SpreadsheetReader
    }

    fn read_workbook<RS: Read + Seek>(&self, name: &str, mut workbook: Sheets<RS>) -> Result<Table> {
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| anyhow!("{} contains no sheets", name))?
            .map_err(|e| anyhow!("Failed to read first sheet of {}: {}", name, e))?;

        Ok(range_to_table(&range))
    }
}

impl Default for SpreadsheetReader {
    fn default() -> Self {
        Self::new()
    }
}

impl TableReader for SpreadsheetReader {
    fn read_path(&self, path: &Path) -> Result<Table> {
        let name = path.display().to_string();
        let workbook = open_workbook_auto(path)
            .map_err(|e| anyhow!("Failed to open spreadsheet {}: {}", name, e))?;
        self.read_workbook(&name, workbook)
    }

    fn read_bytes(&self, name: &str, bytes: Vec<u8>) -> Result<Table> {
        let workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
            .map_err(|e| anyhow!("Failed to open spreadsheet {}: {}", name, e))?;
        self.read_workbook(name, workbook)
    }

    fn format(&self) -> SourceFormat {
        SourceFormat::Spreadsheet
    }
}

/// Convert a worksheet range; fully blank rows are skipped
fn range_to_table(range: &Range<Data>) -> Table {
    // Absolute 0-based sheet row of the range's first row
    let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);
    let mut rows = range.rows();

    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row
            .iter()
            .enumerate()
            .map(|(i, cell)| match data_to_cell(cell) {
                Cell::Empty => format!("Unnamed: {}", i),
                other => other.as_text().into_owned(),
            })
            .collect(),
        None => return Table::default(),
    };

    let mut table = Table::new(headers);
    for (offset, data) in rows.enumerate() {
        let cells: Vec<Cell> = data.iter().map(data_to_cell).collect();
        if cells.iter().all(Cell::is_empty) {
            continue;
        }
        // header sits on line first_row + 1, data starts one below
        table.push_row(Row::new(first_row + offset + 2, cells));
    }
    table
}

fn data_to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::text(s.as_str()),
        Data::Float(n) => Cell::Number(*n),
        Data::Int(n) => Cell::Number(*n as f64),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) => Cell::DateTime(value),
            None => Cell::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => Cell::text(s.as_str()),
        Data::DurationIso(s) => Cell::text(s.as_str()),
        Data::Error(e) => Cell::Text(format!("#{:?}", e)),
    }
}

// ============================================================================
// CSV READER
// ============================================================================

pub struct CsvReader;

impl CsvReader {
    pub fn new() -> Self {
        CsvReader
    }

    fn read_from<R: Read>(&self, name: &str, source: R) -> Result<Table> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(source);

        let headers: Vec<String> = reader
            .headers()
            .with_context(|| format!("Failed to read CSV header of {}", name))?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();

        let headers_len = headers.len();
        let mut table = Table::new(headers);
        for (i, result) in reader.records().enumerate() {
            let record = result.with_context(|| format!("Failed to parse CSV line {} in {}", i + 2, name))?;
            let line = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(i + 2);

            // Trailing empty fields are tolerated; data past the last header is not
            if record.iter().skip(headers_len).any(|field| !field.is_empty()) {
                bail!(
                    "CSV line {} in {} has {} fields but the header has {}",
                    line,
                    name,
                    record.len(),
                    headers_len
                );
            }

            let cells: Vec<Cell> = record.iter().map(Cell::text).collect();
            if cells.iter().all(Cell::is_empty) {
                continue;
            }
            table.push_row(Row::new(line, cells));
        }

        Ok(table)
    }
}

impl Default for CsvReader {
    fn default() -> Self {
        Self::new()
    }
}

impl TableReader for CsvReader {
    fn read_path(&self, path: &Path) -> Result<Table> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open file: {}", path.display()))?;
        self.read_from(&path.display().to_string(), file)
    }

    fn read_bytes(&self, name: &str, bytes: Vec<u8>) -> Result<Table> {
        self.read_from(name, Cursor::new(bytes))
    }

    fn format(&self) -> SourceFormat {
        SourceFormat::Csv
    }
}

// ============================================================================
// TESTS
// ============================================================================

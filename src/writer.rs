// 📤 Extract Writer - Table → .xlsx / .csv bytes

use crate::table::{Cell, Table};
use anyhow::{anyhow, Context, Result};
use rust_xlsxwriter::{Format, FormatBorder, Workbook};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_SHEET_NAME: &str = "Loan Portfolio";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractFormat {
    Xlsx,
    Csv,
}

impl ExtractFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExtractFormat::Xlsx => "xlsx",
            ExtractFormat::Csv => "csv",
        }
    }

    /// Format of a stored extract, from its file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_lowercase();
        match extension.as_str() {
            "xlsx" => Some(ExtractFormat::Xlsx),
            "csv" => Some(ExtractFormat::Csv),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExtractFormat::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            ExtractFormat::Csv => "text/csv",
        }
    }
}

/// Encode `table` in `format`; `sheet_name` only applies to workbooks
pub fn encode(table: &Table, format: ExtractFormat, sheet_name: &str) -> Result<Vec<u8>> {
    match format {
        ExtractFormat::Xlsx => write_xlsx(table, sheet_name),
        ExtractFormat::Csv => write_csv(table),
    }
}

/// Single-sheet workbook, bold bordered header row, typed cells
pub fn write_xlsx(table: &Table, sheet_name: &str) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold().set_border(FormatBorder::Thin);
    let date_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");

    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name(sheet_name)
        .with_context(|| format!("Invalid sheet name '{}'", sheet_name))?;

    for (col, header) in table.headers().iter().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, header, &header_format)
            .with_context(|| format!("Failed to write header '{}'", header))?;
    }

    for (i, row) in table.rows().iter().enumerate() {
        let r = (i + 1) as u32;
        for (col, cell) in row.cells.iter().enumerate() {
            let c = col as u16;
            let written = match cell {
                Cell::Empty => continue,
                Cell::Text(s) => worksheet.write_string(r, c, s),
                Cell::Number(n) => worksheet.write_number(r, c, *n),
                Cell::Bool(b) => worksheet.write_boolean(r, c, *b),
                Cell::DateTime(dt) => worksheet.write_datetime_with_format(r, c, dt, &date_format),
            };
            written.with_context(|| format!("Failed to write cell at row {}, column {}", r + 1, c + 1))?;
        }
    }

    workbook
        .save_to_buffer()
        .context("Failed to encode XLSX workbook")
}

pub fn write_csv(table: &Table) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(table.headers())
        .context("Failed to write CSV header")?;

    for row in table.rows() {
        writer
            .write_record(row.cells.iter().map(|c| c.as_text().into_owned()))
            .with_context(|| format!("Failed to write CSV row from line {}", row.line))?;
    }

    writer
        .into_inner()
        .map_err(|e| anyhow!("Failed to flush CSV output: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_table() -> Table {
        Table::from_rows(
            vec!["loan_account_number".to_string(), "Accrul_Amount".to_string(), "AUM".to_string()],
            vec![
                vec![Cell::text("L1"), Cell::Number(350.0), Cell::Number(1200.5)],
                vec![Cell::text("L, 2"), Cell::Number(0.0), Cell::Empty],
            ],
        )
    }

    #[test]
    fn test_write_csv() {
        let bytes = write_csv(&create_test_table()).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert_eq!(
            text,
            "loan_account_number,Accrul_Amount,AUM\nL1,350,1200.5\n\"L, 2\",0,\n"
        );
    }

    #[test]
    fn test_write_xlsx_produces_zip_container() {
        let bytes = write_xlsx(&create_test_table(), DEFAULT_SHEET_NAME).unwrap();
        // xlsx is a zip archive
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn test_invalid_sheet_name_is_an_error() {
        assert!(write_xlsx(&create_test_table(), "bad/name").is_err());
    }

    #[test]
    fn test_extension() {
        assert_eq!(ExtractFormat::Xlsx.extension(), "xlsx");
        assert_eq!(ExtractFormat::Csv.extension(), "csv");
    }

    #[test]
    fn test_format_from_stored_file_name() {
        let xlsx = ExtractFormat::from_path(Path::new("uploads/20250309_140507_Loan_Portfolio.XLSX"));
        assert_eq!(xlsx, Some(ExtractFormat::Xlsx));
        assert_eq!(
            xlsx.map(|f| f.mime_type().to_string()),
            Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".to_string())
        );
        assert_eq!(ExtractFormat::from_path(Path::new("a.csv")).map(|f| f.mime_type().to_string()), Some("text/csv".to_string()));
        assert_eq!(ExtractFormat::from_path(Path::new("notes.txt")), None);
        assert_eq!(ExtractFormat::from_path(Path::new("no_extension")), None);
    }
}

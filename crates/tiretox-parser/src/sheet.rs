//! Rectangular cell grid read from a CSV export or the first worksheet of a workbook.
//!
//! Vendor layouts are described in absolute cell positions (column B, header on row 2),
//! so workbook ranges are padded back out to start at A1.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::errors::ParserError;

static EMPTY: Cell = Cell::Empty;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    DateTime(NaiveDateTime),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(text) => Some(text.trim()),
            _ => None,
        }
    }

    /// True when the cell is text containing `token`.
    pub fn contains(&self, token: &str) -> bool {
        self.as_text().is_some_and(|text| text.contains(token))
    }

    pub fn matches(&self, name: &str) -> bool {
        self.as_text().is_some_and(|text| text == name)
    }

    pub fn display(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(text) => text.trim().to_string(),
            Cell::Number(value) => value.to_string(),
            Cell::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Sheet {
    rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new(rows: Vec<Vec<Cell>>) -> Self {
        Self { rows }
    }

    /// Reads a CSV export. Numeric fields become [`Cell::Number`]; everything else stays
    /// text and is interpreted by the layout parser.
    pub fn from_csv_str(content: &str) -> Result<Self, ParserError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(content.as_bytes());

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(csv_cell).collect());
        }
        Ok(Self { rows })
    }

    /// Reads the first worksheet of an xlsx/xls/ods workbook held in memory.
    pub fn from_workbook_bytes(bytes: &[u8]) -> Result<Self, ParserError> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or(ParserError::NoWorksheet)??;

        let (row_offset, col_offset) = range
            .start()
            .map(|(row, col)| (row as usize, col as usize))
            .unwrap_or((0, 0));

        let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); row_offset];
        for data_row in range.rows() {
            let mut row = vec![Cell::Empty; col_offset];
            row.extend(data_row.iter().map(workbook_cell));
            rows.push(row);
        }
        Ok(Self { rows })
    }

    pub fn from_path(path: &Path) -> Result<Self, ParserError> {
        let bytes = fs::read(path).map_err(|source| ParserError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&bytes, &extension_of(path))
    }

    /// Dispatches an in-memory export on its file extension (without the dot).
    pub fn from_bytes(bytes: &[u8], extension: &str) -> Result<Self, ParserError> {
        match extension.to_ascii_lowercase().as_str() {
            "csv" | "txt" => Self::from_csv_str(&String::from_utf8_lossy(bytes)),
            "xlsx" | "xlsm" | "xls" | "ods" => Self::from_workbook_bytes(bytes),
            other => Err(ParserError::UnsupportedExtension(other.to_string())),
        }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, row: usize) -> &[Cell] {
        self.rows.get(row).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(col))
            .unwrap_or(&EMPTY)
    }
}

pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

fn csv_cell(field: &str) -> Cell {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return Cell::Empty;
    }
    match trimmed.parse::<f64>() {
        Ok(value) if !trimmed.eq_ignore_ascii_case("nan") => Cell::Number(value),
        _ => Cell::Text(trimmed.to_string()),
    }
}

fn workbook_cell(value: &Data) -> Cell {
    match value {
        Data::Empty => Cell::Empty,
        Data::String(text) => {
            if text.trim().is_empty() {
                Cell::Empty
            } else {
                Cell::Text(text.clone())
            }
        }
        Data::Float(number) => Cell::Number(*number),
        Data::Int(number) => Cell::Number(*number as f64),
        Data::Bool(flag) => Cell::Text(flag.to_string()),
        Data::DateTime(excel) => match excel.as_datetime() {
            Some(dt) => Cell::DateTime(dt),
            None => Cell::Number(excel.as_f64()),
        },
        Data::DateTimeIso(text) => NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
            .map(Cell::DateTime)
            .unwrap_or_else(|_| Cell::Text(text.clone())),
        _ => Cell::Empty,
    }
}

/// Converts a spreadsheet serial date (days since 1899-12-30) to a naive timestamp,
/// rounded to the millisecond.
pub fn excel_serial_to_naive(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round();
    if millis.abs() >= i64::MAX as f64 {
        return None;
    }
    epoch.checked_add_signed(Duration::try_milliseconds(millis as i64)?)
}

use chrono::{DateTime, NaiveDateTime};
use polars::prelude::DataFrame;

use crate::errors::ParserError;
use crate::frame::{naive_to_micros, EcColumn, FrameColumns};
use crate::sheet::{excel_serial_to_naive, Cell, Sheet};

static TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%y %I:%M:%S %p",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M",
];

static OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%:z",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
];

const AGGREGATE_TOKENS: &[&str] = &["min", "max", "avg", "mean", "std", "stdev"];

/// Parses a timestamp cell to naive microseconds. Empty cells yield `None`; timestamps
/// carrying a UTC offset keep their wall-clock time.
pub(crate) fn parse_timestamp(
    parser: &'static str,
    cell: &Cell,
    line_index: usize,
) -> Result<Option<i64>, ParserError> {
    match cell {
        Cell::Empty => Ok(None),
        Cell::DateTime(dt) => Ok(Some(naive_to_micros(*dt))),
        Cell::Number(serial) => excel_serial_to_naive(*serial)
            .map(|dt| Some(naive_to_micros(dt)))
            .ok_or_else(|| ParserError::DataRow {
                parser,
                line_index,
                message: format!("invalid serial date {serial}"),
            }),
        Cell::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            parse_timestamp_text(trimmed)
                .map(|dt| Some(naive_to_micros(dt)))
                .ok_or_else(|| ParserError::DataRow {
                    parser,
                    line_index,
                    message: format!("invalid timestamp '{trimmed}'"),
                })
        }
    }
}

/// Parses a text timestamp in any accepted layout; a UTC offset is dropped, keeping the
/// wall-clock time.
pub fn parse_timestamp_text(value: &str) -> Option<NaiveDateTime> {
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt);
        }
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(value, fmt) {
            return Some(dt.naive_local());
        }
    }
    None
}

pub(crate) fn parse_optional_f64(
    parser: &'static str,
    cell: &Cell,
    line_index: usize,
    column: &str,
) -> Result<Option<f64>, ParserError> {
    match cell {
        Cell::Empty => Ok(None),
        Cell::Number(value) if value.is_nan() => Ok(None),
        Cell::Number(value) => Ok(Some(*value)),
        Cell::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
                return Ok(None);
            }
            trimmed
                .parse::<f64>()
                .map(Some)
                .map_err(|err| ParserError::DataRow {
                    parser,
                    line_index,
                    message: format!("failed to parse column '{column}' as float: {err}"),
                })
        }
        Cell::DateTime(_) => Err(ParserError::DataRow {
            parser,
            line_index,
            message: format!("column '{column}' contained a date, expected a number"),
        }),
    }
}

pub(crate) fn header_names(sheet: &Sheet, row: usize) -> Vec<String> {
    sheet.row(row).iter().map(Cell::display).collect()
}

pub(crate) fn find_column(header: &[Cell], names: &[&str]) -> Option<usize> {
    header
        .iter()
        .position(|cell| names.iter().any(|name| cell.matches(name)))
}

/// Logger serial from a HOBO header such as `Abs Pres, kPa (LGR S/N: 22084122, SEN S/N: ...)`.
pub(crate) fn serial_from_header(text: &str) -> Option<String> {
    let start = text.find("S/N:")? + "S/N:".len();
    let digits: String = text[start..]
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}

/// Sheet columns of an EC export header: the timestamp column and the source column of
/// each [`EcColumn`], in [`EcColumn::ALL`] order.
pub(crate) fn locate_ec_columns(
    parser: &'static str,
    header: &[Cell],
    row_index: usize,
) -> Result<(usize, Vec<Option<usize>>), ParserError> {
    let timestamp = find_column(header, &["DT", "DateTime", "Datetime", "Date Time"]).ok_or_else(
        || ParserError::InvalidHeader {
            parser,
            row_index,
            message: "no DT/DateTime column".to_string(),
        },
    )?;

    let sources: Vec<Option<usize>> = EcColumn::ALL
        .iter()
        .map(|column| match column {
            EcColumn::Ec => find_column(header, &["EC", "EC(uS/cm)"]),
            EcColumn::Temperature => find_column(header, &["RTCTmp", "Temp(oC)", "Temp"]),
            EcColumn::EcCompensated => find_column(header, &["EC.T", "EC.T(uS/cm)"]),
        })
        .collect();

    if sources.last().copied().flatten().is_none() {
        return Err(ParserError::InvalidHeader {
            parser,
            row_index,
            message: "no EC.T column".to_string(),
        });
    }

    Ok((timestamp, sources))
}

pub(crate) fn is_aggregate_header(header: &str) -> bool {
    header
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|token| {
            AGGREGATE_TOKENS
                .iter()
                .any(|agg| token.eq_ignore_ascii_case(agg))
        })
}

/// Reads data rows from `first_data_row` until the end of the sheet. `sources[i]` is the
/// sheet column feeding output column `i`; `None` leaves it null. Rows with an empty
/// timestamp cell are skipped.
pub(crate) fn collect_rows(
    parser: &'static str,
    sheet: &Sheet,
    first_data_row: usize,
    timestamp_col: usize,
    mut columns: FrameColumns,
    sources: &[Option<usize>],
) -> Result<FrameColumns, ParserError> {
    let names: Vec<String> = columns.names().to_vec();
    let mut row_values: Vec<Option<f64>> = vec![None; sources.len()];

    for row_idx in first_data_row..sheet.height() {
        let line_index = row_idx + 1;
        let Some(timestamp) = parse_timestamp(parser, sheet.cell(row_idx, timestamp_col), line_index)?
        else {
            continue;
        };

        for (target, source) in sources.iter().enumerate() {
            row_values[target] = match source {
                Some(col) => parse_optional_f64(
                    parser,
                    sheet.cell(row_idx, *col),
                    line_index,
                    names.get(target).map(String::as_str).unwrap_or(""),
                )?,
                None => None,
            };
        }
        columns.push_row(timestamp, &row_values);
    }

    if columns.is_empty() {
        return Err(ParserError::EmptyData { parser });
    }
    Ok(columns)
}

pub(crate) fn build_frame(
    parser: &'static str,
    columns: FrameColumns,
) -> Result<DataFrame, ParserError> {
    columns
        .build()
        .map_err(|source| ParserError::Frame { parser, source })
}

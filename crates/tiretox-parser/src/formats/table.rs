use polars::prelude::DataFrame;

use crate::errors::ParserError;
use crate::frame::{self, canonical_name, FrameColumns, SeriesKind, TIMESTAMP, TIMESTAMP_DISPLAY};
use crate::sheet::Sheet;

use super::{build_frame, collect_rows};

const NAME: &str = "TABLE";

/// Reads a table written by the master writer: `Datetime` in A1 followed by display (or
/// canonical) headers. A header-only sheet yields an empty frame.
pub fn parse_table_sheet(sheet: &Sheet, kind: SeriesKind) -> Result<DataFrame, ParserError> {
    let header = sheet.row(0);
    let first = header.first().and_then(|cell| cell.as_text());
    if !first.is_some_and(|text| text == TIMESTAMP_DISPLAY || text.eq_ignore_ascii_case(TIMESTAMP)) {
        return Err(ParserError::InvalidHeader {
            parser: NAME,
            row_index: 1,
            message: format!("cell A1 must be '{TIMESTAMP_DISPLAY}'"),
        });
    }

    let mut names = Vec::new();
    let mut sources = Vec::new();
    for (col, cell) in header.iter().enumerate().skip(1) {
        let Some(text) = cell.as_text() else {
            continue;
        };
        let name = canonical_name(kind, text);
        if names.contains(&name) {
            return Err(ParserError::InvalidHeader {
                parser: NAME,
                row_index: 1,
                message: format!("column '{text}' appears twice"),
            });
        }
        names.push(name);
        sources.push(Some(col));
    }

    match collect_rows(NAME, sheet, 1, 0, FrameColumns::new(&names), &sources) {
        Ok(columns) => build_frame(NAME, columns),
        Err(ParserError::EmptyData { .. }) => {
            frame::empty_frame(&names).map_err(|source| ParserError::Frame {
                parser: NAME,
                source,
            })
        }
        Err(err) => Err(err),
    }
}

//! Per-site master files and formatted xlsx output.

use std::fs;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use rust_xlsxwriter::{Format, Workbook};
use tiretox_parser::frame::{
    self, column_decimals, display_name, SeriesKind, TIMESTAMP, TIMESTAMP_DISPLAY,
};
use tiretox_parser::{parse_table_sheet, Sheet};
use tracing::debug;

use crate::config::PipelineConfig;
use crate::destack::ORIGINAL_TIMESTAMP;
use crate::error::{PipelineError, Result};

pub const SHEET_NAME: &str = "Sheet1";
const DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

pub fn master_file_name(site: &str) -> String {
    format!("{site}_stage_master.xlsx")
}

pub fn master_path(config: &PipelineConfig, site: &str) -> PathBuf {
    config.master_dir.join(master_file_name(site))
}

/// Reads a master file back into canonical columns; `None` if it does not exist yet.
pub fn read_master(path: &Path) -> Result<Option<DataFrame>> {
    if !path.exists() {
        return Ok(None);
    }
    let sheet = Sheet::from_path(path)?;
    let df = parse_table_sheet(&sheet, SeriesKind::Stage).map_err(|err| PipelineError::Master {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    debug!(path = %path.display(), rows = df.height(), "Loaded master file");
    Ok(Some(df))
}

/// Timestamp first, then the declared columns of `kind` present in `df`, then any others
/// in their existing order.
pub fn order_columns(df: &DataFrame, kind: SeriesKind) -> PolarsResult<DataFrame> {
    let present = frame::measurement_columns(df);
    let mut order: Vec<String> = Vec::with_capacity(present.len() + 1);
    for name in df.get_column_names() {
        if name.as_str() == TIMESTAMP || name.as_str() == ORIGINAL_TIMESTAMP {
            order.push(name.to_string());
        }
    }
    for declared in kind.column_names() {
        if present.iter().any(|name| name == declared) {
            order.push(declared.to_string());
        }
    }
    for name in present {
        if !order.contains(&name) {
            order.push(name);
        }
    }
    df.select(order)
}

fn header_for(kind: SeriesKind, name: &str) -> String {
    match name {
        TIMESTAMP => TIMESTAMP_DISPLAY.to_string(),
        ORIGINAL_TIMESTAMP => format!("Uncorrected {TIMESTAMP_DISPLAY}"),
        other => display_name(kind, other),
    }
}

fn number_format(decimals: Option<usize>) -> Format {
    match decimals {
        Some(0) => Format::new().set_num_format("0"),
        Some(places) => Format::new().set_num_format(format!("0.{}", "0".repeat(places))),
        None => Format::new(),
    }
}

/// Single `Sheet1` workbook: bold header, date-formatted timestamp columns, fixed decimals
/// per measurement column, nulls left empty, columns auto-fitted.
pub fn build_workbook(df: &DataFrame, kind: SeriesKind) -> Result<Workbook> {
    build_workbook_with_preamble(df, kind, &[])
}

/// Like [`build_workbook`], with `preamble` rows written as text above the header.
pub fn build_workbook_with_preamble(
    df: &DataFrame,
    kind: SeriesKind,
    preamble: &[Vec<String>],
) -> Result<Workbook> {
    let df = order_columns(df, kind)?;

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    let header_format = Format::new().set_bold();
    let date_format = Format::new().set_num_format(DATETIME_FORMAT);

    for (row, cells) in preamble.iter().enumerate() {
        for (col, text) in cells.iter().enumerate() {
            if !text.is_empty() {
                worksheet.write_string(row as u32, col as u16, text)?;
            }
        }
    }
    let header_row = preamble.len() as u32;

    for (col_idx, column) in df.get_columns().iter().enumerate() {
        let col = col_idx as u16;
        let name = column.name().as_str();
        worksheet.write_string_with_format(header_row, col, header_for(kind, name), &header_format)?;

        if matches!(column.dtype(), DataType::Datetime(_, _)) {
            let values = column.datetime()?;
            for row in 0..df.height() {
                let Some(dt) = values.get(row).and_then(frame::naive_from_micros) else {
                    continue;
                };
                worksheet.write_datetime_with_format(header_row + row as u32 + 1, col, &dt, &date_format)?;
            }
        } else {
            let cast = column.cast(&DataType::Float64)?;
            let values = cast.f64()?;
            let format = number_format(column_decimals(name));
            for row in 0..df.height() {
                let Some(value) = values.get(row).filter(|v| v.is_finite()) else {
                    continue;
                };
                worksheet.write_number_with_format(header_row + row as u32 + 1, col, value, &format)?;
            }
        }
    }

    worksheet.autofit();
    Ok(workbook)
}

/// Writes `df` as a formatted workbook. The file is written next to `path` and renamed
/// over it, so a failed run leaves the previous file intact.
pub fn write_series(df: &DataFrame, path: &Path, kind: SeriesKind) -> Result<()> {
    write_series_with_preamble(df, path, kind, &[])
}

pub fn write_series_with_preamble(
    df: &DataFrame,
    path: &Path,
    kind: SeriesKind,
    preamble: &[Vec<String>],
) -> Result<()> {
    let mut workbook = build_workbook_with_preamble(df, kind, preamble)?;
    save_workbook(&mut workbook, path)?;
    debug!(path = %path.display(), rows = df.height(), "Wrote workbook");
    Ok(())
}

pub(crate) fn save_workbook(workbook: &mut Workbook, path: &Path) -> Result<()> {
    let bytes = workbook.save_to_buffer()?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| PipelineError::io(parent, source))?;
    }

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output.xlsx".to_string());
    let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));

    fs::write(&tmp_path, bytes).map_err(|source| PipelineError::io(&tmp_path, source))?;
    if let Err(source) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(PipelineError::io(path, source));
    }
    Ok(())
}

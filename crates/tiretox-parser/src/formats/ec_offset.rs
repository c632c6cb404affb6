use crate::errors::ParserError;
use crate::frame::{sanitize_column_name, EcColumn, FrameColumns};
use crate::model::{FileMetadata, Layout, ParseOptions, ParsedFile};
use crate::registry::SensorParser;
use crate::sheet::Sheet;

use super::{
    build_frame, collect_rows, find_column, header_names, is_aggregate_header, locate_ec_columns,
};

/// EC logger export with instrument metadata above the header: the sensor name sits in
/// A2 and the column header on row 4. Salt-wave files saved with their preamble carry
/// display headers (`EC.T`) on row 4 and read back through this parser too.
pub struct EcOffsetHeaderParser;

impl EcOffsetHeaderParser {
    const NAME: &'static str = "EC_OFFSET_HEADER";
    const MARKERS: [&'static str; 2] = ["EC.T(uS/cm)", "EC.T"];
    const HEADER_ROW: usize = 3;
}

impl SensorParser for EcOffsetHeaderParser {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn sniff(&self, sheet: &Sheet) -> Result<(), String> {
        match find_column(sheet.row(Self::HEADER_ROW), &Self::MARKERS) {
            Some(_) => Ok(()),
            None => Err("row 4 has no EC.T column".to_string()),
        }
    }

    fn parse(&self, sheet: &Sheet, options: &ParseOptions) -> Result<ParsedFile, ParserError> {
        let header = sheet.row(Self::HEADER_ROW);
        let (timestamp_col, mut sources) =
            locate_ec_columns(Self::NAME, header, Self::HEADER_ROW + 1)?;

        let mut names: Vec<String> = EcColumn::ALL
            .iter()
            .map(|c| c.canonical_name().to_string())
            .collect();

        if options.include_aggregates {
            for (col, cell) in header.iter().enumerate() {
                if col == timestamp_col || sources.contains(&Some(col)) {
                    continue;
                }
                let Some(text) = cell.as_text() else {
                    continue;
                };
                if is_aggregate_header(text) {
                    names.push(sanitize_column_name(text));
                    sources.push(Some(col));
                }
            }
        }

        let columns = collect_rows(
            Self::NAME,
            sheet,
            Self::HEADER_ROW + 1,
            timestamp_col,
            FrameColumns::new(&names),
            &sources,
        )?;

        let sensor_name = sheet
            .cell(1, 0)
            .as_text()
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        let preamble = (0..Self::HEADER_ROW)
            .map(|row| header_names(sheet, row))
            .collect();
        let metadata = FileMetadata::new(
            Layout::EcOffsetHeader,
            sensor_name,
            Self::HEADER_ROW + 1,
            header_names(sheet, Self::HEADER_ROW),
        )
        .with_preamble(preamble);

        Ok(ParsedFile {
            metadata,
            df: build_frame(Self::NAME, columns)?,
        })
    }
}

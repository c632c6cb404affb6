use crate::errors::ParserError;
use crate::frame::{EcColumn, FrameColumns};
use crate::model::{FileMetadata, Layout, ParseOptions, ParsedFile};
use crate::registry::SensorParser;
use crate::sheet::Sheet;

use super::{build_frame, collect_rows, find_column, header_names, locate_ec_columns};

/// EC logger export whose first row is the column header (`DT`, `EC`, `RTCTmp`, `EC.T`,
/// or the unit-suffixed names of a trimmed offset export).
pub struct EcInlineHeaderParser;

impl EcInlineHeaderParser {
    const NAME: &'static str = "EC_INLINE_HEADER";
    const MARKERS: [&'static str; 2] = ["EC.T", "EC.T(uS/cm)"];
    const HEADER_ROW: usize = 0;
}

impl SensorParser for EcInlineHeaderParser {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn sniff(&self, sheet: &Sheet) -> Result<(), String> {
        match find_column(sheet.row(Self::HEADER_ROW), &Self::MARKERS) {
            Some(_) => Ok(()),
            None => Err("row 1 has no EC.T column".to_string()),
        }
    }

    fn parse(&self, sheet: &Sheet, _options: &ParseOptions) -> Result<ParsedFile, ParserError> {
        let header = sheet.row(Self::HEADER_ROW);
        let (timestamp_col, sources) = locate_ec_columns(Self::NAME, header, Self::HEADER_ROW + 1)?;

        let names: Vec<&str> = EcColumn::ALL.iter().map(|c| c.canonical_name()).collect();
        let columns = collect_rows(
            Self::NAME,
            sheet,
            Self::HEADER_ROW + 1,
            timestamp_col,
            FrameColumns::new(&names),
            &sources,
        )?;

        let metadata = FileMetadata::new(
            Layout::EcInlineHeader,
            None,
            Self::HEADER_ROW + 1,
            header_names(sheet, Self::HEADER_ROW),
        );

        Ok(ParsedFile {
            metadata,
            df: build_frame(Self::NAME, columns)?,
        })
    }
}

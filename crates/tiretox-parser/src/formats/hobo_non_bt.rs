use crate::errors::ParserError;
use crate::frame::{FrameColumns, StageColumn};
use crate::model::{FileMetadata, Layout, ParseOptions, ParsedFile};
use crate::registry::SensorParser;
use crate::sheet::Sheet;

use super::{build_frame, collect_rows, header_names, serial_from_header};

/// HOBO pressure logger without a barometric channel. Row 1 carries the plot title, the
/// header sits on row 2, and columns B:D hold timestamp, absolute pressure and temperature.
pub struct HoboNonBtParser;

impl HoboNonBtParser {
    const NAME: &'static str = "HOBO_NON_BT";
    const MARKER: &'static str = "Plot Title";
    const HEADER_ROW: usize = 1;
    const TIMESTAMP_COL: usize = 1;
    const ABSOLUTE_PRESSURE_COL: usize = 2;
    const TEMPERATURE_COL: usize = 3;

    fn sensor_name(sheet: &Sheet) -> Option<String> {
        let title = sheet.cell(0, 0).as_text()?;
        title
            .split_once(':')
            .map(|(_, rest)| rest.trim().to_string())
            .filter(|name| !name.is_empty())
            .or_else(|| {
                sheet
                    .cell(Self::HEADER_ROW, Self::ABSOLUTE_PRESSURE_COL)
                    .as_text()
                    .and_then(serial_from_header)
            })
    }
}

impl SensorParser for HoboNonBtParser {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn sniff(&self, sheet: &Sheet) -> Result<(), String> {
        if sheet.cell(0, 0).contains(Self::MARKER) {
            Ok(())
        } else {
            Err(format!("cell A1 does not contain '{}'", Self::MARKER))
        }
    }

    fn parse(&self, sheet: &Sheet, _options: &ParseOptions) -> Result<ParsedFile, ParserError> {
        if sheet
            .cell(Self::HEADER_ROW, Self::TIMESTAMP_COL)
            .is_empty()
        {
            return Err(ParserError::InvalidHeader {
                parser: Self::NAME,
                row_index: Self::HEADER_ROW + 1,
                message: "timestamp header in column B is empty".to_string(),
            });
        }

        let names: Vec<&str> = StageColumn::ALL.iter().map(|c| c.canonical_name()).collect();
        let sources: Vec<Option<usize>> = StageColumn::ALL
            .iter()
            .map(|column| match column {
                StageColumn::AbsolutePressure => Some(Self::ABSOLUTE_PRESSURE_COL),
                StageColumn::Temperature => Some(Self::TEMPERATURE_COL),
                _ => None,
            })
            .collect();

        let columns = collect_rows(
            Self::NAME,
            sheet,
            Self::HEADER_ROW + 1,
            Self::TIMESTAMP_COL,
            FrameColumns::new(&names),
            &sources,
        )?;

        let metadata = FileMetadata::new(
            Layout::HoboNonBt,
            Self::sensor_name(sheet),
            Self::HEADER_ROW + 1,
            header_names(sheet, Self::HEADER_ROW),
        );

        Ok(ParsedFile {
            metadata,
            df: build_frame(Self::NAME, columns)?,
        })
    }
}

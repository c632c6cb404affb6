use crate::errors::ParserError;
use crate::frame::{FrameColumns, StageColumn};
use crate::model::{FileMetadata, Layout, ParseOptions, ParsedFile};
use crate::registry::SensorParser;
use crate::sheet::Sheet;

use super::{build_frame, collect_rows, header_names, serial_from_header};

/// HOBO Bluetooth logger export. Header on row 1 with `Date-Time` in B1; columns B:G
/// carry every stage measurement, including the on-board barometric correction.
pub struct HoboBtParser;

impl HoboBtParser {
    const NAME: &'static str = "HOBO_BT";
    const MARKER: &'static str = "Date-Time";
    const HEADER_ROW: usize = 0;
    const TIMESTAMP_COL: usize = 1;

    fn source_column(column: StageColumn) -> usize {
        match column {
            StageColumn::DifferentialPressure => 2,
            StageColumn::AbsolutePressure => 3,
            StageColumn::Temperature => 4,
            StageColumn::WaterLevel => 5,
            StageColumn::BarometricPressure => 6,
        }
    }
}

impl SensorParser for HoboBtParser {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn sniff(&self, sheet: &Sheet) -> Result<(), String> {
        if sheet
            .cell(Self::HEADER_ROW, Self::TIMESTAMP_COL)
            .contains(Self::MARKER)
        {
            Ok(())
        } else {
            Err(format!("cell B1 does not contain '{}'", Self::MARKER))
        }
    }

    fn parse(&self, sheet: &Sheet, _options: &ParseOptions) -> Result<ParsedFile, ParserError> {
        let header = sheet.row(Self::HEADER_ROW);
        let last_col = Self::source_column(StageColumn::BarometricPressure);
        if header.len() <= last_col {
            return Err(ParserError::InvalidHeader {
                parser: Self::NAME,
                row_index: Self::HEADER_ROW + 1,
                message: format!(
                    "expected at least {} header columns, found {}",
                    last_col + 1,
                    header.len()
                ),
            });
        }

        let names: Vec<&str> = StageColumn::ALL.iter().map(|c| c.canonical_name()).collect();
        let sources: Vec<Option<usize>> = StageColumn::ALL
            .iter()
            .map(|column| Some(Self::source_column(*column)))
            .collect();

        let columns = collect_rows(
            Self::NAME,
            sheet,
            Self::HEADER_ROW + 1,
            Self::TIMESTAMP_COL,
            FrameColumns::new(&names),
            &sources,
        )?;

        let sensor_name = header[Self::TIMESTAMP_COL + 1..]
            .iter()
            .filter_map(|cell| cell.as_text())
            .find_map(serial_from_header);

        let metadata = FileMetadata::new(
            Layout::HoboBt,
            sensor_name,
            Self::HEADER_ROW + 1,
            header_names(sheet, Self::HEADER_ROW),
        );

        Ok(ParsedFile {
            metadata,
            df: build_frame(Self::NAME, columns)?,
        })
    }
}

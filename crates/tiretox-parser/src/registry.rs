use std::path::Path;

use crate::errors::{ParserAttempt, ParserError};
use crate::formats::{EcInlineHeaderParser, EcOffsetHeaderParser, HoboBtParser, HoboNonBtParser};
use crate::frame::SeriesKind;
use crate::model::{ParseOptions, ParsedFile};
use crate::sheet::Sheet;

pub trait SensorParser {
    fn name(&self) -> &'static str;

    /// Cheap check on marker cells. `Err` carries the reason the layout was rejected.
    fn sniff(&self, sheet: &Sheet) -> Result<(), String>;

    fn parse(&self, sheet: &Sheet, options: &ParseOptions) -> Result<ParsedFile, ParserError>;
}

pub fn parse_stage_sheet(sheet: &Sheet, options: &ParseOptions) -> Result<ParsedFile, ParserError> {
    let non_bt = HoboNonBtParser;
    let bt = HoboBtParser;
    let parsers: [&dyn SensorParser; 2] = [&non_bt, &bt];
    parse_with_parsers(sheet, &parsers, options)
}

pub fn parse_ec_sheet(sheet: &Sheet, options: &ParseOptions) -> Result<ParsedFile, ParserError> {
    let inline = EcInlineHeaderParser;
    let offset = EcOffsetHeaderParser;
    let parsers: [&dyn SensorParser; 2] = [&inline, &offset];
    parse_with_parsers(sheet, &parsers, options)
}

pub fn parse_sheet(
    sheet: &Sheet,
    kind: SeriesKind,
    options: &ParseOptions,
) -> Result<ParsedFile, ParserError> {
    match kind {
        SeriesKind::Stage => parse_stage_sheet(sheet, options),
        SeriesKind::SaltTracer => parse_ec_sheet(sheet, options),
    }
}

pub fn read_sensor_file(
    path: &Path,
    kind: SeriesKind,
    options: &ParseOptions,
) -> Result<ParsedFile, ParserError> {
    let sheet = Sheet::from_path(path)?;
    parse_sheet(&sheet, kind, options)
}

/// Runs `parsers` in priority order; the first one whose sniff accepts the sheet parses
/// it. Parse errors after a successful sniff are returned as-is.
pub fn parse_with_parsers(
    sheet: &Sheet,
    parsers: &[&dyn SensorParser],
    options: &ParseOptions,
) -> Result<ParsedFile, ParserError> {
    let mut attempts = Vec::new();

    for parser in parsers {
        match parser.sniff(sheet) {
            Ok(()) => return parser.parse(sheet, options),
            Err(reason) => attempts.push(ParserAttempt::new(parser.name(), reason)),
        }
    }

    Err(ParserError::UnrecognizedFormat { attempts })
}

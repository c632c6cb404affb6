use std::fmt;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::frame::SeriesKind;

/// Vendor export layouts recognised by the sniffing registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// HOBO logger without barometric channel: `Plot Title` in A1, columns B:D.
    HoboNonBt,
    /// HOBO Bluetooth logger: `Date-Time` in B1, columns B:G.
    HoboBt,
    /// EC logger export with the header on the first row.
    EcInlineHeader,
    /// EC logger export with three metadata rows above the header.
    EcOffsetHeader,
}

impl Layout {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layout::HoboNonBt => "hobo_non_bt",
            Layout::HoboBt => "hobo_bt",
            Layout::EcInlineHeader => "ec_inline_header",
            Layout::EcOffsetHeader => "ec_offset_header",
        }
    }

    pub fn kind(&self) -> SeriesKind {
        match self {
            Layout::HoboNonBt | Layout::HoboBt => SeriesKind::Stage,
            Layout::EcInlineHeader | Layout::EcOffsetHeader => SeriesKind::SaltTracer,
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseOptions {
    /// Keep statistical aggregate columns (`Min`, `Max`, `Avg`, ...) when a layout has them.
    pub include_aggregates: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMetadata {
    pub layout: Layout,
    pub sensor_name: Option<String>,
    /// 1-based sheet row of the column header.
    pub header_row: usize,
    pub source_columns: Vec<String>,
    /// Instrument rows above the header, cell text as displayed. Empty for layouts whose
    /// header is on the first row.
    #[serde(default)]
    pub preamble: Vec<Vec<String>>,
}

impl FileMetadata {
    pub fn new(
        layout: Layout,
        sensor_name: Option<String>,
        header_row: usize,
        source_columns: Vec<String>,
    ) -> Self {
        Self {
            layout,
            sensor_name,
            header_row,
            source_columns,
            preamble: Vec::new(),
        }
    }

    pub fn with_preamble(mut self, preamble: Vec<Vec<String>>) -> Self {
        self.preamble = preamble;
        self
    }

    pub fn kind(&self) -> SeriesKind {
        self.layout.kind()
    }
}

#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub metadata: FileMetadata,
    pub df: DataFrame,
}

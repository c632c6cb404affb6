pub mod errors;
pub mod formats;
pub mod frame;
pub mod model;
mod registry;
pub mod sheet;

pub use errors::{ParserAttempt, ParserError};
pub use formats::{parse_table_sheet, parse_timestamp_text};
pub use frame::{EcColumn, FrameColumns, SeriesKind, StageColumn};
pub use model::{FileMetadata, Layout, ParseOptions, ParsedFile};
pub use registry::{
    parse_ec_sheet, parse_sheet, parse_stage_sheet, parse_with_parsers, read_sensor_file,
    SensorParser,
};
pub use sheet::{Cell, Sheet};

mod common;
mod ec_inline;
mod ec_offset;
mod hobo_bt;
mod hobo_non_bt;
mod table;

pub use ec_inline::EcInlineHeaderParser;
pub use ec_offset::EcOffsetHeaderParser;
pub use hobo_bt::HoboBtParser;
pub use hobo_non_bt::HoboNonBtParser;
pub use common::parse_timestamp_text;
pub use table::parse_table_sheet;

pub(crate) use common::{
    build_frame, collect_rows, find_column, header_names, is_aggregate_header,
    locate_ec_columns, serial_from_header,
};

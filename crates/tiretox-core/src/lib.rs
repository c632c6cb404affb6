pub mod barometric;
pub mod cf;
pub mod config;
pub mod destack;
pub mod dump_events;
pub mod ec_append;
pub mod error;
pub mod master;
pub mod merge;
pub mod pipeline;
pub mod saltwave;
pub mod site;
pub mod water_level;

pub use config::{FenceConfig, PipelineConfig, SiteConfig};
pub use error::{PipelineError, Result};
pub use pipeline::{process_stage_file, RunOptions, RunReport, RunStage, Warning};

use std::path::PathBuf;

use thiserror::Error;
use tiretox_parser::ParserError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Input parsing failed: {0}")]
    Parser(#[from] ParserError),

    #[error("No configured site matches file name '{file_name}'")]
    UnknownSite { file_name: String },

    #[error("File name '{file_name}' matches more than one site: {candidates:?}")]
    AmbiguousSite {
        file_name: String,
        candidates: Vec<String>,
    },

    #[error("Site '{0}' is not barometric and has no companion site configured")]
    UnknownCompanion(String),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("File I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Workbook write failed: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Master file {path}: {message}")]
    Master { path: PathBuf, message: String },

    #[error("Selection error: {0}")]
    Selection(String),
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

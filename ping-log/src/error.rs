//! Error types for ping log analysis.

use common::PlotError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PingLogError {
    /// The file exists but holds nothing (or only whitespace)
    #[error("ping log {} is empty", path.display())]
    EmptyInput { path: PathBuf },

    /// Neither reply lines nor a transmitted/received summary
    #[error("no ping replies or summary found in {}", path.display())]
    NoData { path: PathBuf },

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid line pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("chart layout failed: {0}")]
    Plot(#[from] PlotError),
}

pub type Result<T> = std::result::Result<T, PingLogError>;

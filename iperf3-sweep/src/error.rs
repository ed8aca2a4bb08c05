//! Error types for the bandwidth sweep.
//!
//! Attempt-scoped errors ([`MeasurementError`], [`ParseError`]) never abort a
//! sweep: the controller turns them into failed records. [`SweepError`] covers
//! what is fatal to a whole run.

use crate::model::BandwidthTarget;
use common::PlotError;
use std::path::PathBuf;
use thiserror::Error;

/// Invalid inputs, detected before any measurement begins
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("server address must not be empty")]
    EmptyServer,

    #[error("invalid port: {0}")]
    InvalidPort(u16),

    #[error("test duration must be at least 1 second, got {0}")]
    InvalidDuration(u64),

    #[error("parallel stream count must be between 1 and 128, got {0}")]
    InvalidParallel(u32),

    #[error("loss threshold must be within (0, 100], got {0}")]
    InvalidThreshold(f64),

    #[error("invalid bandwidth '{0}': expected a positive number of Mbps or 'max'")]
    InvalidBandwidth(String),

    #[error("measurement tool command is empty")]
    EmptyToolCommand,

    #[error("measurement tool '{program}' is not usable: {reason}")]
    ToolUnavailable { program: String, reason: String },

    #[error("settings error: {0}")]
    Settings(String),
}

/// Subprocess failure or timeout for one attempt
#[derive(Error, Debug)]
pub enum MeasurementError {
    #[error("failed to launch measurement tool for {target}: {source}")]
    Spawn {
        target: BandwidthTarget,
        #[source]
        source: std::io::Error,
    },

    #[error("measurement at {target} exited with {status}: {diagnostic}")]
    Exit {
        target: BandwidthTarget,
        status: String,
        diagnostic: String,
    },

    #[error("measurement at {target} timed out after {elapsed_secs:.1}s: {diagnostic}")]
    Timeout {
        target: BandwidthTarget,
        elapsed_secs: f64,
        diagnostic: String,
    },

    #[error("I/O error while measuring {target}: {source}")]
    Io {
        target: BandwidthTarget,
        #[source]
        source: std::io::Error,
    },
}

impl MeasurementError {
    /// Bandwidth the failed attempt was targeting
    pub fn target(&self) -> BandwidthTarget {
        match self {
            MeasurementError::Spawn { target, .. }
            | MeasurementError::Exit { target, .. }
            | MeasurementError::Timeout { target, .. }
            | MeasurementError::Io { target, .. } => *target,
        }
    }
}

/// Malformed measurement payload
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("measurement output is empty")]
    Empty,

    #[error("measurement output is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("measurement tool reported an error: {0}")]
    ToolReported(String),

    #[error("measurement output has no '{0}' section")]
    MissingSection(&'static str),

    #[error("measurement output has no '{0}' value")]
    MissingField(&'static str),

    #[error("invalid value for '{field}': {value}")]
    InvalidValue { field: &'static str, value: f64 },
}

/// Chart rendering failure; callers downgrade it to a warning
#[derive(Error, Debug)]
pub enum ChartRenderError {
    #[error("no data points for the {0} chart")]
    NoData(&'static str),

    #[error("chart layout failed: {0}")]
    Plot(#[from] PlotError),

    #[error("failed to write chart {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Persisting or loading the run artifact
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("artifact I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact JSON error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no free run directory name for {0}")]
    NoFreeName(String),
}

/// Errors that end a whole run
#[derive(Error, Debug)]
pub enum SweepError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),
}

/// Result type for sweep operations
pub type Result<T> = std::result::Result<T, SweepError>;

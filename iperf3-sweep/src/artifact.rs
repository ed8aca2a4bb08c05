//! Persisted run artifacts.
//!
//! Each run gets its own directory under the output directory, named after
//! the run timestamp. A second run within the same second gets a numeric
//! suffix; existing directories and files are never overwritten.

use crate::error::ArtifactError;
use crate::model::SweepResult;
use crate::stability::StabilityVerdict;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

/// File name of the structured artifact inside a run directory
pub const ARTIFACT_FILE_NAME: &str = "sweep.json";

/// File name of the plain-text report inside a run directory
pub const REPORT_FILE_NAME: &str = "report.txt";

/// Upper bound on collision suffixes tried for one timestamp
const MAX_DIR_SUFFIX: u32 = 1000;

/// Everything persisted about one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepArtifact {
    #[serde(flatten)]
    pub result: SweepResult,
    pub stability_verdict: StabilityVerdict,
}

impl SweepArtifact {
    pub fn new(result: SweepResult, stability_verdict: StabilityVerdict) -> Self {
        Self {
            result,
            stability_verdict,
        }
    }

    /// Read an artifact written by [`ArtifactStore::persist`]
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let text = fs::read_to_string(path).map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ArtifactError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Writes run directories under a configured output directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    output_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Create a fresh directory for a run started at `timestamp`
    pub fn create_run_dir(&self, timestamp: DateTime<Utc>) -> Result<PathBuf, ArtifactError> {
        fs::create_dir_all(&self.output_dir).map_err(|source| ArtifactError::Io {
            path: self.output_dir.clone(),
            source,
        })?;

        let base = timestamp.format("%Y%m%d_%H%M%S").to_string();
        for suffix in 0..MAX_DIR_SUFFIX {
            let name = if suffix == 0 {
                base.clone()
            } else {
                format!("{}_{}", base, suffix)
            };
            let path = self.output_dir.join(&name);
            match fs::create_dir(&path) {
                Ok(()) => {
                    tracing::debug!("Created run directory {}", path.display());
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(source) => return Err(ArtifactError::Io { path, source }),
            }
        }
        Err(ArtifactError::NoFreeName(base))
    }

    /// Write the artifact as pretty JSON. Fails if the file already exists.
    pub fn persist(&self, run_dir: &Path, artifact: &SweepArtifact) -> Result<PathBuf, ArtifactError> {
        let path = run_dir.join(ARTIFACT_FILE_NAME);
        let io_err = |source| ArtifactError::Io {
            path: path.clone(),
            source,
        };

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, artifact).map_err(|source| ArtifactError::Json {
            path: path.clone(),
            source,
        })?;
        writer.write_all(b"\n").map_err(io_err)?;
        writer.flush().map_err(io_err)?;

        tracing::info!("Results saved to {}", path.display());
        Ok(path)
    }

    /// Write the plain-text report next to the artifact
    pub fn write_report(&self, run_dir: &Path, text: &str) -> Result<PathBuf, ArtifactError> {
        let path = run_dir.join(REPORT_FILE_NAME);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| ArtifactError::Io {
                path: path.clone(),
                source,
            })?;
        file.write_all(text.as_bytes())
            .map_err(|source| ArtifactError::Io {
                path: path.clone(),
                source,
            })?;
        tracing::info!("Report saved to {}", path.display());
        Ok(path)
    }
}

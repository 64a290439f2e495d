//! Error types shared across the capture core.
//!
//! Backends and workers use `anyhow` internally; anything that crosses the
//! session/store surface is mapped onto [`CaptureError`] so callers can match
//! on the failure instead of parsing strings.

use std::path::PathBuf;

use thiserror::Error;

use crate::session::SessionState;

/// Errors surfaced by the control and hand-off surfaces.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("operation not allowed while session is {0:?}")]
    InvalidState(SessionState),

    #[error("no window selected")]
    NoWindowSelected,

    #[error("no capture region set")]
    NoRegionSet,

    #[error("invalid capture region: {0}")]
    InvalidRegion(String),

    #[error("frame rate {0} is outside 1..=60")]
    InvalidFrameRate(u32),

    #[error("output directory already has an active capture session ({0})")]
    OutputBusy(String),

    #[error("native capture source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("invalid file name: {0}")]
    InvalidFileName(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CaptureError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type CaptureResult<T> = std::result::Result<T, CaptureError>;

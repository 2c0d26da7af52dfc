//! Error types for detdecode.

use std::fmt;
use thiserror::Error;

/// Result alias for detdecode operations.
pub type Result<T> = std::result::Result<T, DetDecodeError>;

/// Pipeline stage that produced a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Tensor reinterpretation and shape checks.
    Decode,
    /// Objectness gate, class selection and confidence threshold.
    Filter,
    /// Non-maximum suppression and top-k selection.
    Suppress,
    /// Box representation and adjustments.
    Transform,
    /// Label merge and record assembly.
    Assemble,
}

impl Stage {
    /// Returns the stage name used in failure records and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Decode => "decode",
            Stage::Filter => "filter",
            Stage::Suppress => "suppress",
            Stage::Transform => "transform",
            Stage::Assemble => "assemble",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse error category, stable across variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The buffer does not match the declared tensor shape.
    Shape,
    /// The input tensor format is unknown or cannot be decoded.
    Format,
    /// The label source could not be read or parsed.
    LabelLoad,
    /// A configuration value is out of range.
    Config,
    /// A stage failed for any other reason.
    Stage,
}

/// Errors that can occur while decoding detector output.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum DetDecodeError {
    /// The buffer holds fewer values than the declared shape needs.
    #[error("buffer too small: needed {needed} values, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// The declared shape cannot describe a detection tensor.
    #[error("invalid tensor shape ({batches}, {anchors}, {values}): {reason}")]
    InvalidShape {
        batches: usize,
        anchors: usize,
        values: usize,
        reason: &'static str,
    },
    /// The input format name is not a known tensor type.
    #[error("unknown tensor format {0:?}")]
    UnknownFormat(String),
    /// The tensor type is known but cannot be decoded into boxes.
    #[error("unsupported tensor format {0}")]
    UnsupportedFormat(&'static str),
    /// The buffer kind contradicts the declared format.
    #[error("format mismatch: {0}")]
    FormatMismatch(&'static str),
    /// The label source could not be read or parsed.
    #[error("failed to load labels from {path}: {reason}")]
    LabelLoad { path: String, reason: String },
    /// A configuration value is invalid.
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
    /// A stage failed or panicked.
    #[error("stage {stage} failed: {message}")]
    StageFailed { stage: Stage, message: String },
}

impl DetDecodeError {
    /// Returns the coarse category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DetDecodeError::BufferTooSmall { .. } | DetDecodeError::InvalidShape { .. } => {
                ErrorKind::Shape
            }
            DetDecodeError::UnknownFormat(_)
            | DetDecodeError::UnsupportedFormat(_)
            | DetDecodeError::FormatMismatch(_) => ErrorKind::Format,
            DetDecodeError::LabelLoad { .. } => ErrorKind::LabelLoad,
            DetDecodeError::InvalidConfig(_) => ErrorKind::Config,
            DetDecodeError::StageFailed { .. } => ErrorKind::Stage,
        }
    }
}

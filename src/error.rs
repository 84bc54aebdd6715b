use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Fatal failures. Any of these stops the run.
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("configuration: {0}")]
    InvalidConfig(String),

    #[error("scan: no images with usable capture metadata were found")]
    EmptySourceSet,

    #[error("{stage}: i/o error on {path}: {source}")]
    Io {
        stage: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("compose: failed to process image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("compose: failed to load font {path}: {reason}")]
    Font { path: PathBuf, reason: String },

    #[error("compose: no frames were written to {0}")]
    NoFrames(PathBuf),

    #[error("audio: failed to probe duration of {path}: {reason}")]
    AudioProbe { path: PathBuf, reason: String },

    #[error("audio: track {path} reports a duration of {duration}s, cannot derive a frame rate")]
    ZeroDurationAudio { path: PathBuf, duration: f64 },

    #[error("{stage}: failed to start `{command}`: {source}")]
    Spawn {
        stage: &'static str,
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage}: `{command}` exited with {status}: {stderr}")]
    ExternalTool {
        stage: &'static str,
        command: String,
        status: ExitStatus,
        stderr: String,
    },
}

impl ProcessingError {
    pub(crate) fn io(stage: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ProcessingError::Io {
            stage,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn image(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        ProcessingError::Image {
            path: path.into(),
            source,
        }
    }
}

/// Why a single source image was left out of the sequence.
///
/// These never abort a run; the image is logged and excluded.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SkipReason {
    #[error("no readable metadata container ({0})")]
    NoMetadata(String),

    #[error("none of the capture, digitized or modified time tags is present")]
    NoTimestampTag,

    #[error("timestamp `{0}` is not a valid date")]
    UnparseableTimestamp(String),

    #[error("unreadable image: {0}")]
    Unreadable(String),
}

pub type Result<T> = std::result::Result<T, ProcessingError>;

//! Builds a time-lapse movie from a folder of dated photos: frames are
//! ordered by their EXIF capture time, letterboxed onto one shared canvas,
//! captioned with the capture date and handed to ffmpeg.

pub mod canvas;
pub mod caption;
pub mod compositor;
pub mod config;
pub mod encoder;
pub mod error;
pub mod metadata;
pub mod orientation;
pub mod sequence;
pub mod source;

pub use canvas::CanvasSpec;
pub use compositor::Compositor;
pub use config::MovieConfig;
pub use encoder::{AudioProbe, Encoder, EncodingJob, FfmpegEncoder, FfmpegMuxer, FfprobeAudio, Muxer};
pub use error::{ProcessingError, SkipReason};
pub use metadata::{CaptureMetadata, TimestampKey};
pub use orientation::Orientation;
pub use sequence::{OrderedFrameSet, RunReport, SequenceDriver};
pub use source::{is_image_file, list_images, SourceImage};

use std::path::PathBuf;

use image::Rgb;

use crate::error::{ProcessingError, Result};

pub const DEFAULT_FPS: f64 = 2.0;
pub const DEFAULT_MAX_WIDTH: u32 = 1920;
pub const DEFAULT_MAX_HEIGHT: u32 = 1080;
pub const DEFAULT_QUALITY: u32 = 20;

/// Camera models whose time tag is trusted down to the second.
pub const DEFAULT_FULL_TIME_MODELS: &[&str] = &["HTC6525LVW"];

/// Everything one run needs, built once and passed by reference.
#[derive(Debug, Clone)]
pub struct MovieConfig {
    /// Directory holding the source photos.
    pub source_dir: PathBuf,
    /// Directory the numbered frames are written to.
    pub frame_dir: PathBuf,
    /// Frame rate used when no audio track is given.
    pub fps: f64,
    /// Encoded movie path.
    pub output: PathBuf,
    pub max_width: u32,
    pub max_height: u32,
    /// Optional soundtrack; when set the frame rate is derived from its length.
    pub audio: Option<PathBuf>,
    /// Reuse frames already present in `frame_dir`.
    pub skip_composition: bool,
    /// x264 CRF handed to the encoder (0-51, lower = better).
    pub quality: u32,
    /// Worker threads for composition, 0 = rayon default.
    pub threads: usize,
    /// TrueType font for the date caption. `None` disables captions.
    pub font: Option<PathBuf>,
    pub background: Rgb<u8>,
    pub full_time_models: Vec<String>,
}

impl Default for MovieConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("."),
            frame_dir: PathBuf::from("tmp"),
            fps: DEFAULT_FPS,
            output: PathBuf::from("movie.mkv"),
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
            audio: None,
            skip_composition: false,
            quality: DEFAULT_QUALITY,
            threads: 0,
            font: None,
            background: Rgb([0, 0, 0]),
            full_time_models: DEFAULT_FULL_TIME_MODELS
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }
}

impl MovieConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_width == 0 || self.max_height == 0 {
            return Err(ProcessingError::InvalidConfig(format!(
                "max size must be positive, got {}x{}",
                self.max_width, self.max_height
            )));
        }
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(ProcessingError::InvalidConfig(format!(
                "frame rate must be a positive number, got {}",
                self.fps
            )));
        }
        if self.quality > 51 {
            return Err(ProcessingError::InvalidConfig(format!(
                "quality (CRF) must be between 0 and 51, got {}",
                self.quality
            )));
        }
        if self.output.file_name().is_none() {
            return Err(ProcessingError::InvalidConfig(format!(
                "output path {} has no file name",
                self.output.display()
            )));
        }
        Ok(())
    }
}

/// Parses `RRGGBB` (optionally prefixed with `#`).
pub fn parse_background(input: &str) -> Result<Rgb<u8>> {
    let hex = input.trim().trim_start_matches('#');
    let invalid = || ProcessingError::InvalidConfig(format!("invalid background color: {input}"));
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
    Ok(Rgb([channel(0)?, channel(2)?, channel(4)?]))
}

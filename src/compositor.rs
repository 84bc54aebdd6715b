use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};

use crate::canvas::CanvasSpec;
use crate::caption::{date_label, CaptionPainter};
use crate::error::{ProcessingError, Result};
use crate::metadata::TimestampKey;
use crate::orientation::Orientation;
use crate::source::SourceImage;

/// High enough that the encoder does not pick up JPEG banding.
pub const FRAME_JPEG_QUALITY: u8 = 95;

/// Downscale factor that fits `width`x`height` inside the canvas.
/// Images already inside the canvas are never enlarged.
pub fn scale_ratio(width: u32, height: u32, canvas: CanvasSpec) -> f64 {
    if width > canvas.width || height > canvas.height {
        let width_ratio = canvas.width as f64 / width as f64;
        let height_ratio = canvas.height as f64 / height as f64;
        width_ratio.min(height_ratio)
    } else {
        1.0
    }
}

/// Dimensions after applying [`scale_ratio`]. Rounded, so the limiting axis
/// lands exactly on the canvas edge instead of one pixel short.
pub fn fit_within(width: u32, height: u32, canvas: CanvasSpec) -> (u32, u32) {
    let ratio = scale_ratio(width, height, canvas);
    if ratio >= 1.0 {
        return (width, height);
    }
    let scale = |side: u32, bound: u32| ((side as f64 * ratio).round() as u32).clamp(1, bound);
    (scale(width, canvas.width), scale(height, canvas.height))
}

/// Top-left corner that centers the scaled image; the odd pixel goes to the
/// right/bottom border.
pub fn center_offset(canvas: CanvasSpec, width: u32, height: u32) -> (u32, u32) {
    (
        canvas.width.saturating_sub(width) / 2,
        canvas.height.saturating_sub(height) / 2,
    )
}

/// Turns one photo into one letterboxed, captioned frame.
pub struct Compositor {
    canvas: CanvasSpec,
    background: Rgb<u8>,
    caption: Option<CaptionPainter>,
}

impl Compositor {
    pub fn new(canvas: CanvasSpec, background: Rgb<u8>) -> Self {
        Self {
            canvas,
            background,
            caption: None,
        }
    }

    pub fn with_caption(mut self, painter: CaptionPainter) -> Self {
        self.caption = Some(painter);
        self
    }

    pub fn has_caption(&self) -> bool {
        self.caption.is_some()
    }

    pub fn compose(&self, source: &SourceImage, key: &TimestampKey) -> Result<RgbImage> {
        let img = image::open(&source.path).map_err(|e| ProcessingError::image(&source.path, e))?;
        Ok(self.compose_image(img, source.orientation, key))
    }

    pub fn compose_image(
        &self,
        img: DynamicImage,
        orientation: Orientation,
        key: &TimestampKey,
    ) -> RgbImage {
        let img = orientation.apply(img);
        let (width, height) = img.dimensions();
        let (scaled_width, scaled_height) = fit_within(width, height, self.canvas);

        let scaled = if (scaled_width, scaled_height) != (width, height) {
            img.resize_exact(scaled_width, scaled_height, FilterType::Lanczos3)
        } else {
            img
        };

        let mut frame = RgbImage::from_pixel(self.canvas.width, self.canvas.height, self.background);
        let (x, y) = center_offset(self.canvas, scaled_width, scaled_height);
        imageops::replace(&mut frame, &scaled.to_rgb8(), x as i64, y as i64);

        if let Some(painter) = &self.caption {
            painter.draw(&mut frame, &date_label(key));
        }
        frame
    }

    pub fn write_frame(&self, source: &SourceImage, key: &TimestampKey, output: &Path) -> Result<()> {
        let frame = self.compose(source, key)?;
        save_jpeg(&frame, output)
    }
}

pub fn save_jpeg(frame: &RgbImage, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| ProcessingError::io("compose", path, e))?;
    let mut writer = BufWriter::new(file);
    let encoder = JpegEncoder::new_with_quality(&mut writer, FRAME_JPEG_QUALITY);
    frame
        .write_with_encoder(encoder)
        .map_err(|e| ProcessingError::image(path, e))?;
    writer.flush().map_err(|e| ProcessingError::io("compose", path, e))
}

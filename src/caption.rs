use std::fs;
use std::path::{Path, PathBuf};

use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle};
use fontdue::{Font, FontSettings};
use image::{Rgb, RgbImage};

use crate::canvas::CanvasSpec;
use crate::error::{ProcessingError, Result};
use crate::metadata::TimestampKey;

/// Looked up in order when no font is given explicitly.
pub const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/freefont/FreeSans.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

const MIN_FONT_PX: f32 = 12.0;

pub fn find_system_font() -> Option<PathBuf> {
    SYSTEM_FONT_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|path| path.is_file())
}

/// "March 07, 2021"
pub fn date_label(key: &TimestampKey) -> String {
    key.date().format("%B %d, %Y").to_string()
}

/// Caption placement as fractions of the canvas, so the label lands in the
/// same spot at any output size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptionStyle {
    pub left: f32,
    pub top: f32,
    /// Glyph size as a fraction of canvas height.
    pub size: f32,
    pub color: Rgb<u8>,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            left: 0.05,
            top: 0.88,
            size: 0.06,
            color: Rgb([255, 255, 255]),
        }
    }
}

impl CaptionStyle {
    pub fn origin(&self, canvas: CanvasSpec) -> (f32, f32) {
        (
            (canvas.width as f32 * self.left).floor(),
            (canvas.height as f32 * self.top).floor(),
        )
    }

    pub fn font_px(&self, canvas: CanvasSpec) -> f32 {
        (canvas.height as f32 * self.size).max(MIN_FONT_PX)
    }
}

pub struct CaptionPainter {
    font: Font,
    style: CaptionStyle,
}

impl CaptionPainter {
    pub fn load(path: &Path, style: CaptionStyle) -> Result<Self> {
        let font_err = |reason: String| ProcessingError::Font {
            path: path.to_path_buf(),
            reason,
        };
        let bytes = fs::read(path).map_err(|e| font_err(e.to_string()))?;
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|e| font_err(e.to_string()))?;
        Ok(Self { font, style })
    }

    pub fn draw(&self, canvas: &mut RgbImage, text: &str) {
        let spec = CanvasSpec {
            width: canvas.width(),
            height: canvas.height(),
        };
        let (x, y) = self.style.origin(spec);

        let mut layout = Layout::new(CoordinateSystem::PositiveYDown);
        layout.reset(&LayoutSettings {
            x,
            y,
            ..LayoutSettings::default()
        });
        layout.append(&[&self.font], &TextStyle::new(text, self.style.font_px(spec), 0));

        for glyph in layout.glyphs() {
            if glyph.width == 0 || glyph.height == 0 {
                continue;
            }
            let (_, coverage) = self.font.rasterize_config(glyph.key);
            blend_coverage(
                canvas,
                glyph.x.round() as i64,
                glyph.y.round() as i64,
                glyph.width,
                glyph.height,
                &coverage,
                self.style.color,
            );
        }
    }
}

/// Alpha-blends an 8-bit coverage mask onto `canvas`, clipping at the edges.
pub fn blend_coverage(
    canvas: &mut RgbImage,
    x: i64,
    y: i64,
    width: usize,
    height: usize,
    coverage: &[u8],
    color: Rgb<u8>,
) {
    let (canvas_w, canvas_h) = (canvas.width() as i64, canvas.height() as i64);
    for row in 0..height {
        let py = y + row as i64;
        if py < 0 || py >= canvas_h {
            continue;
        }
        for col in 0..width {
            let px = x + col as i64;
            if px < 0 || px >= canvas_w {
                continue;
            }
            let Some(&alpha) = coverage.get(row * width + col) else {
                continue;
            };
            if alpha == 0 {
                continue;
            }
            let a = alpha as f32 / 255.0;
            let pixel = canvas.get_pixel_mut(px as u32, py as u32);
            for c in 0..3 {
                let blended = pixel.0[c] as f32 * (1.0 - a) + color.0[c] as f32 * a;
                pixel.0[c] = blended.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[rstest]
    #[case("2021:03:07 10:00:00", "March 07, 2021")]
    #[case("1999:12:31 23:59:59", "December 31, 1999")]
    #[case("2024:02:29 00:00:00", "February 29, 2024")]
    fn test_date_label(#[case] raw: &str, #[case] expected: &str) {
        let key = TimestampKey::from_raw(raw, false).unwrap();
        assert_eq!(date_label(&key), expected);
    }

    #[test]
    fn test_date_label_ignores_time_of_day() {
        let key = TimestampKey::from_raw("2015:06:01 08:15:30", true).unwrap();
        assert_eq!(date_label(&key), "June 01, 2015");
    }

    #[test]
    fn test_position_scales_with_canvas() {
        let style = CaptionStyle::default();
        let small = CanvasSpec { width: 640, height: 360 };
        let large = CanvasSpec { width: 1920, height: 1080 };

        let (sx, sy) = style.origin(small);
        let (lx, ly) = style.origin(large);
        assert_relative_eq!(sx / 640.0, lx / 1920.0, epsilon = 0.01);
        assert_relative_eq!(sy / 360.0, ly / 1080.0, epsilon = 0.01);
        assert!(ly < 1080.0);
        assert_relative_eq!(style.font_px(large), 3.0 * style.font_px(small), epsilon = 0.01);
    }

    #[test]
    fn test_font_px_has_floor() {
        let tiny = CanvasSpec { width: 40, height: 20 };
        assert_relative_eq!(CaptionStyle::default().font_px(tiny), MIN_FONT_PX);
    }

    #[test]
    fn test_blend_full_and_partial_coverage() {
        let mut canvas = RgbImage::new(4, 4);
        let coverage = [255, 128, 0, 255];
        blend_coverage(&mut canvas, 1, 1, 2, 2, &coverage, Rgb([255, 255, 255]));

        assert_eq!(canvas.get_pixel(1, 1), &Rgb([255, 255, 255]));
        assert_eq!(canvas.get_pixel(2, 1), &Rgb([128, 128, 128]));
        assert_eq!(canvas.get_pixel(1, 2), &Rgb([0, 0, 0]));
        assert_eq!(canvas.get_pixel(2, 2), &Rgb([255, 255, 255]));
        assert_eq!(canvas.get_pixel(0, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_blend_clips_outside_canvas() {
        let mut canvas = RgbImage::new(2, 2);
        let coverage = [255; 9];
        blend_coverage(&mut canvas, -1, -1, 3, 3, &coverage, Rgb([10, 20, 30]));
        assert!(canvas.pixels().all(|p| *p == Rgb([10, 20, 30])));

        blend_coverage(&mut canvas, 5, 5, 3, 3, &coverage, Rgb([0, 0, 0]));
        assert!(canvas.pixels().all(|p| *p == Rgb([10, 20, 30])));
    }

    #[test]
    fn test_load_missing_font_is_error() {
        let result = CaptionPainter::load(Path::new("/nonexistent/font.ttf"), CaptionStyle::default());
        assert!(matches!(result, Err(ProcessingError::Font { .. })));
    }

    #[test]
    fn test_load_garbage_font_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.ttf");
        fs::write(&path, b"definitely not a font").unwrap();
        assert!(CaptionPainter::load(&path, CaptionStyle::default()).is_err());
    }

    fn system_painter() -> Option<CaptionPainter> {
        let Some(font) = find_system_font() else {
            eprintln!("skipping caption rendering check: no system font installed");
            return None;
        };
        Some(CaptionPainter::load(&font, CaptionStyle::default()).unwrap())
    }

    /// Bounding box `(left, top, right, bottom)` of every non-black pixel.
    fn lit_bounds(canvas: &RgbImage) -> Option<(u32, u32, u32, u32)> {
        canvas
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0 != [0, 0, 0])
            .fold(None, |acc, (x, y, _)| match acc {
                None => Some((x, y, x, y)),
                Some((l, t, r, b)) => Some((l.min(x), t.min(y), r.max(x), b.max(y))),
            })
    }

    #[rstest]
    #[case(640, 360)]
    #[case(1920, 1080)]
    fn test_caption_lands_in_relative_band(#[case] width: u32, #[case] height: u32) {
        let Some(painter) = system_painter() else {
            return;
        };
        let mut canvas = RgbImage::new(width, height);
        painter.draw(&mut canvas, "March 07, 2021");

        let (left, top, right, bottom) = lit_bounds(&canvas).expect("caption drew nothing");
        let spec = CanvasSpec { width, height };
        let (origin_x, origin_y) = CaptionStyle::default().origin(spec);

        assert!(top as f32 >= origin_y, "caption starts at row {top}, above {origin_y}");
        assert!(left as f32 >= origin_x - 2.0, "caption starts at column {left}");
        assert!((left as f32) < width as f32 * 0.10);
        assert!(right < width / 2, "caption too wide: ends at {right}");
        assert!(bottom < height);

        // same band at any size
        let band_top = top as f32 / height as f32;
        assert!((0.88..0.95).contains(&band_top), "band starts at {band_top}");
        let glyph_height = (bottom - top) as f32 / height as f32;
        assert!((0.02..0.08).contains(&glyph_height), "glyph height {glyph_height}");
    }
}

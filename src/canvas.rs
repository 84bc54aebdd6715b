use std::fmt;

use crate::error::{ProcessingError, Result};
use crate::source::SourceImage;

/// Size shared by every frame of the movie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasSpec {
    pub width: u32,
    pub height: u32,
}

impl CanvasSpec {
    /// Widest width and tallest height seen (possibly from different
    /// images), each clamped to its bound.
    pub fn resolve<'a, I>(images: I, max_width: u32, max_height: u32) -> Result<Self>
    where
        I: IntoIterator<Item = &'a SourceImage>,
    {
        let (observed_width, observed_height) = images
            .into_iter()
            .fold(None, |acc: Option<(u32, u32)>, img| {
                let (w, h) = acc.unwrap_or((0, 0));
                Some((w.max(img.width), h.max(img.height)))
            })
            .ok_or(ProcessingError::EmptySourceSet)?;

        let width = observed_width.min(max_width);
        let height = observed_height.min(max_height);
        if width == 0 || height == 0 {
            return Err(ProcessingError::InvalidConfig(format!(
                "resolved canvas {width}x{height} is empty"
            )));
        }
        log::info!(
            "canvas {width}x{height} (observed max {observed_width}x{observed_height}, bound {max_width}x{max_height})"
        );
        Ok(Self { width, height })
    }
}

impl fmt::Display for CanvasSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orientation::Orientation;
    use rstest::rstest;

    fn image(width: u32, height: u32) -> SourceImage {
        SourceImage {
            path: format!("{width}x{height}.jpg").into(),
            width,
            height,
            orientation: Orientation::Upright,
            raw_timestamp: None,
        }
    }

    #[test]
    fn test_clamps_each_axis_independently() {
        let images = [image(3000, 2000), image(800, 600), image(1920, 1080)];
        let canvas = CanvasSpec::resolve(&images, 1920, 1080).unwrap();
        assert_eq!(canvas, CanvasSpec { width: 1920, height: 1080 });
    }

    #[test]
    fn test_max_axes_can_come_from_different_images() {
        let images = [image(1200, 300), image(400, 900)];
        let canvas = CanvasSpec::resolve(&images, 1920, 1080).unwrap();
        assert_eq!(canvas, CanvasSpec { width: 1200, height: 900 });
    }

    #[rstest]
    #[case::under_bounds(640, 480, 1920, 1080, 640, 480)]
    #[case::width_over(2500, 480, 1920, 1080, 1920, 480)]
    #[case::height_over(640, 4000, 1920, 1080, 640, 1080)]
    fn test_single_image(
        #[case] w: u32,
        #[case] h: u32,
        #[case] max_w: u32,
        #[case] max_h: u32,
        #[case] expected_w: u32,
        #[case] expected_h: u32,
    ) {
        let canvas = CanvasSpec::resolve(&[image(w, h)], max_w, max_h).unwrap();
        assert_eq!((canvas.width, canvas.height), (expected_w, expected_h));
    }

    #[test]
    fn test_empty_set_is_error() {
        let images: Vec<SourceImage> = Vec::new();
        assert!(matches!(
            CanvasSpec::resolve(&images, 1920, 1080),
            Err(ProcessingError::EmptySourceSet)
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(CanvasSpec { width: 1920, height: 1080 }.to_string(), "1920x1080");
    }
}

use image::DynamicImage;

/// How the stored pixel buffer must be rotated to display upright.
///
/// Mirrored EXIF orientations (2, 4, 5, 7) are rare in camera output and are
/// treated as upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Upright,
    Rotate180,
    /// 90° clockwise; width and height swap.
    Rotate90Cw,
    /// 90° counter-clockwise; width and height swap.
    Rotate90Ccw,
}

impl Orientation {
    /// Maps the EXIF `Orientation` tag value.
    pub fn from_exif(value: u32) -> Self {
        match value {
            3 => Orientation::Rotate180,
            6 => Orientation::Rotate90Cw,
            8 => Orientation::Rotate90Ccw,
            _ => Orientation::Upright,
        }
    }

    pub fn swaps_dimensions(self) -> bool {
        matches!(self, Orientation::Rotate90Cw | Orientation::Rotate90Ccw)
    }

    /// Dimensions after [`Orientation::apply`].
    pub fn oriented_dimensions(self, width: u32, height: u32) -> (u32, u32) {
        if self.swaps_dimensions() {
            (height, width)
        } else {
            (width, height)
        }
    }

    pub fn apply(self, img: DynamicImage) -> DynamicImage {
        match self {
            Orientation::Upright => img,
            Orientation::Rotate180 => img.rotate180(),
            Orientation::Rotate90Cw => img.rotate90(),
            Orientation::Rotate90Ccw => img.rotate270(),
        }
    }
}

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ProcessingError, Result};
use crate::orientation::Orientation;

/// A photo as found on disk, before any pixel is decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceImage {
    pub path: PathBuf,
    /// Native (stored, pre-rotation) width.
    pub width: u32,
    /// Native (stored, pre-rotation) height.
    pub height: u32,
    pub orientation: Orientation,
    /// Timestamp tag value the key was derived from.
    pub raw_timestamp: Option<String>,
}

impl SourceImage {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff", "webp"];

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Lists the photos directly inside `dir`, sorted by path so equal
/// timestamps keep a deterministic order.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut image_files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| ProcessingError::io("scan", dir, e))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_image_file(path))
        .collect();

    image_files.sort();
    Ok(image_files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("a.jpg", true)]
    #[case("a.JPG", true)]
    #[case("a.jpeg", true)]
    #[case("a.png", true)]
    #[case("a.TIFF", true)]
    #[case("a.webp", true)]
    #[case("a.txt", false)]
    #[case("a.mkv", false)]
    #[case("jpg", false)]
    fn test_is_image_file(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_image_file(Path::new(name)), expected);
    }

    #[test]
    fn test_list_images_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["c.jpg", "a.PNG", "notes.txt", "b.jpeg"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("nested.jpg")).unwrap();

        let names: Vec<String> = list_images(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.PNG", "b.jpeg", "c.jpg"]);
    }

    #[test]
    fn test_list_images_missing_dir_is_error() {
        let err = list_images(Path::new("/nonexistent/photolapse/src")).unwrap_err();
        assert!(matches!(err, ProcessingError::Io { stage: "scan", .. }));
    }
}

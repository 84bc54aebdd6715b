use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::{NaiveDate, NaiveTime};
use exif::{Exif, In, Tag, Value};

use crate::error::SkipReason;
use crate::orientation::Orientation;
use crate::source::SourceImage;

/// Typed view over the handful of EXIF fields the pipeline cares about.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureMetadata {
    original: Option<String>,
    digitized: Option<String>,
    modified: Option<String>,
    model: Option<String>,
    orientation: Orientation,
}

impl CaptureMetadata {
    pub fn new(
        original: Option<&str>,
        digitized: Option<&str>,
        modified: Option<&str>,
        model: Option<&str>,
        orientation: Orientation,
    ) -> Self {
        Self {
            original: original.map(str::to_string),
            digitized: digitized.map(str::to_string),
            modified: modified.map(str::to_string),
            model: model.map(str::to_string),
            orientation,
        }
    }

    pub fn from_exif(exif: &Exif) -> Self {
        let orientation = exif
            .get_field(Tag::Orientation, In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .map(Orientation::from_exif)
            .unwrap_or_default();

        Self {
            original: ascii_field(exif, Tag::DateTimeOriginal),
            digitized: ascii_field(exif, Tag::DateTimeDigitized),
            modified: ascii_field(exif, Tag::DateTime),
            model: ascii_field(exif, Tag::Model),
            orientation,
        }
    }

    pub fn original_capture_time(&self) -> Option<&str> {
        self.original.as_deref()
    }

    pub fn digitized_time(&self) -> Option<&str> {
        self.digitized.as_deref()
    }

    pub fn last_modified_time(&self) -> Option<&str> {
        self.modified.as_deref()
    }

    pub fn camera_model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// First present of capture, digitized, modified.
    pub fn best_timestamp(&self) -> Option<&str> {
        self.original_capture_time()
            .or_else(|| self.digitized_time())
            .or_else(|| self.last_modified_time())
    }
}

fn ascii_field(exif: &Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    let Value::Ascii(ref parts) = field.value else {
        return None;
    };
    let text = String::from_utf8_lossy(parts.first()?);
    let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    (!text.is_empty()).then(|| text.to_string())
}

/// Reads the EXIF block embedded in `path`.
///
/// A missing or corrupt container is reported the same way.
pub fn read_metadata(path: &Path) -> Result<CaptureMetadata, SkipReason> {
    let file = File::open(path).map_err(|e| SkipReason::Unreadable(e.to_string()))?;
    let exif = exif::Reader::new()
        .read_from_container(&mut BufReader::new(file))
        .map_err(|e| SkipReason::NoMetadata(e.to_string()))?;
    Ok(CaptureMetadata::from_exif(&exif))
}

/// Reads metadata and header dimensions for one photo.
///
/// Only the image header is parsed here; pixels are decoded later by the
/// compositor.
pub fn extract(
    path: &Path,
    full_time_models: &[String],
) -> Result<(TimestampKey, SourceImage), SkipReason> {
    let meta = read_metadata(path)?;
    let key = TimestampKey::from_metadata(&meta, full_time_models)?;
    let (width, height) =
        image::image_dimensions(path).map_err(|e| SkipReason::Unreadable(e.to_string()))?;
    log::debug!("{}: key {key}, {width}x{height}", path.display());

    Ok((
        key,
        SourceImage {
            path: path.to_path_buf(),
            width,
            height,
            orientation: meta.orientation(),
            raw_timestamp: meta.best_timestamp().map(str::to_string),
        },
    ))
}

const DATE_LEN: usize = 8;
const DATE_TIME_LEN: usize = 15;

/// `YYYYMMDD` or `YYYYMMDD_HHMMSS`. Fixed width and zero padded, so plain
/// string order is chronological order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimestampKey {
    key: String,
    date: NaiveDate,
}

impl TimestampKey {
    /// Picks the best timestamp tag and derives the key. Models listed in
    /// `full_time_models` keep their time of day.
    pub fn from_metadata(
        meta: &CaptureMetadata,
        full_time_models: &[String],
    ) -> Result<Self, SkipReason> {
        let raw = meta.best_timestamp().ok_or(SkipReason::NoTimestampTag)?;
        let full_time = meta
            .camera_model()
            .map(|model| full_time_models.iter().any(|m| m == model))
            .unwrap_or(false);
        Self::from_raw(raw, full_time)
    }

    /// `2021:03:07 14:22:05` becomes `20210307`, or `20210307_142205` when
    /// `full_time` is set. A raw value without a usable time of day falls
    /// back to the date-only form.
    pub fn from_raw(raw: &str, full_time: bool) -> Result<Self, SkipReason> {
        let unparseable = || SkipReason::UnparseableTimestamp(raw.to_string());
        let normalized: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, ':' | '-' | '/'))
            .map(|c| if c.is_whitespace() { '_' } else { c })
            .collect::<String>()
            .to_uppercase();

        let date_part = normalized.get(..DATE_LEN).ok_or_else(unparseable)?;
        if !date_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(unparseable());
        }
        let date = NaiveDate::parse_from_str(date_part, "%Y%m%d").map_err(|_| unparseable())?;

        let key = match normalized.get(..DATE_TIME_LEN) {
            Some(with_time) if full_time && has_valid_time(with_time) => with_time.to_string(),
            _ => date_part.to_string(),
        };
        Ok(Self { key, date })
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn has_time(&self) -> bool {
        self.key.len() == DATE_TIME_LEN
    }
}

fn has_valid_time(key: &str) -> bool {
    key.get(DATE_LEN..DATE_LEN + 1) == Some("_")
        && key.get(DATE_LEN + 1..).is_some_and(|time| {
            time.bytes().all(|b| b.is_ascii_digit())
                && NaiveTime::parse_from_str(time, "%H%M%S").is_ok()
        })
}

impl fmt::Display for TimestampKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.key)
    }
}

#![allow(dead_code)]

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use exif::experimental::Writer;
use exif::{Field, In, Tag, Value};
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};

use photolapse::encoder::muxed_output_path;
use photolapse::sequence::count_existing_frames;
use photolapse::{AudioProbe, Encoder, EncodingJob, Muxer, ProcessingError};

/// EXIF tags to embed in a fixture photo.
#[derive(Default, Clone)]
pub struct Tags<'a> {
    pub original: Option<&'a str>,
    pub digitized: Option<&'a str>,
    pub modified: Option<&'a str>,
    pub model: Option<&'a str>,
    pub orientation: Option<u16>,
}

impl<'a> Tags<'a> {
    pub fn taken(original: &'a str) -> Self {
        Self {
            original: Some(original),
            ..Self::default()
        }
    }
}

fn ascii(tag: Tag, text: &str) -> Field {
    Field {
        tag,
        ifd_num: In::PRIMARY,
        value: Value::Ascii(vec![text.as_bytes().to_vec()]),
    }
}

fn exif_block(tags: &Tags) -> Vec<u8> {
    let mut fields = Vec::new();
    if let Some(t) = tags.original {
        fields.push(ascii(Tag::DateTimeOriginal, t));
    }
    if let Some(t) = tags.digitized {
        fields.push(ascii(Tag::DateTimeDigitized, t));
    }
    if let Some(t) = tags.modified {
        fields.push(ascii(Tag::DateTime, t));
    }
    if let Some(m) = tags.model {
        fields.push(ascii(Tag::Model, m));
    }
    if let Some(o) = tags.orientation {
        fields.push(Field {
            tag: Tag::Orientation,
            ifd_num: In::PRIMARY,
            value: Value::Short(vec![o]),
        });
    }

    let mut writer = Writer::new();
    for field in &fields {
        writer.push_field(field);
    }
    let mut tiff = Cursor::new(Vec::new());
    writer.write(&mut tiff, false).unwrap();
    tiff.into_inner()
}

fn encode_jpeg(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let mut jpeg = Vec::new();
    let img = RgbImage::from_pixel(width, height, Rgb(color));
    img.write_with_encoder(JpegEncoder::new_with_quality(&mut jpeg, 90))
        .unwrap();
    jpeg
}

/// Writes a solid-color JPEG, with an APP1 EXIF segment when `tags` is given.
pub fn write_photo(
    dir: &Path,
    name: &str,
    width: u32,
    height: u32,
    color: [u8; 3],
    tags: Option<Tags>,
) -> PathBuf {
    let jpeg = encode_jpeg(width, height, color);
    let bytes = match tags {
        None => jpeg,
        Some(tags) => {
            let tiff = exif_block(&tags);
            let mut payload = b"Exif\0\0".to_vec();
            payload.extend_from_slice(&tiff);
            let segment_len = (payload.len() + 2) as u16;

            let mut out = Vec::with_capacity(jpeg.len() + payload.len() + 4);
            out.extend_from_slice(&jpeg[..2]); // SOI
            out.extend_from_slice(&[0xFF, 0xE1]);
            out.extend_from_slice(&segment_len.to_be_bytes());
            out.extend_from_slice(&payload);
            out.extend_from_slice(&jpeg[2..]);
            out
        }
    };
    let path = dir.join(name);
    fs::write(&path, bytes).unwrap();
    path
}

/// Records jobs and how many frames were on disk when it was called.
#[derive(Default)]
pub struct RecordingEncoder {
    pub jobs: Mutex<Vec<(EncodingJob, usize)>>,
    pub fail: bool,
}

impl RecordingEncoder {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(EncodingJob, usize)> {
        self.jobs.lock().unwrap().clone()
    }
}

impl Encoder for RecordingEncoder {
    fn encode(&self, job: &EncodingJob) -> Result<(), ProcessingError> {
        let frames = count_existing_frames(&job.frame_dir);
        self.jobs.lock().unwrap().push((job.clone(), frames));
        if self.fail {
            return Err(ProcessingError::InvalidConfig("encoder exploded".to_string()));
        }
        fs::write(&job.output, b"video").unwrap();
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingMuxer {
    pub calls: Mutex<Vec<(PathBuf, PathBuf)>>,
}

impl Muxer for RecordingMuxer {
    fn mux(&self, video: &Path, audio: &Path) -> Result<PathBuf, ProcessingError> {
        self.calls
            .lock()
            .unwrap()
            .push((video.to_path_buf(), audio.to_path_buf()));
        Ok(muxed_output_path(video))
    }
}

pub struct FixedDuration(pub f64);

impl AudioProbe for FixedDuration {
    fn duration_seconds(&self, _audio: &Path) -> Result<f64, ProcessingError> {
        Ok(self.0)
    }
}

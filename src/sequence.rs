use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;

use crate::canvas::CanvasSpec;
use crate::caption::{CaptionPainter, CaptionStyle};
use crate::compositor::Compositor;
use crate::config::MovieConfig;
use crate::encoder::{AudioProbe, Encoder, EncodingJob, Muxer};
use crate::error::{ProcessingError, Result, SkipReason};
use crate::metadata::{self, TimestampKey};
use crate::source::SourceImage;

/// Largest frame number the 5-digit naming scheme can express.
pub const MAX_FRAMES: usize = 99_999;

const FRAME_PREFIX: &str = "image_";
const FRAME_SUFFIX: &str = ".jpg";

/// `image_00001.jpg` for frame 1.
pub fn frame_file_name(number: usize) -> String {
    format!("{FRAME_PREFIX}{number:05}{FRAME_SUFFIX}")
}

pub fn is_frame_file_name(name: &str) -> bool {
    name.strip_prefix(FRAME_PREFIX)
        .and_then(|rest| rest.strip_suffix(FRAME_SUFFIX))
        .map(|digits| digits.len() == 5 && digits.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

/// Removes frames left over from an earlier run so the encoder's pattern only
/// matches what this run writes. Returns how many were removed.
pub fn clear_frames(dir: &Path) -> Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(dir).map_err(|e| ProcessingError::io("compose", dir, e))? {
        let path = entry.map_err(|e| ProcessingError::io("compose", dir, e))?.path();
        let is_frame = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(is_frame_file_name)
            .unwrap_or(false);
        if is_frame && path.is_file() {
            fs::remove_file(&path).map_err(|e| ProcessingError::io("compose", &path, e))?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Number of frames present as an unbroken run from `image_00001.jpg`.
pub fn count_existing_frames(dir: &Path) -> usize {
    (1..=MAX_FRAMES)
        .take_while(|&n| dir.join(frame_file_name(n)).is_file())
        .count()
}

/// Closes the gaps left by failed frames. `succeeded[i]` tells whether the
/// frame at rank `i + 1` was written. Returns the number of frames kept.
pub fn renumber_frames(dir: &Path, succeeded: &[bool]) -> Result<usize> {
    let mut next = 1;
    for (i, &ok) in succeeded.iter().enumerate() {
        let current = dir.join(frame_file_name(i + 1));
        if !ok {
            if current.exists() {
                fs::remove_file(&current).map_err(|e| ProcessingError::io("compose", &current, e))?;
            }
            continue;
        }
        if i + 1 != next {
            let target = dir.join(frame_file_name(next));
            fs::rename(&current, &target).map_err(|e| ProcessingError::io("compose", &current, e))?;
        }
        next += 1;
    }
    Ok(next - 1)
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameEntry {
    pub key: TimestampKey,
    pub image: SourceImage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedImage {
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// Photos in timestamp order; equal keys keep their input order.
#[derive(Debug, Clone, Default)]
pub struct OrderedFrameSet {
    entries: Vec<FrameEntry>,
}

impl OrderedFrameSet {
    pub fn from_entries(mut entries: Vec<FrameEntry>) -> Self {
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Self { entries }
    }

    /// Extracts every path and keeps the ones with a usable timestamp.
    pub fn scan(paths: &[PathBuf], full_time_models: &[String]) -> (Self, Vec<SkippedImage>) {
        let results: Vec<_> = paths
            .par_iter()
            .map(|path| (path, metadata::extract(path, full_time_models)))
            .collect();

        let mut entries = Vec::with_capacity(results.len());
        let mut skipped = Vec::new();
        for (path, result) in results {
            match result {
                Ok((key, image)) => entries.push(FrameEntry { key, image }),
                Err(reason) => {
                    log::warn!("skipping {}: {reason}", path.display());
                    skipped.push(SkippedImage {
                        path: path.clone(),
                        reason,
                    });
                }
            }
        }
        (Self::from_entries(entries), skipped)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[FrameEntry] {
        &self.entries
    }

    pub fn images(&self) -> impl Iterator<Item = &SourceImage> {
        self.entries.iter().map(|e| &e.image)
    }

    /// Entries with their 1-based frame numbers.
    pub fn numbered(&self) -> impl Iterator<Item = (usize, &FrameEntry)> {
        self.entries.iter().enumerate().map(|(i, e)| (i + 1, e))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateSource {
    Configured,
    Audio,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRate {
    pub fps: f64,
    pub source: RateSource,
}

/// With a soundtrack the movie is stretched to its length, whatever rate was
/// configured.
pub fn effective_frame_rate(
    configured: f64,
    frames: usize,
    audio: Option<(&Path, f64)>,
) -> Result<FrameRate> {
    if frames == 0 {
        return Err(ProcessingError::InvalidConfig(
            "cannot derive a frame rate for zero frames".to_string(),
        ));
    }
    match audio {
        Some((path, duration)) => {
            if !duration.is_finite() || duration <= 0.0 {
                return Err(ProcessingError::ZeroDurationAudio {
                    path: path.to_path_buf(),
                    duration,
                });
            }
            Ok(FrameRate {
                fps: frames as f64 / duration,
                source: RateSource::Audio,
            })
        }
        None => Ok(FrameRate {
            fps: configured,
            source: RateSource::Configured,
        }),
    }
}

/// Output of the scan stage.
#[derive(Debug, Clone)]
pub struct Plan {
    pub frames: OrderedFrameSet,
    pub canvas: CanvasSpec,
    pub skipped: Vec<SkippedImage>,
    /// Soundtrack length in seconds, probed up front.
    pub audio_duration: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct CompositionReport {
    pub written: usize,
    pub failed: Vec<SkippedImage>,
}

#[derive(Debug, Clone)]
pub struct EncodeReport {
    pub rate: FrameRate,
    pub video: PathBuf,
    pub muxed: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub canvas: CanvasSpec,
    /// Images with a usable timestamp.
    pub found: usize,
    /// Frames handed to the encoder.
    pub frames: usize,
    pub skipped: Vec<SkippedImage>,
    pub failed: Vec<SkippedImage>,
    pub encode: EncodeReport,
}

/// Progress callback: `(frames_done, frames_total)`.
pub type ProgressFn = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Runs scan → compose → encode → mux for one movie.
pub struct SequenceDriver<'a> {
    config: &'a MovieConfig,
    encoder: &'a dyn Encoder,
    muxer: &'a dyn Muxer,
    audio: &'a dyn AudioProbe,
    progress: Option<ProgressFn>,
}

impl<'a> SequenceDriver<'a> {
    pub fn new(
        config: &'a MovieConfig,
        encoder: &'a dyn Encoder,
        muxer: &'a dyn Muxer,
        audio: &'a dyn AudioProbe,
    ) -> Self {
        Self {
            config,
            encoder,
            muxer,
            audio,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn plan(&self, paths: &[PathBuf]) -> Result<Plan> {
        let (frames, skipped) = OrderedFrameSet::scan(paths, &self.config.full_time_models);
        if frames.is_empty() {
            return Err(ProcessingError::EmptySourceSet);
        }
        if frames.len() > MAX_FRAMES {
            return Err(ProcessingError::InvalidConfig(format!(
                "{} images exceed the {MAX_FRAMES} frame limit of the naming scheme",
                frames.len()
            )));
        }
        let canvas = CanvasSpec::resolve(
            frames.images(),
            self.config.max_width,
            self.config.max_height,
        )?;
        let audio_duration = self.probe_audio()?;
        log::info!(
            "{} images found ({} skipped), canvas {canvas}",
            frames.len(),
            skipped.len()
        );
        Ok(Plan {
            frames,
            canvas,
            skipped,
            audio_duration,
        })
    }

    /// Reads the soundtrack length, rejecting tracks a frame rate cannot be
    /// derived from before any frame is written.
    fn probe_audio(&self) -> Result<Option<f64>> {
        let Some(path) = &self.config.audio else {
            return Ok(None);
        };
        let duration = self.audio.duration_seconds(path)?;
        if !duration.is_finite() || duration <= 0.0 {
            return Err(ProcessingError::ZeroDurationAudio {
                path: path.clone(),
                duration,
            });
        }
        log::info!("audio track {} lasts {duration}s", path.display());
        Ok(Some(duration))
    }

    pub fn build_compositor(&self, canvas: CanvasSpec) -> Result<Compositor> {
        let compositor = Compositor::new(canvas, self.config.background);
        match &self.config.font {
            Some(font) => Ok(compositor.with_caption(CaptionPainter::load(font, CaptionStyle::default())?)),
            None => Ok(compositor),
        }
    }

    /// Writes one frame per entry. Frames that fail are dropped and the rest
    /// renumbered, so the directory always holds `1..=written`.
    pub fn compose(&self, plan: &Plan) -> Result<CompositionReport> {
        let frame_dir = &self.config.frame_dir;
        fs::create_dir_all(frame_dir).map_err(|e| ProcessingError::io("compose", frame_dir, e))?;
        let stale = clear_frames(frame_dir)?;
        if stale > 0 {
            log::info!("removed {stale} stale frames from {}", frame_dir.display());
        }

        let compositor = self.build_compositor(plan.canvas)?;
        if !compositor.has_caption() {
            log::info!("no caption font configured, frames will not be dated");
        }
        let total = plan.frames.len();
        let done = AtomicUsize::new(0);
        let progress = self.progress.as_ref();

        let numbered: Vec<_> = plan.frames.numbered().collect();
        let results: Vec<Result<()>> = numbered
            .par_iter()
            .map(|&(number, entry)| {
                let output = frame_dir.join(frame_file_name(number));
                let result = compositor.write_frame(&entry.image, &entry.key, &output);
                log::debug!(
                    "{} ({}) -> {}",
                    entry.image.file_name(),
                    entry.image.raw_timestamp.as_deref().unwrap_or("no timestamp"),
                    output.display()
                );

                let current = done.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(report) = progress {
                    report(current, total);
                }
                result
            })
            .collect();

        let mut failed = Vec::new();
        let succeeded: Vec<bool> = results
            .into_iter()
            .zip(plan.frames.entries())
            .map(|(result, entry)| match result {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("dropping {}: {e}", entry.image.file_name());
                    failed.push(SkippedImage {
                        path: entry.image.path.clone(),
                        reason: SkipReason::Unreadable(e.to_string()),
                    });
                    false
                }
            })
            .collect();

        let written = renumber_frames(frame_dir, &succeeded)?;
        if written == 0 {
            return Err(ProcessingError::NoFrames(frame_dir.clone()));
        }
        Ok(CompositionReport { written, failed })
    }

    /// Frames left by an earlier run, for skip-composition mode.
    pub fn reuse_frames(&self, plan: &Plan) -> Result<usize> {
        let existing = count_existing_frames(&self.config.frame_dir);
        if existing == 0 {
            return Err(ProcessingError::NoFrames(self.config.frame_dir.clone()));
        }
        if existing != plan.frames.len() {
            log::warn!(
                "reusing {existing} existing frames but {} images were found",
                plan.frames.len()
            );
        }
        Ok(existing)
    }

    pub fn frame_rate(&self, plan: &Plan, frames: usize) -> Result<FrameRate> {
        let audio = self
            .config
            .audio
            .as_deref()
            .zip(plan.audio_duration);
        effective_frame_rate(self.config.fps, frames, audio)
    }

    pub fn encode(&self, plan: &Plan, frames: usize) -> Result<EncodeReport> {
        let rate = self.frame_rate(plan, frames)?;
        let job = EncodingJob {
            frame_dir: self.config.frame_dir.clone(),
            fps: rate.fps,
            quality: self.config.quality,
            output: self.config.output.clone(),
            audio: self.config.audio.clone(),
        };
        self.encoder.encode(&job)?;

        let muxed = match &job.audio {
            Some(audio) => Some(self.muxer.mux(&job.output, audio)?),
            None => None,
        };
        Ok(EncodeReport {
            rate,
            video: job.output,
            muxed,
        })
    }

    pub fn run(&self, paths: &[PathBuf]) -> Result<RunReport> {
        let plan = self.plan(paths)?;
        let (frames, failed) = if self.config.skip_composition {
            (self.reuse_frames(&plan)?, Vec::new())
        } else {
            let report = self.compose(&plan)?;
            (report.written, report.failed)
        };
        let encode = self.encode(&plan, frames)?;
        Ok(RunReport {
            canvas: plan.canvas,
            found: plan.frames.len(),
            frames,
            skipped: plan.skipped,
            failed,
            encode,
        })
    }
}

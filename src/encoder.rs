use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;

use crate::error::{ProcessingError, Result};

/// printf-style pattern matching [`frame_file_name`].
pub const FRAME_PATTERN: &str = "image_%05d.jpg";
pub const MUX_PREFIX: &str = "music-";

/// Everything the encoder needs, built right before encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodingJob {
    pub frame_dir: PathBuf,
    pub fps: f64,
    pub quality: u32,
    pub output: PathBuf,
    pub audio: Option<PathBuf>,
}

impl EncodingJob {
    pub fn input_pattern(&self) -> PathBuf {
        self.frame_dir.join(FRAME_PATTERN)
    }
}

pub trait Encoder: Sync {
    /// Turns the numbered frames into a single video at `job.output`.
    fn encode(&self, job: &EncodingJob) -> Result<()>;
}

pub trait Muxer: Sync {
    /// Combines the first video stream of `video` with the first audio
    /// stream of `audio`; returns the path of the new file.
    fn mux(&self, video: &Path, audio: &Path) -> Result<PathBuf>;
}

pub trait AudioProbe: Sync {
    fn duration_seconds(&self, audio: &Path) -> Result<f64>;
}

/// `movie.mkv` -> `music-movie.mkv`, next to the original.
pub fn muxed_output_path(video: &Path) -> PathBuf {
    let name = video
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    video.with_file_name(format!("{MUX_PREFIX}{name}"))
}

fn render_command(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|part| part.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Runs `cmd` to completion; a spawn failure or non-zero exit is fatal.
fn run_tool(stage: &'static str, mut cmd: Command) -> Result<Vec<u8>> {
    let command = render_command(&cmd);
    log::info!("{stage}: {command}");

    let output = cmd.output().map_err(|source| ProcessingError::Spawn {
        stage,
        command: command.clone(),
        source,
    })?;
    if !output.status.success() {
        return Err(ProcessingError::ExternalTool {
            stage,
            command,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output.stdout)
}

/// Encodes with ffmpeg/libx264.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    program: PathBuf,
}

impl FfmpegEncoder {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
        }
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn command(&self, job: &EncodingJob) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-y")
            .arg("-framerate")
            .arg(job.fps.to_string())
            .arg("-i")
            .arg(job.input_pattern())
            .arg("-c:v")
            .arg("libx264")
            .arg("-crf")
            .arg(job.quality.to_string())
            .arg("-pix_fmt")
            .arg("yuv420p")
            // yuv420p needs even dimensions
            .arg("-vf")
            .arg("pad=ceil(iw/2)*2:ceil(ih/2)*2")
            .arg(&job.output);
        cmd
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder for FfmpegEncoder {
    fn encode(&self, job: &EncodingJob) -> Result<()> {
        run_tool("encode", self.command(job)).map(|_| ())
    }
}

/// Muxes a soundtrack in with ffmpeg, copying both streams.
#[derive(Debug, Clone)]
pub struct FfmpegMuxer {
    program: PathBuf,
}

impl FfmpegMuxer {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
        }
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn command(&self, video: &Path, audio: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-y")
            .arg("-i")
            .arg(video)
            .arg("-i")
            .arg(audio)
            .args(["-map", "0:v:0", "-map", "1:a:0", "-c", "copy"])
            .arg(output);
        cmd
    }
}

impl Default for FfmpegMuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl Muxer for FfmpegMuxer {
    fn mux(&self, video: &Path, audio: &Path) -> Result<PathBuf> {
        let output = muxed_output_path(video);
        run_tool("mux", self.command(video, audio, &output))?;
        Ok(output)
    }
}

/// Reads container duration with ffprobe.
#[derive(Debug, Clone)]
pub struct FfprobeAudio {
    program: PathBuf,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Deserialize)]
struct ProbeOut {
    format: Option<ProbeFormat>,
}

impl FfprobeAudio {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("ffprobe"),
        }
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for FfprobeAudio {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioProbe for FfprobeAudio {
    fn duration_seconds(&self, audio: &Path) -> Result<f64> {
        let mut cmd = Command::new(&self.program);
        cmd.args(["-v", "error", "-print_format", "json", "-show_format"])
            .arg(audio);
        let stdout = run_tool("audio", cmd)?;
        parse_probe_duration(&stdout).map_err(|reason| ProcessingError::AudioProbe {
            path: audio.to_path_buf(),
            reason,
        })
    }
}

fn parse_probe_duration(stdout: &[u8]) -> std::result::Result<f64, String> {
    let parsed: ProbeOut =
        serde_json::from_slice(stdout).map_err(|e| format!("ffprobe json parse failed: {e}"))?;
    let raw = parsed
        .format
        .and_then(|f| f.duration)
        .ok_or_else(|| "ffprobe reported no duration".to_string())?;
    raw.trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid duration `{raw}`: {e}"))
}

//! Sequential video decoding through the `ffmpeg` command-line tools.
//!
//! `ffprobe` reports the frame rate and dimensions of the first video
//! stream; `ffmpeg` then decodes that stream to packed RGB24 on a pipe,
//! one fixed-size record per frame, in presentation order.
//!
//! Rotation metadata is ignored (`-noautorotate`): frames come out in the
//! stored orientation, so every record is exactly `width * height * 3`
//! bytes of the probed dimensions.

use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use image::RgbImage;
use serde::Deserialize;
use tracing::{debug, warn};

use super::FrameError;

/// A decoded video, yielding frames strictly in order.
pub trait FrameSource {
    /// Source frame rate, when the container reports a usable one.
    fn frame_rate(&self) -> Option<f64>;

    /// Decodes the next frame, or `None` at end of stream.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Decode`] when reading from the decoder fails.
    fn next_frame(&mut self) -> Result<Option<RgbImage>, FrameError>;
}

/// Opens local video files as [`FrameSource`]s.
pub trait VideoOpener: Send + Sync {
    /// Opens `path` for sequential decoding.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Open`] when the file is missing or has no
    /// decodable video stream.
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>, FrameError>;
}

/// Opens videos with the system `ffprobe` and `ffmpeg` binaries.
#[derive(Debug, Clone)]
pub struct FfmpegOpener {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Default for FfmpegOpener {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

impl FfmpegOpener {
    /// Uses explicit binary locations instead of looking them up on `PATH`.
    #[must_use]
    pub fn with_binaries(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    fn probe(&self, path: &Path) -> Result<StreamInfo, FrameError> {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height,avg_frame_rate,r_frame_rate",
                "-of",
                "json",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| FrameError::spawn(self.ffprobe.display().to_string(), e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FrameError::open(path, stderr.trim().to_string()));
        }

        parse_probe_output(&output.stdout).map_err(|reason| FrameError::open(path, reason))
    }
}

impl VideoOpener for FfmpegOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>, FrameError> {
        if !path.is_file() {
            return Err(FrameError::open(path, "file does not exist"));
        }

        let info = self.probe(path)?;
        debug!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            fps = ?info.frame_rate,
            "probed video stream"
        );

        let mut child = Command::new(&self.ffmpeg)
            .args(["-v", "error", "-nostdin", "-noautorotate", "-i"])
            .arg(path)
            .args([
                "-map",
                "0:v:0",
                "-vsync",
                "passthrough",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| FrameError::spawn(self.ffmpeg.display().to_string(), e))?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(FrameError::open(path, "decoder stdout unavailable"));
        };

        Ok(Box::new(FfmpegDecoder {
            path: path.to_path_buf(),
            child,
            stdout: BufReader::new(stdout),
            info,
            finished: false,
        }))
    }
}

/// A running `ffmpeg` decode. The child process is reaped on drop.
struct FfmpegDecoder {
    path: PathBuf,
    child: Child,
    stdout: BufReader<ChildStdout>,
    info: StreamInfo,
    finished: bool,
}

impl FfmpegDecoder {
    fn frame_len(&self) -> usize {
        self.info.width as usize * self.info.height as usize * 3
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        match self.child.wait() {
            Ok(status) if !status.success() => {
                warn!(path = %self.path.display(), %status, "decoder exited with failure status");
            }
            Ok(_) => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to wait on decoder"),
        }
    }
}

impl FrameSource for FfmpegDecoder {
    fn frame_rate(&self) -> Option<f64> {
        self.info.frame_rate
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>, FrameError> {
        if self.finished {
            return Ok(None);
        }

        let mut buffer = vec![0u8; self.frame_len()];
        let filled = read_full(&mut self.stdout, &mut buffer)
            .map_err(|e| FrameError::decode(&self.path, e))?;

        if filled < buffer.len() {
            if filled > 0 {
                warn!(path = %self.path.display(), bytes = filled, "dropping truncated final frame");
            }
            self.finish();
            return Ok(None);
        }

        RgbImage::from_raw(self.info.width, self.info.height, buffer)
            .map(Some)
            .ok_or_else(|| {
                FrameError::decode(
                    &self.path,
                    std::io::Error::new(ErrorKind::InvalidData, "frame buffer size mismatch"),
                )
            })
    }
}

impl Drop for FfmpegDecoder {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Reads until `buffer` is full or the stream ends; returns bytes read.
fn read_full(reader: &mut impl Read, buffer: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[derive(Debug, Clone, PartialEq)]
struct StreamInfo {
    width: u32,
    height: u32,
    frame_rate: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
}

fn parse_probe_output(raw: &[u8]) -> Result<StreamInfo, String> {
    let parsed: ProbeOutput =
        serde_json::from_slice(raw).map_err(|e| format!("unreadable probe output: {e}"))?;
    let stream = parsed
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| "no video stream".to_string())?;

    let (Some(width), Some(height)) = (stream.width, stream.height) else {
        return Err("video stream has no dimensions".to_string());
    };
    if width == 0 || height == 0 {
        return Err("video stream has no dimensions".to_string());
    }

    let frame_rate = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_rational)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_rational));

    Ok(StreamInfo {
        width,
        height,
        frame_rate,
    })
}

/// Parses ffprobe's `num/den` rate notation. `0/0` and non-positive rates yield `None`.
fn parse_rational(raw: &str) -> Option<f64> {
    let (num, den) = raw.trim().split_once('/').unwrap_or((raw.trim(), "1"));
    let num: f64 = num.parse().ok()?;
    let den: f64 = den.parse().ok()?;
    if den == 0.0 {
        return None;
    }
    let rate = num / den;
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

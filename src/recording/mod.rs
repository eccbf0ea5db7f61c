mod controller;
mod encoder;
mod preview;
mod recorder;
#[cfg(test)]
mod testing;

pub use controller::{Controller, SessionOutcome};
pub use encoder::{Encoder, EncoderParams, FfmpegEncoder, FrameSink};
pub use preview::{PreviewFrame, PreviewSurface};
pub use recorder::{ScreenRecorder, SessionSummary};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

const MAX_FPS: f64 = 240.0;
const MAX_DIMENSION: u32 = 16384;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("codec '{0}' is not supported, expected one of: mp4v, xvid, h264, avc1, vp9")]
    UnsupportedCodec(String),
    #[error("invalid recorder configuration: {0}")]
    InvalidConfig(String),
    #[error("already recording")]
    AlreadyRecording,
    #[error("not recording")]
    NotRecording,
    #[error("captured frame is {actual_width}x{actual_height}, encoder expects {width}x{height}")]
    FrameSizeMismatch {
        width: u32,
        height: u32,
        actual_width: u32,
        actual_height: u32,
    },
    #[error("screen capture failed: {0:#}")]
    Capture(anyhow::Error),
    #[error("encoder error: {0}")]
    Encoder(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("recording worker panicked")]
    WorkerPanicked,
}

pub type RecordResult<T> = std::result::Result<T, RecordError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Recording,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    Mp4v,
    Xvid,
    H264,
    Avc1,
    Vp9,
}

impl Codec {
    pub fn all() -> &'static [Codec] {
        &[Codec::Mp4v, Codec::Xvid, Codec::H264, Codec::Avc1, Codec::Vp9]
    }

    pub fn fourcc(&self) -> &'static str {
        match self {
            Codec::Mp4v => "mp4v",
            Codec::Xvid => "xvid",
            Codec::H264 => "h264",
            Codec::Avc1 => "avc1",
            Codec::Vp9 => "vp9",
        }
    }
}

impl FromStr for Codec {
    type Err = RecordError;

    fn from_str(s: &str) -> RecordResult<Self> {
        let lower = s.trim().to_ascii_lowercase();
        Codec::all()
            .iter()
            .copied()
            .find(|c| c.fourcc() == lower)
            .ok_or_else(|| RecordError::UnsupportedCodec(s.to_string()))
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.fourcc())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    Avi,
    #[default]
    Mp4,
}

impl Container {
    pub fn all() -> &'static [Container] {
        &[Container::Avi, Container::Mp4]
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Container::Avi => "avi",
            Container::Mp4 => "mp4",
        }
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".{}", self.extension())
    }
}

/// Stored in config files as a plain number (`fps = 30`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(try_from = "u32", into = "u32")]
pub enum FrameRate {
    Fps15,
    #[default]
    Fps30,
    Fps60,
}

impl FrameRate {
    pub fn all() -> &'static [FrameRate] {
        &[FrameRate::Fps15, FrameRate::Fps30, FrameRate::Fps60]
    }

    pub fn value(&self) -> f64 {
        match self {
            FrameRate::Fps15 => 15.0,
            FrameRate::Fps30 => 30.0,
            FrameRate::Fps60 => 60.0,
        }
    }
}

impl From<FrameRate> for u32 {
    fn from(rate: FrameRate) -> u32 {
        rate.value() as u32
    }
}

impl TryFrom<u32> for FrameRate {
    type Error = String;

    fn try_from(fps: u32) -> Result<Self, Self::Error> {
        match fps {
            15 => Ok(FrameRate::Fps15),
            30 => Ok(FrameRate::Fps30),
            60 => Ok(FrameRate::Fps60),
            other => Err(format!("frame rate {} is not one of 15, 30, 60", other)),
        }
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value() as u32)
    }
}

/// What to do with a captured frame whose size differs from the encoder's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FramePolicy {
    #[default]
    Scale,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone)]
pub struct RecorderConfig {
    pub output_path: PathBuf,
    pub resolution: Resolution,
    pub codec: Codec,
    pub fps: f64,
    pub extension: Container,
    pub frame_policy: FramePolicy,
}

impl RecorderConfig {
    /// Builds a config from a codec identifier such as `"mp4v"`.
    pub fn new(
        output_path: impl Into<PathBuf>,
        resolution: Resolution,
        codec: &str,
        fps: f64,
    ) -> RecordResult<Self> {
        let codec = codec.parse::<Codec>()?;
        let output_path = output_path.into();
        let extension = match output_path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("avi") => Container::Avi,
            _ => Container::Mp4,
        };
        let config = Self {
            output_path,
            resolution,
            codec,
            fps,
            extension,
            frame_policy: FramePolicy::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_frame_policy(mut self, policy: FramePolicy) -> Self {
        self.frame_policy = policy;
        self
    }

    pub fn validate(&self) -> RecordResult<()> {
        validate_fps(self.fps)?;
        let Resolution { width, height } = self.resolution;
        if width == 0 || height == 0 {
            return Err(RecordError::InvalidConfig("resolution has zero dimension".into()));
        }
        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(RecordError::InvalidConfig(format!(
                "resolution {} exceeds {}px",
                self.resolution, MAX_DIMENSION
            )));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(RecordError::InvalidConfig("output path is empty".into()));
        }
        Ok(())
    }
}

pub(crate) fn validate_fps(fps: f64) -> RecordResult<()> {
    if !fps.is_finite() || fps <= 0.0 || fps > MAX_FPS {
        return Err(RecordError::InvalidConfig(format!(
            "frame rate must be within (0, {}], got {}",
            MAX_FPS, fps
        )));
    }
    Ok(())
}

use image::imageops::{self, FilterType};
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::capture::{to_rgb_frame, Capture};

use super::{
    validate_fps, Container, Encoder, EncoderParams, FramePolicy, FrameSink, RecordError,
    RecordResult, RecorderConfig,
};

/// What a finished session produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub path: PathBuf,
    pub frames_written: u64,
    pub fps: f64,
    pub duration: Duration,
}

struct RecordingSession {
    sink: Box<dyn FrameSink>,
    params: EncoderParams,
    started_at: Instant,
}

/// Grabs screen frames and feeds them to one encoder sink per session.
pub struct ScreenRecorder {
    config: RecorderConfig,
    capture: Box<dyn Capture>,
    encoder: Box<dyn Encoder>,
    session: Option<RecordingSession>,
}

impl ScreenRecorder {
    pub fn new(
        config: RecorderConfig,
        capture: Box<dyn Capture>,
        encoder: Box<dyn Encoder>,
    ) -> RecordResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            capture,
            encoder,
            session: None,
        })
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    /// Parameters the active session's encoder was opened with.
    pub fn session_params(&self) -> Option<&EncoderParams> {
        self.session.as_ref().map(|s| &s.params)
    }

    /// Applies to the next `start()`; an open encoder keeps its rate.
    pub fn set_frame_rate(&mut self, fps: f64) -> RecordResult<()> {
        validate_fps(fps)?;
        self.config.fps = fps;
        Ok(())
    }

    /// Remembers the container for the next generated filename. The current
    /// output path is left as is.
    pub fn set_extension(&mut self, extension: Container) {
        self.config.extension = extension;
    }

    pub fn set_output_path(&mut self, path: impl AsRef<Path>) -> RecordResult<()> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(RecordError::InvalidConfig("output path is empty".into()));
        }
        self.config.output_path = path.to_path_buf();
        Ok(())
    }

    pub fn start(&mut self) -> RecordResult<()> {
        if self.session.is_some() {
            return Err(RecordError::AlreadyRecording);
        }

        let params = EncoderParams {
            path: self.config.output_path.clone(),
            codec: self.config.codec,
            fps: self.config.fps,
            resolution: self.config.resolution,
        };
        let sink = self.encoder.open(&params)?;

        tracing::info!(
            "Recording started: {:?} ({} @ {} fps, {})",
            params.path,
            params.codec,
            params.fps,
            params.resolution
        );

        self.session = Some(RecordingSession {
            sink,
            params,
            started_at: Instant::now(),
        });
        Ok(())
    }

    /// Grabs the current screen as an RGB frame sized for the encoder.
    pub fn capture_frame(&self) -> RecordResult<RgbImage> {
        let raw = self.capture.capture().map_err(RecordError::Capture)?;
        let frame = to_rgb_frame(&raw);
        self.fit_frame(frame)
    }

    fn fit_frame(&self, frame: RgbImage) -> RecordResult<RgbImage> {
        let target = self.config.resolution;
        if frame.dimensions() == (target.width, target.height) {
            return Ok(frame);
        }
        match self.config.frame_policy {
            FramePolicy::Scale => Ok(imageops::resize(
                &frame,
                target.width,
                target.height,
                FilterType::Triangle,
            )),
            FramePolicy::Reject => Err(RecordError::FrameSizeMismatch {
                width: target.width,
                height: target.height,
                actual_width: frame.width(),
                actual_height: frame.height(),
            }),
        }
    }

    pub fn write_frame(&mut self, frame: &RgbImage) -> RecordResult<()> {
        let session = self.session.as_mut().ok_or(RecordError::NotRecording)?;
        session.sink.write(frame)
    }

    #[cfg(test)]
    pub fn record_frame(&mut self) -> RecordResult<RgbImage> {
        if self.session.is_none() {
            return Err(RecordError::NotRecording);
        }
        let frame = self.capture_frame()?;
        self.write_frame(&frame)?;
        Ok(frame)
    }

    /// Flushes and releases the encoder. A no-op returning `None` when idle.
    pub fn stop(&mut self) -> RecordResult<Option<SessionSummary>> {
        let Some(session) = self.session.take() else {
            return Ok(None);
        };

        let summary = SessionSummary {
            path: session.params.path.clone(),
            frames_written: session.sink.frames_written(),
            fps: session.params.fps,
            duration: session.started_at.elapsed(),
        };
        session.sink.finish()?;

        tracing::info!(
            "Recording stopped: {:?}, {} frames in {:.1}s",
            summary.path,
            summary.frames_written,
            summary.duration.as_secs_f64()
        );
        Ok(Some(summary))
    }
}

impl Drop for ScreenRecorder {
    fn drop(&mut self) {
        if !self.is_recording() {
            return;
        }
        if let Err(e) = self.stop() {
            tracing::warn!("Failed to finalize recording on drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::testing::{FakeCapture, FakeEncoder};
    use crate::recording::{Codec, Resolution};

    fn recorder_at(path: &Path, fps: f64) -> (ScreenRecorder, FakeEncoder) {
        let config = RecorderConfig::new(path, Resolution::new(64, 36), "mp4v", fps).unwrap();
        let encoder = FakeEncoder::new();
        let recorder = ScreenRecorder::new(
            config,
            Box::new(FakeCapture::new(64, 36)),
            Box::new(encoder.clone()),
        )
        .unwrap();
        (recorder, encoder)
    }

    #[test]
    fn test_five_frames_then_stop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");
        let (mut recorder, encoder) = recorder_at(&path, 30.0);

        recorder.start().unwrap();
        for _ in 0..5 {
            recorder.record_frame().unwrap();
        }
        let summary = recorder.stop().unwrap().unwrap();

        assert!(path.exists());
        assert_eq!(encoder.writes(), 5);
        assert_eq!(encoder.releases(), 1);
        assert_eq!(summary.frames_written, 5);
        assert_eq!(summary.path, path);
        assert_eq!(encoder.opened()[0].codec, Codec::Mp4v);
    }

    #[test]
    fn test_unsupported_codec_creates_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");
        let result = RecorderConfig::new(&path, Resolution::default(), "zzz", 30.0);

        assert!(matches!(result, Err(RecordError::UnsupportedCodec(_))));
        assert!(!path.exists());
    }

    #[test]
    fn test_frame_rate_applies_to_next_session() {
        let dir = tempfile::tempdir().unwrap();
        let (mut recorder, encoder) = recorder_at(&dir.path().join("a.mp4"), 30.0);

        recorder.set_frame_rate(15.0).unwrap();
        recorder.start().unwrap();
        assert_eq!(encoder.opened()[0].fps, 15.0);

        recorder.set_frame_rate(60.0).unwrap();
        assert_eq!(recorder.session_params().unwrap().fps, 15.0);
        assert_eq!(encoder.opened().len(), 1);

        recorder.stop().unwrap();
        recorder.start().unwrap();
        assert_eq!(encoder.opened()[1].fps, 60.0);
    }

    #[test]
    fn test_invalid_frame_rate_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (mut recorder, _) = recorder_at(&dir.path().join("a.mp4"), 30.0);
        assert!(recorder.set_frame_rate(0.0).is_err());
        assert_eq!(recorder.config().fps, 30.0);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let (mut recorder, encoder) = recorder_at(&dir.path().join("a.mp4"), 30.0);

        assert!(recorder.stop().unwrap().is_none());
        recorder.start().unwrap();
        assert!(recorder.stop().unwrap().is_some());
        assert!(recorder.stop().unwrap().is_none());
        assert!(recorder.stop().unwrap().is_none());

        assert_eq!(encoder.releases(), 1);
        assert!(!recorder.is_recording());
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (mut recorder, encoder) = recorder_at(&dir.path().join("a.mp4"), 30.0);

        recorder.start().unwrap();
        assert!(matches!(recorder.start(), Err(RecordError::AlreadyRecording)));
        assert_eq!(encoder.opened().len(), 1);
        assert!(recorder.is_recording());
        assert_eq!(encoder.releases(), 0);
    }

    #[test]
    fn test_write_without_session_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (mut recorder, encoder) = recorder_at(&dir.path().join("a.mp4"), 30.0);

        let frame = recorder.capture_frame().unwrap();
        assert!(matches!(recorder.write_frame(&frame), Err(RecordError::NotRecording)));
        assert!(matches!(recorder.record_frame(), Err(RecordError::NotRecording)));
        assert_eq!(encoder.writes(), 0);
    }

    #[test]
    fn test_mismatched_frames_are_scaled() {
        let dir = tempfile::tempdir().unwrap();
        let config =
            RecorderConfig::new(dir.path().join("a.mp4"), Resolution::new(32, 18), "h264", 30.0)
                .unwrap();
        let recorder = ScreenRecorder::new(
            config,
            Box::new(FakeCapture::new(100, 40)),
            Box::new(FakeEncoder::new()),
        )
        .unwrap();

        assert_eq!(recorder.capture_frame().unwrap().dimensions(), (32, 18));
    }

    #[test]
    fn test_mismatched_frames_can_be_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config =
            RecorderConfig::new(dir.path().join("a.mp4"), Resolution::new(32, 18), "h264", 30.0)
                .unwrap()
                .with_frame_policy(FramePolicy::Reject);
        let recorder = ScreenRecorder::new(
            config,
            Box::new(FakeCapture::new(100, 40)),
            Box::new(FakeEncoder::new()),
        )
        .unwrap();

        let err = recorder.capture_frame().unwrap_err();
        assert!(matches!(
            err,
            RecordError::FrameSizeMismatch {
                actual_width: 100,
                actual_height: 40,
                ..
            }
        ));
    }

    #[test]
    fn test_capture_errors_are_wrapped() {
        let dir = tempfile::tempdir().unwrap();
        let config =
            RecorderConfig::new(dir.path().join("a.mp4"), Resolution::new(8, 8), "vp9", 30.0)
                .unwrap();
        let recorder = ScreenRecorder::new(
            config,
            Box::new(FakeCapture::failing()),
            Box::new(FakeEncoder::new()),
        )
        .unwrap();

        assert!(matches!(recorder.capture_frame(), Err(RecordError::Capture(_))));
    }

    #[test]
    fn test_extension_does_not_touch_active_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.mp4");
        let (mut recorder, _) = recorder_at(&path, 30.0);

        recorder.start().unwrap();
        recorder.set_extension(Container::Avi);
        assert_eq!(recorder.config().extension, Container::Avi);
        assert_eq!(recorder.session_params().unwrap().path, path);
        assert_eq!(recorder.config().output_path, path);
    }

    #[test]
    fn test_drop_releases_open_session() {
        let dir = tempfile::tempdir().unwrap();
        let (mut recorder, encoder) = recorder_at(&dir.path().join("a.mp4"), 30.0);

        recorder.start().unwrap();
        drop(recorder);
        assert_eq!(encoder.releases(), 1);
    }
}

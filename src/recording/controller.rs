use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::{PreviewSurface, RecordError, RecordResult, RecordingState, ScreenRecorder, SessionSummary};

const MIN_FRAME_INTERVAL_MS: u64 = 5;

pub type SessionOutcome = RecordResult<SessionSummary>;

struct SessionHandle {
    stop: Arc<AtomicBool>,
    quit: Arc<AtomicBool>,
    /// `None` only if the recorder never reached the worker.
    worker: JoinHandle<Option<(ScreenRecorder, SessionOutcome)>>,
}

/// Drives one recording worker at a time.
///
/// The recorder lives here while idle and moves into the worker thread for
/// the length of a session. Stopping only raises a flag; the worker notices
/// it at the top of its next iteration, finalizes the encoder, and hands the
/// recorder back through `poll` or `wait`.
pub struct Controller {
    recorder: Option<ScreenRecorder>,
    session: Option<SessionHandle>,
}

impl Controller {
    pub fn new(recorder: ScreenRecorder) -> Self {
        Self {
            recorder: Some(recorder),
            session: None,
        }
    }

    pub fn state(&self) -> RecordingState {
        match self.session {
            Some(ref s) if !s.stop.load(Ordering::SeqCst) => RecordingState::Recording,
            _ => RecordingState::Idle,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.state() == RecordingState::Recording
    }

    /// A stop was requested but the worker has not been collected yet.
    pub fn is_finishing(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.stop.load(Ordering::SeqCst))
    }

    #[cfg(test)]
    pub fn recorder(&self) -> Option<&ScreenRecorder> {
        self.recorder.as_ref()
    }

    /// The idle recorder; `None` while a session owns it.
    pub fn recorder_mut(&mut self) -> Option<&mut ScreenRecorder> {
        self.recorder.as_mut()
    }

    pub fn start(&mut self, preview: Option<PreviewSurface>) -> RecordResult<()> {
        let builder = thread::Builder::new().name("screenrec-worker".to_string());
        self.start_with(builder, preview)
    }

    fn start_with(
        &mut self,
        builder: thread::Builder,
        preview: Option<PreviewSurface>,
    ) -> RecordResult<()> {
        if self.session.is_some() {
            return Err(RecordError::AlreadyRecording);
        }
        let mut recorder = self
            .recorder
            .take()
            .ok_or_else(|| RecordError::InvalidConfig("no recorder available".to_string()))?;

        if let Err(e) = recorder.start() {
            self.recorder = Some(recorder);
            return Err(e);
        }

        let stop = Arc::new(AtomicBool::new(false));
        let quit = Arc::new(AtomicBool::new(false));
        let worker_stop = Arc::clone(&stop);
        let worker_quit = Arc::clone(&quit);

        // The recorder is handed over only once the thread exists, so a failed
        // spawn leaves it with the controller.
        let (handoff, inbox) = mpsc::channel::<ScreenRecorder>();
        let spawned = builder.spawn(move || {
            let recorder = inbox.recv().ok()?;
            Some(run_session(recorder, worker_stop, worker_quit, preview))
        });
        let worker = match spawned {
            Ok(worker) => worker,
            Err(e) => {
                tracing::error!("Failed to spawn recording worker: {}", e);
                self.restore(recorder);
                return Err(e.into());
            }
        };
        if let Err(mpsc::SendError(recorder)) = handoff.send(recorder) {
            self.restore(recorder);
            let _ = worker.join();
            return Err(RecordError::WorkerPanicked);
        }

        self.session = Some(SessionHandle { stop, quit, worker });
        Ok(())
    }

    fn restore(&mut self, mut recorder: ScreenRecorder) {
        if let Err(e) = recorder.stop() {
            tracing::warn!("Failed to release encoder after aborted start: {}", e);
        }
        self.recorder = Some(recorder);
    }

    /// Signals the worker to stop. Returns `false` when nothing was recording.
    pub fn stop(&mut self) -> bool {
        match self.session {
            Some(ref s) => !s.stop.swap(true, Ordering::SeqCst),
            None => false,
        }
    }

    /// Raises the quit sentinel; the worker observes it after its next frame.
    pub fn request_quit(&self) {
        if let Some(ref s) = self.session {
            s.quit.store(true, Ordering::SeqCst);
        }
    }

    /// Collects a finished worker without blocking.
    pub fn poll(&mut self) -> Option<SessionOutcome> {
        if !self.session.as_ref()?.worker.is_finished() {
            return None;
        }
        self.collect()
    }

    /// Blocks until the worker exits. Does not signal it to stop.
    pub fn wait(&mut self) -> Option<SessionOutcome> {
        self.collect()
    }

    fn collect(&mut self) -> Option<SessionOutcome> {
        let session = self.session.take()?;
        match session.worker.join() {
            Ok(Some((recorder, outcome))) => {
                self.recorder = Some(recorder);
                Some(outcome)
            }
            Ok(None) | Err(_) => {
                tracing::error!("Recording worker panicked");
                Some(Err(RecordError::WorkerPanicked))
            }
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        if self.stop() {
            tracing::info!("Stopping recording on shutdown");
        }
        if let Some(Err(e)) = self.wait() {
            tracing::warn!("Recording ended with error on shutdown: {}", e);
        }
    }
}

fn run_session(
    mut recorder: ScreenRecorder,
    stop: Arc<AtomicBool>,
    quit: Arc<AtomicBool>,
    preview: Option<PreviewSurface>,
) -> (ScreenRecorder, SessionOutcome) {
    let fps = recorder
        .session_params()
        .map(|p| p.fps)
        .unwrap_or(recorder.config().fps);
    let frame_interval =
        Duration::from_secs_f64(1.0 / fps).max(Duration::from_millis(MIN_FRAME_INTERVAL_MS));

    let loop_result = capture_loop(&mut recorder, &stop, &quit, preview.as_ref(), frame_interval);

    if let Some(ref p) = preview {
        p.close();
    }
    stop.store(true, Ordering::SeqCst);
    let stop_result = recorder.stop();

    let outcome = match (loop_result, stop_result) {
        (Err(e), stop_result) => {
            tracing::error!("Recording aborted: {}", e);
            if let Err(stop_err) = stop_result {
                tracing::warn!("Failed to finalize aborted recording: {}", stop_err);
            }
            Err(e)
        }
        (Ok(()), Ok(Some(summary))) => Ok(summary),
        (Ok(()), Ok(None)) => Err(RecordError::NotRecording),
        (Ok(()), Err(e)) => Err(e),
    };
    (recorder, outcome)
}

fn capture_loop(
    recorder: &mut ScreenRecorder,
    stop: &AtomicBool,
    quit: &AtomicBool,
    preview: Option<&PreviewSurface>,
    frame_interval: Duration,
) -> RecordResult<()> {
    while !stop.load(Ordering::SeqCst) {
        let frame_start = Instant::now();

        let frame = recorder.capture_frame()?;
        if let Some(p) = preview {
            p.show(&frame);
        }
        recorder.write_frame(&frame)?;

        if quit.swap(false, Ordering::SeqCst) {
            tracing::info!("Quit key pressed, stopping recording");
            break;
        }

        let elapsed = frame_start.elapsed();
        if elapsed < frame_interval {
            thread::sleep(frame_interval - elapsed);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::testing::{FakeCapture, FakeEncoder};
    use crate::recording::{RecorderConfig, Resolution};
    use std::path::Path;

    fn controller_with(path: &Path, capture: FakeCapture, encoder: &FakeEncoder) -> Controller {
        let config = RecorderConfig::new(path, Resolution::new(16, 9), "mp4v", 200.0).unwrap();
        let recorder =
            ScreenRecorder::new(config, Box::new(capture), Box::new(encoder.clone())).unwrap();
        Controller::new(recorder)
    }

    fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "timed out waiting for worker");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_start_stop_round() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");
        let encoder = FakeEncoder::new();
        let mut controller = controller_with(&path, FakeCapture::new(16, 9), &encoder);

        controller.start(None).unwrap();
        assert_eq!(controller.state(), RecordingState::Recording);
        assert!(controller.recorder().is_none());

        wait_until(|| encoder.writes() >= 3);
        assert!(controller.stop());
        assert_eq!(controller.state(), RecordingState::Idle);

        let summary = controller.wait().unwrap().unwrap();
        assert!(summary.frames_written >= 3);
        assert_eq!(summary.frames_written, encoder.writes());
        assert_eq!(encoder.releases(), 1);
        assert!(path.exists());
        assert!(!controller.is_finishing());
        assert!(!controller.recorder().unwrap().is_recording());
    }

    #[test]
    fn test_second_start_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = FakeEncoder::new();
        let mut controller =
            controller_with(&dir.path().join("a.mp4"), FakeCapture::new(16, 9), &encoder);

        controller.start(None).unwrap();
        assert!(matches!(controller.start(None), Err(RecordError::AlreadyRecording)));
        controller.stop();
        controller.wait().unwrap().unwrap();
        assert_eq!(encoder.opened().len(), 1);
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = FakeEncoder::new();
        let mut controller =
            controller_with(&dir.path().join("a.mp4"), FakeCapture::new(16, 9), &encoder);

        assert!(!controller.stop());
        assert!(controller.poll().is_none());
        assert!(controller.wait().is_none());
        assert_eq!(encoder.releases(), 0);
    }

    #[test]
    fn test_stop_twice_signals_once() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = FakeEncoder::new();
        let mut controller =
            controller_with(&dir.path().join("a.mp4"), FakeCapture::new(16, 9), &encoder);

        controller.start(None).unwrap();
        assert!(controller.stop());
        assert!(!controller.stop());
        controller.wait().unwrap().unwrap();
        assert!(!controller.stop());
        assert_eq!(encoder.releases(), 1);
    }

    #[test]
    fn test_quit_sentinel_ends_session() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = FakeEncoder::new();
        let mut controller =
            controller_with(&dir.path().join("a.mp4"), FakeCapture::new(16, 9), &encoder);

        controller.start(None).unwrap();
        wait_until(|| encoder.writes() >= 1);
        controller.request_quit();

        wait_until(|| encoder.releases() == 1);
        let outcome = loop {
            if let Some(outcome) = controller.poll() {
                break outcome;
            }
            thread::sleep(Duration::from_millis(2));
        };
        assert!(outcome.is_ok());
        assert_eq!(controller.state(), RecordingState::Idle);
        assert!(controller.recorder().is_some());
    }

    #[test]
    fn test_capture_failure_releases_encoder() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = FakeEncoder::new();
        let preview = PreviewSurface::new();
        let mut controller = controller_with(
            &dir.path().join("a.mp4"),
            FakeCapture::failing_after(2),
            &encoder,
        );

        controller.start(Some(preview.clone())).unwrap();
        let outcome = controller.wait().unwrap();

        assert!(matches!(outcome, Err(RecordError::Capture(_))));
        assert_eq!(encoder.writes(), 2);
        assert_eq!(encoder.releases(), 1);
        assert!(!preview.is_open());
        assert_eq!(controller.state(), RecordingState::Idle);
        assert!(controller.recorder().is_some());
    }

    #[test]
    fn test_write_failure_ends_session() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = FakeEncoder::failing_writes();
        let mut controller =
            controller_with(&dir.path().join("a.mp4"), FakeCapture::new(16, 9), &encoder);

        controller.start(None).unwrap();
        let outcome = controller.wait().unwrap();

        assert!(matches!(outcome, Err(RecordError::Encoder(_))));
        assert_eq!(encoder.releases(), 1);
    }

    #[test]
    fn test_preview_receives_frames() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = FakeEncoder::new();
        let preview = PreviewSurface::new();
        let mut controller =
            controller_with(&dir.path().join("a.mp4"), FakeCapture::new(16, 9), &encoder);

        controller.start(Some(preview.clone())).unwrap();
        wait_until(|| preview.is_open());
        let mut seen = None;
        wait_until(|| {
            seen = preview.take_latest();
            seen.is_some()
        });
        let frame = seen.unwrap();
        assert_eq!((frame.width, frame.height), (16, 9));

        controller.stop();
        controller.wait().unwrap().unwrap();
        assert!(!preview.is_open());
    }

    #[test]
    fn test_recorder_changes_apply_between_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = FakeEncoder::new();
        let mut controller =
            controller_with(&dir.path().join("a.mp4"), FakeCapture::new(16, 9), &encoder);

        controller.start(None).unwrap();
        assert!(controller.recorder_mut().is_none());
        controller.stop();
        controller.wait().unwrap().unwrap();

        let recorder = controller.recorder_mut().unwrap();
        recorder.set_frame_rate(150.0).unwrap();
        recorder.set_output_path(dir.path().join("b.mp4")).unwrap();
        controller.start(None).unwrap();
        controller.stop();
        controller.wait().unwrap().unwrap();

        let opened = encoder.opened();
        assert_eq!(opened.len(), 2);
        assert_eq!(opened[0].fps, 200.0);
        assert_eq!(opened[1].fps, 150.0);
        assert_eq!(opened[1].path, dir.path().join("b.mp4"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_failed_spawn_keeps_recorder() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = FakeEncoder::new();
        let mut controller =
            controller_with(&dir.path().join("a.mp4"), FakeCapture::new(16, 9), &encoder);

        let unspawnable = thread::Builder::new().stack_size(isize::MAX as usize);
        assert!(matches!(
            controller.start_with(unspawnable, None),
            Err(RecordError::Io(_))
        ));
        assert_eq!(controller.state(), RecordingState::Idle);
        assert_eq!(encoder.releases(), 1);
        assert!(!controller.recorder().unwrap().is_recording());

        controller.start(None).unwrap();
        controller.stop();
        controller.wait().unwrap().unwrap();
        assert_eq!(encoder.opened().len(), 2);
        assert_eq!(encoder.releases(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_encoder_exit_reason_reaches_outcome() {
        use crate::recording::FfmpegEncoder;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let program = dir.path().join("fake-ffmpeg");
        std::fs::write(&program, "#!/bin/sh\necho \"Unknown encoder 'libxvid'\" >&2\nexit 1\n")
            .unwrap();
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();

        let config =
            RecorderConfig::new(dir.path().join("a.avi"), Resolution::new(16, 9), "xvid", 200.0)
                .unwrap();
        let recorder = ScreenRecorder::new(
            config,
            Box::new(FakeCapture::new(16, 9)),
            Box::new(FfmpegEncoder::with_program(program)),
        )
        .unwrap();
        let mut controller = Controller::new(recorder);

        controller.start(None).unwrap();
        let err = controller.wait().unwrap().unwrap_err();

        let message = err.to_string();
        assert!(message.contains("Unknown encoder 'libxvid'"), "{}", message);
        assert_eq!(controller.state(), RecordingState::Idle);
        assert!(controller.recorder().is_some());
    }

    #[test]
    fn test_failed_start_keeps_recorder() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = FakeEncoder::new();
        let mut controller = controller_with(
            &dir.path().join("missing").join("a.mp4"),
            FakeCapture::new(16, 9),
            &encoder,
        );

        assert!(matches!(controller.start(None), Err(RecordError::Io(_))));
        assert_eq!(controller.state(), RecordingState::Idle);
        assert!(controller.recorder().is_some());
    }
}

pub mod style;
pub mod views;

use iced::keyboard::{self, Key, Modifiers};
use iced::widget::image;
use iced::{Element, Subscription, Task, Theme};
use std::path::PathBuf;
use std::time::Duration;

use crate::capture::ScreenCapture;
use crate::config::Config;
use crate::hotkeys::{format_hotkey_string, HotkeyAction, HotkeyManager};
use crate::notify::notify_if;
use crate::recording::{
    Container, Controller, FfmpegEncoder, FrameRate, PreviewSurface, RecordError, RecordingState,
    ScreenRecorder, SessionOutcome,
};

use self::style::MonochromeTheme;

const TICK_INTERVAL_MS: u64 = 50;

#[derive(Debug, Clone)]
pub enum Message {
    StartRecording,
    StopRecording,
    FpsSelected(FrameRate),
    ExtensionSelected(Container),
    PreviewToggled(bool),
    BrowseOutputDir,
    OutputDirChosen(Option<PathBuf>),
    QuitKeyPressed,
    Tick,
}

pub struct App {
    config: Config,
    theme: MonochromeTheme,
    controller: Option<Controller>,
    preview: PreviewSurface,
    preview_handle: Option<image::Handle>,
    hotkey_manager: Option<HotkeyManager>,
    status: String,
}

impl App {
    pub fn new() -> (Self, Task<Message>) {
        let config = prepare_config(Config::load());
        let theme = match config.ui.theme {
            crate::config::Theme::Dark => MonochromeTheme::dark(),
            crate::config::Theme::Light => MonochromeTheme::light(),
        };

        let hotkey_manager = match HotkeyManager::new() {
            Ok(mut hm) => {
                if let Err(e) = hm.register(HotkeyAction::ToggleRecording, &config.hotkeys.toggle_recording) {
                    tracing::warn!("{}", e);
                    notify_if(config.ui.show_notifications, "Hotkey Error", &e.to_string());
                }
                Some(hm)
            }
            Err(e) => {
                tracing::warn!("Global hotkeys unavailable: {}", e);
                None
            }
        };

        let (controller, status) = match build_controller(&config) {
            Ok(controller) => (Some(controller), String::from("Ready")),
            Err(e) => {
                tracing::error!("Recorder setup failed: {}", e);
                (None, format!("Recorder unavailable: {}", e))
            }
        };

        let app = Self {
            config,
            theme,
            controller,
            preview: PreviewSurface::new(),
            preview_handle: None,
            hotkey_manager,
            status,
        };

        (app, Task::none())
    }

    pub fn title(&self) -> String {
        match self.recording_state() {
            RecordingState::Idle => String::from("screenrec"),
            RecordingState::Recording => String::from("screenrec - Recording"),
        }
    }

    pub fn theme(&self) -> Theme {
        if self.theme.is_dark {
            Theme::Dark
        } else {
            Theme::Light
        }
    }

    fn recording_state(&self) -> RecordingState {
        self.controller
            .as_ref()
            .map(Controller::state)
            .unwrap_or(RecordingState::Idle)
    }

    fn is_finishing(&self) -> bool {
        self.controller.as_ref().is_some_and(Controller::is_finishing)
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::StartRecording => self.start_recording(),
            Message::StopRecording => self.stop_recording(),
            Message::FpsSelected(rate) => {
                self.config.recording.fps = rate;
                if let Some(recorder) = self.controller.as_mut().and_then(Controller::recorder_mut) {
                    if let Err(e) = recorder.set_frame_rate(rate.value()) {
                        self.status = e.to_string();
                    }
                }
                self.save_config();
            }
            Message::ExtensionSelected(extension) => {
                self.config.output.extension = extension;
                if let Some(recorder) = self.controller.as_mut().and_then(Controller::recorder_mut) {
                    recorder.set_extension(extension);
                }
                self.save_config();
            }
            Message::PreviewToggled(show) => {
                self.config.recording.show_preview = show;
                self.save_config();
            }
            Message::BrowseOutputDir => {
                let current = self.config.output.directory.clone();
                return Task::perform(
                    async move {
                        rfd::AsyncFileDialog::new()
                            .set_directory(&current)
                            .pick_folder()
                            .await
                            .map(|h| h.path().to_path_buf())
                    },
                    Message::OutputDirChosen,
                );
            }
            Message::OutputDirChosen(Some(dir)) => {
                let previous = std::mem::replace(&mut self.config.output.directory, dir);
                match self.config.ensure_output_dir() {
                    Ok(()) => self.save_config(),
                    Err(e) => {
                        self.config.output.directory = previous;
                        self.status = format!("Output directory rejected: {}", e);
                    }
                }
            }
            Message::OutputDirChosen(None) => {}
            Message::QuitKeyPressed => {
                if let Some(ref controller) = self.controller {
                    controller.request_quit();
                }
            }
            Message::Tick => self.tick(),
        }
        Task::none()
    }

    fn tick(&mut self) {
        if let Some(ref hm) = self.hotkey_manager {
            if let Some(HotkeyAction::ToggleRecording) = hm.poll() {
                let recording = self.controller.as_ref().is_some_and(Controller::is_recording);
                if recording {
                    self.stop_recording();
                } else {
                    self.start_recording();
                }
            }
        }

        if let Some(frame) = self.preview.take_latest() {
            self.preview_handle = Some(image::Handle::from_rgba(frame.width, frame.height, frame.rgba));
        }

        let outcome = self.controller.as_mut().and_then(Controller::poll);
        if let Some(outcome) = outcome {
            self.finish_session(outcome);
        }
    }

    fn start_recording(&mut self) {
        if self.controller.is_none() {
            match build_controller(&self.config) {
                Ok(controller) => self.controller = Some(controller),
                Err(e) => {
                    self.status = format!("Recorder unavailable: {}", e);
                    return;
                }
            }
        }
        if let Err(e) = self.config.ensure_output_dir() {
            self.status = format!("Output directory unavailable: {}", e);
            return;
        }

        let extension = self.config.output.extension;
        let path = self.config.output_path(extension);
        let fps = self.config.recording.fps.value();
        let preview = self.config.recording.show_preview.then(|| self.preview.clone());

        let Some(controller) = self.controller.as_mut() else {
            return;
        };
        if let Some(recorder) = controller.recorder_mut() {
            recorder.set_extension(extension);
            if let Err(e) = recorder
                .set_output_path(&path)
                .and_then(|()| recorder.set_frame_rate(fps))
            {
                self.status = e.to_string();
                return;
            }
        }

        match controller.start(preview) {
            Ok(()) => {
                self.status = format!("Recording to {}", path.display());
            }
            Err(RecordError::AlreadyRecording) => {}
            Err(e) => {
                tracing::error!("Failed to start recording: {}", e);
                self.status = format!("Failed to start: {}", e);
                notify_if(self.config.ui.show_notifications, "Recording Failed", &e.to_string());
            }
        }
    }

    fn stop_recording(&mut self) {
        if let Some(ref mut controller) = self.controller {
            if controller.stop() {
                self.status = String::from("Finishing...");
            }
        }
    }

    fn finish_session(&mut self, outcome: SessionOutcome) {
        self.preview_handle = None;
        let notify = self.config.ui.show_notifications;
        match outcome {
            Ok(summary) => {
                let path = summary.path.display().to_string();
                self.status = format!(
                    "Saved {} frames ({:.1}s at {} fps) to {}",
                    summary.frames_written,
                    summary.duration.as_secs_f64(),
                    summary.fps,
                    path
                );
                notify_if(notify, "Recording Saved", &path);
            }
            Err(e) => {
                self.status = format!("Recording failed: {}", e);
                notify_if(notify, "Recording Failed", &e.to_string());
                if matches!(e, RecordError::WorkerPanicked) {
                    self.controller = None;
                }
            }
        }
    }

    fn save_config(&mut self) {
        if let Err(e) = self.config.save() {
            tracing::warn!("Failed to save config: {}", e);
        }
    }

    pub fn view(&self) -> Element<'_, Message> {
        let recording_state = self.recording_state();
        let preview = if self.preview.is_open() {
            self.preview_handle.as_ref()
        } else {
            None
        };

        views::MainView::view(
            &self.theme,
            views::MainViewModel {
                recording_state,
                finishing: self.is_finishing(),
                fps: self.config.recording.fps,
                extension: self.config.output.extension,
                show_preview: self.config.recording.show_preview,
                output_dir: self.config.output.directory.display().to_string(),
                hotkey: format_hotkey_string(&self.config.hotkeys.toggle_recording),
                status: &self.status,
                preview,
            },
        )
    }

    pub fn subscription(&self) -> Subscription<Message> {
        Subscription::batch([
            iced::time::every(Duration::from_millis(TICK_INTERVAL_MS)).map(|_| Message::Tick),
            keyboard::on_key_press(quit_key),
        ])
    }
}

fn quit_key(key: Key, modifiers: Modifiers) -> Option<Message> {
    if !modifiers.is_empty() {
        return None;
    }
    match key.as_ref() {
        Key::Character("q") | Key::Character("Q") => Some(Message::QuitKeyPressed),
        _ => None,
    }
}

/// Falls back to defaults on a bad config file and creates the output directory.
fn prepare_config(loaded: anyhow::Result<Config>) -> Config {
    let config = loaded.unwrap_or_else(|e| {
        tracing::warn!("Failed to load config, using defaults: {}", e);
        Config::default()
    });
    if let Err(e) = config.ensure_output_dir() {
        tracing::warn!("Output directory unavailable: {}", e);
    }
    config
}

fn build_controller(config: &Config) -> anyhow::Result<Controller> {
    let capture = ScreenCapture::preferred(config.recording.monitor);
    match capture.monitor_info() {
        Ok(info) => tracing::info!(
            "Capturing monitor {} ({}x{}{})",
            info.name,
            info.width,
            info.height,
            if info.is_primary { ", primary" } else { "" }
        ),
        Err(e) => tracing::warn!("No monitor available yet: {}", e),
    }

    let encoder = match config.recording.ffmpeg_path {
        Some(ref program) => FfmpegEncoder::with_program(program),
        None => FfmpegEncoder::new(),
    };
    let recorder =
        ScreenRecorder::new(config.recorder_config()?, Box::new(capture), Box::new(encoder))?;
    Ok(Controller::new(recorder))
}

use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};
use std::sync::{Arc, Mutex};

pub const PREVIEW_WIDTH: u32 = 480;
pub const PREVIEW_HEIGHT: u32 = 270;

#[derive(Debug, Clone)]
pub struct PreviewFrame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

#[derive(Debug, Default)]
struct PreviewState {
    latest: Option<PreviewFrame>,
    open: bool,
}

/// Single-slot live preview shared between the recording worker and the UI.
///
/// The worker overwrites the slot each frame; the UI takes whatever is newest
/// on its next tick, so a slow UI never holds up recording.
#[derive(Debug, Clone, Default)]
pub struct PreviewSurface {
    state: Arc<Mutex<PreviewState>>,
}

impl PreviewSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&self, frame: &RgbImage) {
        let (width, height) = fit_within(frame.width(), frame.height(), PREVIEW_WIDTH, PREVIEW_HEIGHT);
        let scaled = if (width, height) == frame.dimensions() {
            frame.clone()
        } else {
            imageops::resize(frame, width, height, FilterType::Triangle)
        };
        let rgba = DynamicImage::ImageRgb8(scaled).to_rgba8().into_raw();

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.open = true;
        state.latest = Some(PreviewFrame { width, height, rgba });
    }

    pub fn take_latest(&self) -> Option<PreviewFrame> {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).latest.take()
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).open
    }

    pub fn close(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.open = false;
        state.latest = None;
    }
}

fn fit_within(width: u32, height: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    if width <= max_w && height <= max_h {
        return (width.max(1), height.max(1));
    }
    let scale = (max_w as f64 / width as f64).min(max_h as f64 / height as f64);
    let w = ((width as f64) * scale).round() as u32;
    let h = ((height as f64) * scale).round() as u32;
    (w.max(1), h.max(1))
}

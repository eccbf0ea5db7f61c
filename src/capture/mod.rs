mod screen;

pub use screen::ScreenCapture;

use anyhow::Result;
use image::{RgbImage, RgbaImage};

pub trait Capture: Send {
    fn capture(&self) -> Result<RgbaImage>;
}

#[derive(Debug, Clone)]
pub struct MonitorInfo {
    pub id: u32,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub is_primary: bool,
}

pub fn list_monitors() -> Result<Vec<MonitorInfo>> {
    let screens = xcap::Monitor::all()?;
    let monitors: Vec<MonitorInfo> = screens
        .into_iter()
        .map(|s| MonitorInfo {
            id: s.id(),
            name: s.name().to_string(),
            width: s.width(),
            height: s.height(),
            is_primary: s.is_primary(),
        })
        .collect();
    Ok(monitors)
}

/// Drops the alpha channel, giving the packed `rgb24` layout encoders consume.
pub fn to_rgb_frame(image: &RgbaImage) -> RgbImage {
    let mut rgb = Vec::with_capacity((image.width() as usize) * (image.height() as usize) * 3);
    for chunk in image.as_raw().chunks_exact(4) {
        rgb.extend_from_slice(&chunk[..3]);
    }
    RgbImage::from_raw(image.width(), image.height(), rgb)
        .unwrap_or_else(|| RgbImage::new(image.width(), image.height()))
}

use anyhow::{anyhow, Result};
use image::RgbaImage;
use xcap::Monitor;

use super::{list_monitors, Capture, MonitorInfo};

const MAX_CAPTURE_DIMENSION: u32 = 16384;
const MAX_CAPTURE_PIXELS: u64 = 256 * 1024 * 1024;

/// Grabs whole-monitor screenshots, the primary monitor unless one is pinned.
pub struct ScreenCapture {
    monitor_id: Option<u32>,
}

impl ScreenCapture {
    pub fn new() -> Self {
        Self { monitor_id: None }
    }

    pub fn with_monitor(monitor_id: u32) -> Self {
        Self {
            monitor_id: Some(monitor_id),
        }
    }

    /// Pins the preferred monitor if it is connected, otherwise falls back to the primary.
    pub fn preferred(monitor_id: Option<u32>) -> Self {
        let Some(id) = monitor_id else {
            return Self::new();
        };
        match list_monitors() {
            Ok(monitors) if monitors.iter().any(|m| m.id == id) => Self::with_monitor(id),
            Ok(_) => {
                tracing::warn!("Monitor {} not connected, using primary", id);
                Self::new()
            }
            Err(e) => {
                tracing::warn!("Failed to enumerate monitors: {}", e);
                Self::new()
            }
        }
    }

    fn find_monitor(&self) -> Result<Monitor> {
        let monitors = Monitor::all()?;

        match self.monitor_id {
            Some(id) => monitors
                .into_iter()
                .find(|m| m.id() == id)
                .ok_or_else(|| anyhow!("Monitor {} not found", id)),
            None => {
                let mut monitors = monitors;
                if monitors.is_empty() {
                    return Err(anyhow!("No monitors found"));
                }
                let index = monitors.iter().position(|m| m.is_primary()).unwrap_or(0);
                Ok(monitors.swap_remove(index))
            }
        }
    }

    pub fn monitor_info(&self) -> Result<MonitorInfo> {
        let monitor = self.find_monitor()?;
        Ok(MonitorInfo {
            id: monitor.id(),
            name: monitor.name().to_string(),
            width: monitor.width(),
            height: monitor.height(),
            is_primary: monitor.is_primary(),
        })
    }
}

impl Default for ScreenCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl Capture for ScreenCapture {
    fn capture(&self) -> Result<RgbaImage> {
        let monitor = self.find_monitor()?;
        let img = monitor.capture_image()?;

        if img.width() > MAX_CAPTURE_DIMENSION || img.height() > MAX_CAPTURE_DIMENSION {
            return Err(anyhow!("Captured image dimensions exceed safety limit"));
        }
        let pixel_count = (img.width() as u64).saturating_mul(img.height() as u64);
        if pixel_count > MAX_CAPTURE_PIXELS {
            return Err(anyhow!("Captured image exceeds maximum pixel count"));
        }

        Ok(img)
    }
}

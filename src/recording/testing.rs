//! In-memory capture and encoder doubles for recorder and controller tests.

use anyhow::{anyhow, Result};
use image::{Rgba, RgbaImage, RgbImage};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::capture::Capture;

use super::{Encoder, EncoderParams, FrameSink, RecordError, RecordResult};

pub struct FakeCapture {
    width: u32,
    height: u32,
    fail_after: Option<u64>,
    calls: AtomicU64,
}

impl FakeCapture {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            fail_after: None,
            calls: AtomicU64::new(0),
        }
    }

    pub fn failing() -> Self {
        Self::failing_after(0)
    }

    pub fn failing_after(successes: u64) -> Self {
        Self {
            fail_after: Some(successes),
            ..Self::new(8, 8)
        }
    }
}

impl Capture for FakeCapture {
    fn capture(&self) -> Result<RgbaImage> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(limit) = self.fail_after {
            if call >= limit {
                return Err(anyhow!("display went away"));
            }
        }
        Ok(RgbaImage::from_pixel(self.width, self.height, Rgba([1, 2, 3, 255])))
    }
}

#[derive(Debug, Default)]
struct Stats {
    opened: Vec<EncoderParams>,
    writes: u64,
    releases: u64,
}

/// Records every call; each opened sink creates its output file.
#[derive(Clone, Default)]
pub struct FakeEncoder {
    stats: Arc<Mutex<Stats>>,
    fail_writes: bool,
}

impl FakeEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn opened(&self) -> Vec<EncoderParams> {
        self.stats.lock().unwrap().opened.clone()
    }

    pub fn writes(&self) -> u64 {
        self.stats.lock().unwrap().writes
    }

    pub fn releases(&self) -> u64 {
        self.stats.lock().unwrap().releases
    }
}

impl Encoder for FakeEncoder {
    fn open(&self, params: &EncoderParams) -> RecordResult<Box<dyn FrameSink>> {
        std::fs::File::create(&params.path)?;
        self.stats.lock().unwrap().opened.push(params.clone());
        Ok(Box::new(FakeSink {
            stats: Arc::clone(&self.stats),
            fail_writes: self.fail_writes,
            frames: 0,
        }))
    }
}

struct FakeSink {
    stats: Arc<Mutex<Stats>>,
    fail_writes: bool,
    frames: u64,
}

impl FrameSink for FakeSink {
    fn write(&mut self, _frame: &RgbImage) -> RecordResult<()> {
        if self.fail_writes {
            return Err(RecordError::Encoder("disk full".to_string()));
        }
        self.frames += 1;
        self.stats.lock().unwrap().writes += 1;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames
    }

    fn finish(self: Box<Self>) -> RecordResult<()> {
        self.stats.lock().unwrap().releases += 1;
        Ok(())
    }
}

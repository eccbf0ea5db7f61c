//! Video encoder sinks.
//!
//! Frames are streamed as raw `rgb24` into an `ffmpeg` child process which
//! owns all container and codec work.

use image::RgbImage;
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStderr, ChildStdin, Command, Stdio};
use std::thread::{self, JoinHandle};

use super::{Codec, RecordError, RecordResult, Resolution};

const MAX_STDERR_LEN: usize = 2048;

/// Everything needed to open one encoder sink.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderParams {
    pub path: PathBuf,
    pub codec: Codec,
    pub fps: f64,
    pub resolution: Resolution,
}

/// Accepts a sequence of frames and serializes them into a video file.
pub trait FrameSink: Send {
    fn write(&mut self, frame: &RgbImage) -> RecordResult<()>;

    fn frames_written(&self) -> u64;

    /// Flushes and releases the sink.
    fn finish(self: Box<Self>) -> RecordResult<()>;
}

/// Opens encoder sinks.
pub trait Encoder: Send {
    fn open(&self, params: &EncoderParams) -> RecordResult<Box<dyn FrameSink>>;
}

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

    fn codec_args(codec: Codec) -> Vec<&'static str> {
        match codec {
            Codec::Mp4v => vec!["-c:v", "mpeg4", "-q:v", "3"],
            Codec::Xvid => vec!["-c:v", "libxvid", "-vtag", "XVID", "-q:v", "3"],
            Codec::H264 => vec!["-c:v", "libx264", "-preset", "veryfast", "-pix_fmt", "yuv420p"],
            Codec::Avc1 => vec![
                "-c:v", "libx264", "-preset", "veryfast", "-pix_fmt", "yuv420p", "-tag:v", "avc1",
            ],
            Codec::Vp9 => vec!["-c:v", "libvpx-vp9", "-b:v", "0", "-crf", "32", "-deadline", "realtime"],
        }
    }

    fn build_args(params: &EncoderParams) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-y".into(),
            "-loglevel".into(),
            "error".into(),
            "-f".into(),
            "rawvideo".into(),
            "-pix_fmt".into(),
            "rgb24".into(),
            "-s".into(),
            params.resolution.to_string(),
            "-r".into(),
            params.fps.to_string(),
            "-i".into(),
            "-".into(),
        ];
        args.extend(Self::codec_args(params.codec).into_iter().map(String::from));
        args.push(params.path.to_string_lossy().to_string());
        args
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder for FfmpegEncoder {
    fn open(&self, params: &EncoderParams) -> RecordResult<Box<dyn FrameSink>> {
        if let Some(parent) = params.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let args = Self::build_args(params);
        tracing::info!("Starting ffmpeg encoder: {:?} {:?}", self.program, args);

        let mut process = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RecordError::Encoder(format!("failed to start ffmpeg: {}", e)))?;

        let frame_len = params.resolution.width as usize * params.resolution.height as usize * 3;
        let stdin = process.stdin.take();
        let stderr = process.stderr.take();

        // From here on the sink owns the child, so an early return kills it.
        let mut sink = FfmpegSink {
            process: Some(process),
            stdin: stdin.map(|pipe| BufWriter::with_capacity(frame_len, pipe)),
            stderr: None,
            resolution: params.resolution,
            frames_written: 0,
        };
        if sink.stdin.is_none() {
            return Err(RecordError::Encoder("failed to capture ffmpeg stdin".to_string()));
        }
        if let Some(pipe) = stderr {
            sink.stderr = Some(drain_stderr(pipe)?);
        }

        Ok(Box::new(sink))
    }
}

/// Reads ffmpeg's stderr for the whole session so the child never blocks on a
/// full pipe. Keeps the first `MAX_STDERR_LEN` bytes.
fn drain_stderr(mut pipe: ChildStderr) -> io::Result<JoinHandle<String>> {
    thread::Builder::new()
        .name("ffmpeg-stderr".to_string())
        .spawn(move || {
            let mut head = Vec::new();
            let _ = (&mut pipe).take(MAX_STDERR_LEN as u64).read_to_end(&mut head);
            let _ = io::copy(&mut pipe, &mut io::sink());
            String::from_utf8_lossy(&head).into_owned()
        })
}

struct FfmpegSink {
    process: Option<Child>,
    stdin: Option<BufWriter<ChildStdin>>,
    stderr: Option<JoinHandle<String>>,
    resolution: Resolution,
    frames_written: u64,
}

impl FfmpegSink {
    fn collect_stderr(&mut self) -> String {
        self.stderr
            .take()
            .and_then(|reader| reader.join().ok())
            .unwrap_or_default()
    }

    /// Closes the pipe, reaps ffmpeg and attaches whatever it reported to `context`.
    fn fail(&mut self, context: String) -> RecordError {
        self.stdin.take();
        let Some(mut process) = self.process.take() else {
            return RecordError::Encoder(context);
        };
        let status = match process.wait() {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!("Failed to reap ffmpeg: {}", e);
                return RecordError::Encoder(context);
            }
        };
        let stderr = self.collect_stderr();
        let detail = stderr.trim();
        if detail.is_empty() {
            RecordError::Encoder(format!("{}; ffmpeg exited with {}", context, status))
        } else {
            RecordError::Encoder(format!("{}; ffmpeg exited with {}: {}", context, status, detail))
        }
    }
}

impl FrameSink for FfmpegSink {
    fn write(&mut self, frame: &RgbImage) -> RecordResult<()> {
        if frame.width() != self.resolution.width || frame.height() != self.resolution.height {
            return Err(RecordError::FrameSizeMismatch {
                width: self.resolution.width,
                height: self.resolution.height,
                actual_width: frame.width(),
                actual_height: frame.height(),
            });
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| RecordError::Encoder("encoder already finished".to_string()))?;
        if let Err(e) = stdin.write_all(frame.as_raw()) {
            return Err(self.fail(format!("failed to write frame: {}", e)));
        }
        self.frames_written += 1;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames_written
    }

    fn finish(mut self: Box<Self>) -> RecordResult<()> {
        if let Some(mut stdin) = self.stdin.take() {
            let flushed = stdin.flush();
            drop(stdin);
            if let Err(e) = flushed {
                return Err(self.fail(format!("failed to flush frames: {}", e)));
            }
        }

        let Some(mut process) = self.process.take() else {
            return Ok(());
        };
        let status = process
            .wait()
            .map_err(|e| RecordError::Encoder(format!("failed to wait for ffmpeg: {}", e)))?;
        let stderr = self.collect_stderr();

        if !status.success() {
            return Err(RecordError::Encoder(format!(
                "ffmpeg exited with {}: {}",
                status,
                stderr.trim()
            )));
        }

        tracing::info!("ffmpeg encoder finished: {} frames written", self.frames_written);
        Ok(())
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        self.stdin.take();
        if let Some(mut process) = self.process.take() {
            tracing::warn!("Encoder dropped without finish, killing ffmpeg");
            let _ = process.kill();
            let _ = process.wait();
        }
    }
}

use anyhow::{anyhow, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::recording::{Codec, Container, FramePolicy, FrameRate, RecorderConfig, Resolution};

const MIN_DIMENSION: u32 = 16;
const MAX_DIMENSION: u32 = 8192;
const MAX_FILENAME_TEMPLATE_LEN: usize = 128;
const MAX_HOTKEY_LEN: usize = 64;
const MAX_UNIQUE_SUFFIX: u32 = 9999;
const DEFAULT_TEMPLATE: &str = "recording_%Y%m%d_%H%M%S";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub output: OutputConfig,
    pub recording: RecordingConfig,
    pub hotkeys: HotkeyConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub filename_template: String,
    pub extension: Container,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordingConfig {
    pub fps: FrameRate,
    /// Kept as text so an unknown codec in the file is reported, not silently dropped.
    pub codec: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub frame_policy: FramePolicy,
    #[serde(default = "default_show_preview")]
    pub show_preview: bool,
    /// Monitor id to record; the primary monitor when unset or disconnected.
    #[serde(default)]
    pub monitor: Option<u32>,
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,
}

fn default_show_preview() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HotkeyConfig {
    pub toggle_recording: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UiConfig {
    pub theme: Theme,
    pub show_notifications: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        self.codec()?;
        for (name, value) in [("width", self.recording.width), ("height", self.recording.height)] {
            if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&value) {
                return Err(anyhow!(
                    "{} must be between {} and {}",
                    name,
                    MIN_DIMENSION,
                    MAX_DIMENSION
                ));
            }
            if value % 2 != 0 {
                return Err(anyhow!("{} must be even", name));
            }
        }
        if self.output.filename_template.len() > MAX_FILENAME_TEMPLATE_LEN {
            return Err(anyhow!("filename_template too long"));
        }
        if self.output.filename_template.contains('/')
            || self.output.filename_template.contains('\\')
            || self.output.filename_template.contains("..")
        {
            return Err(anyhow!("filename_template contains invalid path characters"));
        }
        let hotkey = &self.hotkeys.toggle_recording;
        if hotkey.len() > MAX_HOTKEY_LEN {
            return Err(anyhow!("hotkey string too long"));
        }
        if !hotkey.chars().all(|c| c.is_alphanumeric() || c == '+' || c == ' ') {
            return Err(anyhow!("hotkey contains invalid characters"));
        }
        if let Some(ref program) = self.recording.ffmpeg_path {
            if program.as_os_str().is_empty() {
                return Err(anyhow!("ffmpeg_path is empty"));
            }
        }
        Ok(())
    }

    fn sanitize(&mut self) {
        self.recording.width = self.recording.width.clamp(MIN_DIMENSION, MAX_DIMENSION) & !1;
        self.recording.height = self.recording.height.clamp(MIN_DIMENSION, MAX_DIMENSION) & !1;

        if self.output.filename_template.len() > MAX_FILENAME_TEMPLATE_LEN
            || self.output.filename_template.contains('/')
            || self.output.filename_template.contains('\\')
            || self.output.filename_template.contains("..")
        {
            self.output.filename_template = DEFAULT_TEMPLATE.to_string();
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let videos_dir = directories::UserDirs::new()
            .and_then(|d| d.video_dir().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| {
                directories::BaseDirs::new()
                    .map(|b| b.home_dir().to_path_buf())
                    .unwrap_or_else(|| PathBuf::from("."))
            });

        Self {
            output: OutputConfig {
                directory: videos_dir.join("screenrec"),
                filename_template: DEFAULT_TEMPLATE.to_string(),
                extension: Container::Mp4,
            },
            recording: RecordingConfig {
                fps: FrameRate::Fps30,
                codec: Codec::Mp4v.fourcc().to_string(),
                width: 1920,
                height: 1080,
                frame_policy: FramePolicy::Scale,
                show_preview: true,
                monitor: None,
                ffmpeg_path: None,
            },
            hotkeys: HotkeyConfig {
                toggle_recording: "Ctrl+Shift+R".to_string(),
            },
            ui: UiConfig {
                theme: Theme::Dark,
                show_notifications: true,
            },
        }
    }
}

impl Config {
    pub fn config_dir() -> Option<PathBuf> {
        ProjectDirs::from("com", "screenrec", "screenrec").map(|p| p.config_dir().to_path_buf())
    }

    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.toml"))
    }

    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Config::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        config.sanitize();
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path().ok_or_else(|| anyhow!("No config directory available"))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn ensure_output_dir(&self) -> Result<()> {
        let dir = &self.output.directory;
        if dir.as_os_str().is_empty() {
            return Err(anyhow!("Output directory path is empty"));
        }
        if dir.to_string_lossy().contains("..") {
            return Err(anyhow!("Output directory contains path traversal"));
        }
        fs::create_dir_all(dir)?;
        Ok(())
    }

    pub fn codec(&self) -> Result<Codec> {
        self.recording.codec.parse::<Codec>().map_err(|e| anyhow!("{}", e))
    }

    pub fn generate_filename(&self, extension: Container) -> String {
        let now = chrono::Local::now();
        let formatted = now.format(&self.output.filename_template).to_string();
        let sanitized: String = formatted
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
            .take(200)
            .collect();
        let safe_name = if sanitized.is_empty() {
            format!("recording_{}", now.timestamp())
        } else {
            sanitized
        };
        format!("{}.{}", safe_name, extension.extension())
    }

    /// Next free path in the output directory for the given container.
    pub fn output_path(&self, extension: Container) -> PathBuf {
        unique_path(&self.output.directory.join(self.generate_filename(extension)))
    }

    pub fn recorder_config(&self) -> Result<RecorderConfig> {
        let mut config = RecorderConfig::new(
            self.output_path(self.output.extension),
            Resolution::new(self.recording.width, self.recording.height),
            &self.recording.codec,
            self.recording.fps.value(),
        )?
        .with_frame_policy(self.recording.frame_policy);
        config.extension = self.output.extension;
        Ok(config)
    }
}

fn unique_path(base: &Path) -> PathBuf {
    if !base.exists() {
        return base.to_path_buf();
    }
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "recording".to_string());
    let ext = base
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let parent = base.parent().unwrap_or_else(|| Path::new(""));

    (1..=MAX_UNIQUE_SUFFIX)
        .map(|i| parent.join(format!("{}_{}{}", stem, i, ext)))
        .find(|p| !p.exists())
        .unwrap_or_else(|| base.to_path_buf())
}

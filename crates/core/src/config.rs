use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable that overrides `input_mode` from the config file.
pub const INPUT_MODE_ENV: &str = "SMARTCALC_INPUT_MODE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Unknown input mode: '{0}'")]
    UnknownInputMode(String),
}

/// Where images come from. Chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    /// Frames dropped into a capture directory by a camera pipeline.
    #[serde(alias = "built_in_camera")]
    Camera,
    /// A single file picked by the user.
    #[default]
    #[serde(alias = "file")]
    Filesystem,
}

impl std::fmt::Display for InputMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputMode::Camera => write!(f, "camera"),
            InputMode::Filesystem => write!(f, "filesystem"),
        }
    }
}

impl std::str::FromStr for InputMode {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "camera" | "built_in_camera" => Ok(InputMode::Camera),
            "filesystem" | "file" => Ok(InputMode::Filesystem),
            other => Err(ConfigError::UnknownInputMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OcrEngine {
    /// Run the `tesseract` executable.
    #[default]
    Command,
    /// In-process libtesseract (needs the `tesseract` cargo feature).
    Tesseract,
    /// Always return `fixed_text`.
    Fixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub engine: OcrEngine,
    pub command: String,
    pub lang: String,
    pub data_path: Option<PathBuf>,
    pub fixed_text: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            engine: OcrEngine::default(),
            command: "tesseract".to_string(),
            lang: "eng".to_string(),
            data_path: None,
            fixed_text: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Larger images are scaled down to fit this box before OCR.
    pub max_dimension: u32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self { max_dimension: 2800 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub input_mode: InputMode,
    /// Watched in camera mode. Falls back to the platform data dir when unset.
    pub capture_dir: Option<PathBuf>,
    pub ocr: OcrConfig,
    pub preprocess: PreprocessConfig,
}

impl AppConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_content)?)
    }

    /// Load from `path`, or defaults if the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read { path: path.to_path_buf(), source }),
        }
    }

    /// Apply `SMARTCALC_INPUT_MODE` if set.
    pub fn apply_env(mut self) -> Result<Self, ConfigError> {
        if let Ok(mode) = std::env::var(INPUT_MODE_ENV) {
            self.input_mode = mode.parse()?;
        }
        Ok(self)
    }
}

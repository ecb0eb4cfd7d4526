//! Configuration system
//!
//! Reads configuration from:
//! - `.practicarc.yaml` / `.practicarc.json` (project-level)
//! - `<config dir>/practica/config.yaml` (user-level)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Rule evaluator settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// Trim submitted code before applying rules
    pub trim_code: bool,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self { trim_code: true }
    }
}

/// Maze interpreter settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MazeConfig {
    /// Pause between two interpreted instructions
    pub step_delay_ms: u64,

    /// Upper bound on executed instructions per run
    pub max_steps: u32,
}

impl Default for MazeConfig {
    fn default() -> Self {
        Self {
            step_delay_ms: 150,
            max_steps: 1000,
        }
    }
}

/// Persistence settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON database file; in-memory storage when unset
    pub path: Option<PathBuf>,
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output format
    pub format: OutputFormat,

    /// Color mode
    pub color: ColorMode,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            color: ColorMode::Auto,
        }
    }
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Color mode options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub evaluator: EvaluatorConfig,
    pub maze: MazeConfig,
    pub store: StoreConfig,
    pub output: OutputConfig,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let mut config: Self = match ext {
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            "json" => serde_json::from_str(&content)?,
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "Unknown config file format: {}",
                    ext
                )))
            }
        };

        // Relative store paths are relative to the config file
        if let Some(store_path) = &config.store.path {
            if store_path.is_relative() {
                let base_dir = path.parent().unwrap_or(Path::new("."));
                config.store.path = Some(base_dir.join(store_path));
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.maze.max_steps == 0 {
            return Err(ConfigError::Invalid(
                "maze.max_steps must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Load configuration from default locations
    pub fn load_default() -> Result<Self, ConfigError> {
        let config_names = [".practicarc.yaml", ".practicarc.yml", ".practicarc.json"];

        // Check current directory
        for name in &config_names {
            let path = PathBuf::from(name);
            if path.exists() {
                return Self::load(&path);
            }
        }

        // Check user config directory
        if let Some(dir) = dirs::config_dir() {
            let path = dir.join("practica").join("config.yaml");
            if path.exists() {
                return Self::load(&path);
            }
        }

        Ok(Self::default())
    }

    /// Merge CLI arguments into configuration
    pub fn merge_cli(
        &mut self,
        format: Option<OutputFormat>,
        step_delay_ms: Option<u64>,
        store_path: Option<PathBuf>,
    ) {
        if let Some(f) = format {
            self.output.format = f;
        }
        if let Some(delay) = step_delay_ms {
            self.maze.step_delay_ms = delay;
        }
        if let Some(path) = store_path {
            self.store.path = Some(path);
        }
    }
}

//! Configuration - bar appearance and replay pacing

use crate::errors::ConfigError;
use crate::ui::{ProgressBar, DEFAULT_LABEL, DEFAULT_WIDTH};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const LOCAL_CONFIG: &str = "treeprogress.yml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of segments in the bar
    pub bar_width: usize,
    /// Text shown before the bar
    pub label: String,
    /// Pause between two events of the same producer during replay
    pub delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bar_width: DEFAULT_WIDTH,
            label: DEFAULT_LABEL.to_string(),
            delay_ms: 0,
        }
    }
}

impl Config {
    /// User-level config location
    pub fn user_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("treeprogress").join("config.yml"))
    }

    /// Load config from a YAML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve config
    /// Priority:
    /// 1. explicit path (must exist)
    /// 2. ./treeprogress.yml
    /// 3. <config dir>/treeprogress/config.yml
    /// 4. defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let local = Path::new(LOCAL_CONFIG);
        if local.exists() {
            log::debug!("Using config {}", local.display());
            return Self::from_file(local);
        }

        if let Some(user) = Self::user_path().filter(|p| p.exists()) {
            log::debug!("Using config {}", user.display());
            return Self::from_file(&user);
        }

        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bar_width == 0 {
            return Err(ConfigError::ZeroWidth);
        }
        Ok(())
    }

    pub fn progress_bar(&self) -> ProgressBar {
        ProgressBar::new(self.bar_width, self.label.clone())
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

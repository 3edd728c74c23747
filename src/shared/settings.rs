use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::shared::error::{AppError, AppResult};

pub const DEFAULT_MAX_HISTORY_SIZE: usize = 100;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

const HISTORY_FILE_NAME: &str = "clipboard_history.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub max_history_size: usize,
    pub poll_interval_ms: u64,
    /// Overrides the default location under the platform data dir
    pub history_file: Option<PathBuf>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            max_history_size: DEFAULT_MAX_HISTORY_SIZE,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            history_file: None,
        }
    }
}

fn project_dirs() -> AppResult<ProjectDirs> {
    ProjectDirs::from("com", "clipboard-history", "clipboard-history")
        .ok_or_else(|| AppError::Settings("Failed to determine project directories".to_string()))
}

impl AppSettings {
    pub fn get_settings_path() -> AppResult<PathBuf> {
        Ok(project_dirs()?.config_dir().join("settings.json"))
    }

    /// Load from the platform config dir, writing defaults on first run.
    pub async fn load() -> AppResult<Self> {
        Self::load_from(&Self::get_settings_path()?).await
    }

    /// A malformed file falls back to defaults; it is left on disk untouched.
    pub async fn load_from(path: &Path) -> AppResult<Self> {
        if !fs::try_exists(path).await? {
            let settings = Self::default();
            settings.save_to(path).await?;
            return Ok(settings);
        }

        let content = fs::read_to_string(path).await?;
        match serde_json::from_str::<Self>(&content) {
            Ok(settings) => Ok(settings.normalized()),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to parse settings, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub async fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    fn normalized(mut self) -> Self {
        if self.max_history_size == 0 {
            tracing::warn!("max_history_size must be at least 1, clamping");
            self.max_history_size = 1;
        }
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn history_path(&self) -> AppResult<PathBuf> {
        match &self.history_file {
            Some(path) => Ok(path.clone()),
            None => Ok(project_dirs()?.data_dir().join(HISTORY_FILE_NAME)),
        }
    }
}

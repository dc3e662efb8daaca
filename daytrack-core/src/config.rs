/// Workspace configuration.
/// Reads config.json from ~/.config/daytrack/config.json (or platform equivalent).
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::resolver::format_date;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerConfig {
    /// Root of the task workspace. Defaults to ~/.openclaw/workspace/tasks.
    #[serde(default)]
    pub base_dir: Option<PathBuf>,
    #[serde(default)]
    pub day_track_dir: Option<PathBuf>,
    #[serde(default)]
    pub archived_dir: Option<PathBuf>,
    #[serde(default)]
    pub night_check_dir: Option<PathBuf>,
    #[serde(default)]
    pub weekly_plan_file: Option<PathBuf>,
}

impl TrackerConfig {
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
            ..Self::default()
        }
    }

    /// Resolve every document location, applying per-path overrides.
    pub fn paths(&self) -> TrackerPaths {
        let base = self.base_dir.clone().unwrap_or_else(default_base_dir);
        let daily = base.join("daily");
        TrackerPaths {
            day_track_dir: self
                .day_track_dir
                .clone()
                .unwrap_or_else(|| daily.join("day_track")),
            archived_dir: self
                .archived_dir
                .clone()
                .unwrap_or_else(|| daily.join("archived")),
            night_check_dir: self
                .night_check_dir
                .clone()
                .unwrap_or_else(|| daily.join("night_check")),
            weekly_plan_file: self
                .weekly_plan_file
                .clone()
                .unwrap_or_else(|| base.join("weekly").join("plan.md")),
        }
    }
}

/// Concrete file-system layout of one workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerPaths {
    pub day_track_dir: PathBuf,
    pub archived_dir: PathBuf,
    pub night_check_dir: PathBuf,
    pub weekly_plan_file: PathBuf,
}

impl TrackerPaths {
    pub fn day_track_file(&self, date: NaiveDate) -> PathBuf {
        self.day_track_dir.join(format!("{}.md", format_date(date)))
    }

    pub fn archived_day_dir(&self, date: &str) -> PathBuf {
        self.archived_dir.join(date)
    }

    pub fn archived_day_track(&self, date: &str) -> PathBuf {
        self.archived_day_dir(date).join("day_track.md")
    }

    pub fn archived_overnight(&self, date: &str) -> PathBuf {
        self.archived_day_dir(date).join("bot_overnight.md")
    }

    pub fn archived_plan(&self, date: &str) -> PathBuf {
        self.archived_day_dir(date).join("plan.md")
    }

    pub fn night_plan_file(&self) -> PathBuf {
        self.night_check_dir.join("plan.md")
    }

    pub fn overnight_file(&self) -> PathBuf {
        self.night_check_dir.join("bot_overnight.md")
    }
}

/// Default workspace root: ~/.openclaw/workspace/tasks
pub fn default_base_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".openclaw")
        .join("workspace")
        .join("tasks")
}

/// Default config path: ~/.config/daytrack/config.json
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("daytrack")
        .join("config.json")
}

/// Load config from path. Returns default if file doesn't exist.
pub fn load_config(path: &Path) -> TrackerConfig {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!(
                "[daytrack.config] Failed to parse config {}: {}",
                path.display(),
                e
            );
            TrackerConfig::default()
        }),
        Err(_) => {
            log::info!(
                "[daytrack.config] No config at {}, using defaults",
                path.display()
            );
            TrackerConfig::default()
        }
    }
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::filter::sort::{AlbumSortOrder, SortSettings, StringComparison};
use crate::filter::FilterBehavior;
use crate::model::TristateMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// JSON snapshot of album rows read by the command line tool.
    #[serde(default)]
    pub library: Option<PathBuf>,

    #[serde(default)]
    pub filter: FilterConfig,

    #[serde(default)]
    pub sort: SortConfig,

    #[serde(default)]
    pub model: ModelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FilterConfig {
    #[serde(default)]
    pub behavior: FilterBehavior,

    #[serde(default)]
    pub case_sensitive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SortConfig {
    /// Sort key for physical albums.
    #[serde(default)]
    pub albums: AlbumSortOrder,

    #[serde(default)]
    pub comparison: StringComparison,

    #[serde(default)]
    pub case_sensitive: bool,
}

impl SortConfig {
    pub fn settings(&self) -> SortSettings {
        SortSettings {
            albums: self.albums,
            comparison: self.comparison,
            case_sensitive: self.case_sensitive,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Show item counts next to album titles.
    #[serde(default = "default_true")]
    pub show_count: bool,

    /// Checking an album checks its subtree and updates its parents.
    #[serde(default = "default_true")]
    pub cascading: bool,

    #[serde(default = "default_true")]
    pub root_checkable: bool,

    #[serde(default)]
    pub tristate: TristateMode,
}

fn default_true() -> bool {
    true
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            show_count: default_true(),
            cascading: default_true(),
            root_checkable: default_true(),
            tristate: TristateMode::default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            library: None,
            filter: FilterConfig::default(),
            sort: SortConfig::default(),
            model: ModelConfig::default(),
        }
    }
}

impl Config {
    /// Load from `ALBUMTREE_CONFIG` or the default location, writing the
    /// defaults out on first run.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            // Create default config
            let config = Config::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file {:?}", path))?;

        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("albumtree")
    }

    fn config_path() -> PathBuf {
        match std::env::var_os("ALBUMTREE_CONFIG") {
            Some(path) => PathBuf::from(path),
            None => Self::config_dir().join("config.toml"),
        }
    }
}

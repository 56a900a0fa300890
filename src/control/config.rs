//! Configuration loading for the control module.

use log::LevelFilter;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Runner settings read from `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SimulatorConfig {
    /// Log level for this crate (`off`, `error`, `warn`, `info`, `debug`, `trace`)
    pub log_level: String,
    /// Ticks between position reports in the log, 0 disables them
    pub report_interval: u64,
    /// Add every entity's reachable set to the final report
    pub print_reachability: bool,
    /// Pretty-print the JSON report
    pub pretty: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            report_interval: 0,
            print_reachability: false,
            pretty: true,
        }
    }
}

impl SimulatorConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Arguments
    /// * `config_path` - Path to the config.toml file
    ///
    /// # Returns
    /// * `Ok(SimulatorConfig)` if the file was successfully loaded and parsed
    /// * `Err(String)` with a descriptive error message otherwise
    pub fn load(config_path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(config_path).map_err(|e| format!("Failed to read config file: {}", e))?;

        Self::parse(&content)
    }

    /// Parse configuration from TOML text. Missing keys take their defaults.
    pub fn parse(content: &str) -> Result<Self, String> {
        let config: Self = toml::from_str(content).map_err(|e| format!("Failed to parse config file: {}", e))?;
        config.level_filter()?;
        Ok(config)
    }

    /// Resolve the configuration for a run.
    ///
    /// An explicit path must exist. Without one, `config.toml` next to the
    /// scene is used if present, and the defaults otherwise.
    pub fn resolve(explicit: Option<&Path>, scene_path: &str) -> Result<Self, String> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let derived = Self::config_path_from_scene(scene_path);
        if derived.is_file() { Self::load(&derived) } else { Ok(Self::default()) }
    }

    /// Derive the config path from a scene file path.
    ///
    /// Replaces the scene filename with "config.toml" in the same directory.
    pub fn config_path_from_scene(scene_path: &str) -> PathBuf {
        let scene = Path::new(scene_path);
        scene.parent().unwrap_or(Path::new(".")).join("config.toml")
    }

    pub fn level_filter(&self) -> Result<LevelFilter, String> {
        self.log_level.parse().map_err(|_| format!("Invalid log-level '{}'", self.log_level))
    }
}

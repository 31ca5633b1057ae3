//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/undivided/undivided.toml`
//! 3. Project config: `<project_dir>/.undivided.toml`
//! 4. Environment variables: `UNDIVIDED_*` prefix

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::ApplicationError;
use crate::domain::{LayoutConfig, LayoutDirection, LEAF_EPSILON};

/// Name of the project-level config file.
pub const PROJECT_CONFIG_FILE: &str = ".undivided.toml";

/// Tolerances of the interest calculator and the validation layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InterestSettings {
    /// A node is a leaf owner while it has conveyed less than `100 - leaf_epsilon`
    pub leaf_epsilon: f64,
    /// A transfer may exceed the remaining interest by at most this much
    pub allocation_slack: f64,
}

impl Default for InterestSettings {
    fn default() -> Self {
        Self {
            leaf_epsilon: LEAF_EPSILON,
            allocation_slack: 0.01,
        }
    }
}

/// Raw layout section; `None` means "not specified, inherit".
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawLayoutConfig {
    pub direction: Option<LayoutDirection>,
    pub node_width: Option<f64>,
    pub node_height: Option<f64>,
    pub horizontal_gap: Option<f64>,
    pub vertical_gap: Option<f64>,
    pub margin: Option<f64>,
    pub min_width: Option<f64>,
    pub min_height: Option<f64>,
    pub horizontal_tier_padding: Option<f64>,
}

/// Raw interest section.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawInterestSettings {
    pub leaf_epsilon: Option<f64>,
    pub allocation_slack: Option<f64>,
}

/// Raw settings for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub data_file: Option<PathBuf>,
    pub layout: RawLayoutConfig,
    pub interest: RawInterestSettings,
}

/// Unified configuration for undivided.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Ledger file (default: `<XDG data dir>/undivided/ledger.json`)
    pub data_file: PathBuf,
    pub layout: LayoutConfig,
    pub interest: InterestSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_file: default_data_file(),
            layout: LayoutConfig::default(),
            interest: InterestSettings::default(),
        }
    }
}

/// Get the default ledger file.
fn default_data_file() -> PathBuf {
    ProjectDirs::from("", "", "undivided")
        .map(|dirs| dirs.data_dir().join("ledger.json"))
        .unwrap_or_else(|| PathBuf::from("~/.local/share/undivided/ledger.json"))
}

/// Get the XDG config directory for undivided.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "undivided").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("undivided.toml"))
}

/// Get the path to the config file of a project directory.
pub fn project_config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(PROJECT_CONFIG_FILE)
}

/// Expand `~`, `$VAR`, and `${VAR}`; unknown variables leave the input unchanged.
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    shellexpand::full(raw.as_ref())
        .map(|s| PathBuf::from(s.into_owned()))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl LayoutConfig {
    fn merge_raw(&self, raw: &RawLayoutConfig) -> Self {
        Self {
            direction: raw.direction.unwrap_or(self.direction),
            node_width: raw.node_width.unwrap_or(self.node_width),
            node_height: raw.node_height.unwrap_or(self.node_height),
            horizontal_gap: raw.horizontal_gap.unwrap_or(self.horizontal_gap),
            vertical_gap: raw.vertical_gap.unwrap_or(self.vertical_gap),
            margin: raw.margin.unwrap_or(self.margin),
            min_width: raw.min_width.unwrap_or(self.min_width),
            min_height: raw.min_height.unwrap_or(self.min_height),
            horizontal_tier_padding: raw
                .horizontal_tier_padding
                .unwrap_or(self.horizontal_tier_padding),
        }
    }
}

impl InterestSettings {
    fn merge_raw(&self, raw: &RawInterestSettings) -> Self {
        Self {
            leaf_epsilon: raw.leaf_epsilon.unwrap_or(self.leaf_epsilon),
            allocation_slack: raw.allocation_slack.unwrap_or(self.allocation_slack),
        }
    }
}

impl Settings {
    /// Merge overlay config onto self (base): overlay wins where it is `Some`.
    ///
    /// A relative `data_file` is resolved against `base_dir` when given.
    fn merge_with(&self, overlay: &RawSettings, base_dir: Option<&Path>) -> Self {
        let data_file = match (&overlay.data_file, base_dir) {
            (Some(path), Some(dir)) if path.is_relative() && !path.starts_with("~") => {
                dir.join(path)
            }
            (Some(path), _) => path.clone(),
            (None, _) => self.data_file.clone(),
        };
        Self {
            data_file,
            layout: self.layout.merge_raw(&overlay.layout),
            interest: self.interest.merge_raw(&overlay.interest),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `project_dir` - Optional project directory holding `.undivided.toml`
    ///
    /// # Precedence (lowest to highest)
    /// 1. Compiled defaults
    /// 2. Global config: `$XDG_CONFIG_HOME/undivided/undivided.toml`
    /// 3. Project config: `<project_dir>/.undivided.toml`
    /// 4. Environment variables: `UNDIVIDED_*` prefix, `__` between sections
    pub fn load(project_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                debug!("loading global config {}", global_path.display());
                let raw = load_raw_settings(&global_path)?;
                current = current.merge_with(&raw, None);
            }
        }

        if let Some(dir) = project_dir {
            let local_path = project_config_path(dir);
            if local_path.exists() {
                debug!("loading project config {}", local_path.display());
                let raw = load_raw_settings(&local_path)?;
                current = current.merge_with(&raw, Some(dir));
            }
        }

        current = Self::apply_env_overrides(current)?;
        current.expand_paths();
        current.validate()?;

        Ok(current)
    }

    /// Load settings from one explicit file on top of the defaults.
    pub fn load_file(path: &Path) -> Result<Self, ApplicationError> {
        let raw = load_raw_settings(path)?;
        let mut settings = Self::default().merge_with(&raw, path.parent());
        settings.expand_paths();
        settings.validate()?;
        Ok(settings)
    }

    /// Apply UNDIVIDED_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(Environment::with_prefix("UNDIVIDED").separator("__"))
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_string("data_file") {
            settings.data_file = PathBuf::from(val);
        }
        if let Ok(val) = config.get_string("layout.direction") {
            settings.layout.direction = val
                .parse()
                .map_err(|message| ApplicationError::Config { message })?;
        }

        let layout = &mut settings.layout;
        let float_fields: [(&str, &mut f64); 8] = [
            ("layout.node_width", &mut layout.node_width),
            ("layout.node_height", &mut layout.node_height),
            ("layout.horizontal_gap", &mut layout.horizontal_gap),
            ("layout.vertical_gap", &mut layout.vertical_gap),
            ("layout.margin", &mut layout.margin),
            ("layout.min_width", &mut layout.min_width),
            ("layout.min_height", &mut layout.min_height),
            ("layout.horizontal_tier_padding", &mut layout.horizontal_tier_padding),
        ];
        for (key, slot) in float_fields {
            if let Ok(val) = config.get_float(key) {
                *slot = val;
            }
        }
        if let Ok(val) = config.get_float("interest.leaf_epsilon") {
            settings.interest.leaf_epsilon = val;
        }
        if let Ok(val) = config.get_float("interest.allocation_slack") {
            settings.interest.allocation_slack = val;
        }

        Ok(settings)
    }

    /// Expand shell variables and tilde in path-like fields.
    fn expand_paths(&mut self) {
        self.data_file = expand_path(&self.data_file);
    }

    /// Reject dimensions and tolerances that make no sense.
    pub fn validate(&self) -> Result<(), ApplicationError> {
        let layout = &self.layout;
        let positive = [
            ("layout.node_width", layout.node_width),
            ("layout.node_height", layout.node_height),
        ];
        for (key, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ApplicationError::Config {
                    message: format!("{key} must be positive, got {value}"),
                });
            }
        }
        let non_negative = [
            ("layout.horizontal_gap", layout.horizontal_gap),
            ("layout.vertical_gap", layout.vertical_gap),
            ("layout.margin", layout.margin),
            ("layout.min_width", layout.min_width),
            ("layout.min_height", layout.min_height),
            ("layout.horizontal_tier_padding", layout.horizontal_tier_padding),
            ("interest.leaf_epsilon", self.interest.leaf_epsilon),
            ("interest.allocation_slack", self.interest.allocation_slack),
        ];
        for (key, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ApplicationError::Config {
                    message: format!("{key} must not be negative, got {value}"),
                });
            }
        }
        Ok(())
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# undivided configuration
#
# Locations (by precedence, lowest to highest):
#   Global:  ~/.config/undivided/undivided.toml
#   Project: <project_dir>/.undivided.toml
#   Env:     UNDIVIDED_* environment variables, e.g. UNDIVIDED_LAYOUT__DIRECTION=horizontal

# Ledger file; relative paths in a project config resolve against the project
# data_file = "ledger.json"

[layout]
# "vertical" (tiers top to bottom) or "horizontal" (tiers left to right)
# direction = "vertical"
# node_width = 180
# node_height = 160
# horizontal_gap = 60
# vertical_gap = 120
# margin = 50
# min_width = 800
# min_height = 500
# horizontal_tier_padding = 40

[interest]
# Owners that conveyed less than 100 - leaf_epsilon percent still hold interest
# leaf_epsilon = 0.01
# Tolerance when a transfer is checked against the remaining interest
# allocation_slack = 0.01
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

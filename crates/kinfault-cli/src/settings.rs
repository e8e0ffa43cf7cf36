//! Checker settings – reads/writes `~/.kinfault/config.toml`.
//!
//! The file holds the operator's usual check options.  Every key is
//! optional; missing keys take their default.  Values are stored in
//! operator units (degrees, percent) and converted into a
//! [`CheckConfig`] with [`CheckerSettings::to_check_config`].

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use kinfault_kernel::{CheckConfig, CheckRange, LinkSelection};
use serde::{Deserialize, Serialize};

use crate::error::CliError;

/// Valid range of `angle_margin_deg`.
pub const ANGLE_MARGIN_DEG_LIMIT: f64 = 99.99;
/// Valid range of `translation_margin` (meters).
pub const TRANSLATION_MARGIN_LIMIT: f64 = 9.9999;
/// Valid range of `velocity_limit_percent`.
pub const VELOCITY_PERCENT_RANGE: (f64, f64) = (1.0, 100.0);

/// Which joints the position and velocity checks cover.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TargetJoints {
    #[default]
    All,
    /// Only the links named with `--select`.
    Selected,
    /// Every link except those named with `--select`.
    NonSelected,
}

impl std::fmt::Display for TargetJoints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetJoints::All => write!(f, "all"),
            TargetJoints::Selected => write!(f, "selected"),
            TargetJoints::NonSelected => write!(f, "non-selected"),
        }
    }
}

/// Persisted check options stored in `~/.kinfault/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerSettings {
    pub check_joint_positions: bool,
    /// Degrees, within ±99.99.
    pub angle_margin_deg: f64,
    /// Meters, within ±9.9999.
    pub translation_margin: f64,
    pub check_joint_velocities: bool,
    /// Percent of the rated velocity limits, within [1, 100].
    pub velocity_limit_percent: f64,
    pub target_joints: TargetJoints,
    pub check_self_collisions: bool,
    pub only_time_range: bool,
    /// `[begin, end]` in seconds; used only with `only_time_range`.
    pub time_range: [f64; 2],
}

impl Default for CheckerSettings {
    fn default() -> Self {
        Self {
            check_joint_positions: true,
            angle_margin_deg: 0.0,
            translation_margin: 0.0,
            check_joint_velocities: true,
            velocity_limit_percent: 100.0,
            target_joints: TargetJoints::All,
            check_self_collisions: true,
            only_time_range: false,
            time_range: [0.0, 0.0],
        }
    }
}

impl CheckerSettings {
    /// Build the engine configuration.
    ///
    /// `selected_links` are the link indices named on the command line; they
    /// matter only when `target_joints` is not `all`.  Out-of-range numbers
    /// are clamped into their documented ranges.
    pub fn to_check_config(&self, selected_links: &BTreeSet<usize>) -> CheckConfig {
        let link_selection = match self.target_joints {
            TargetJoints::All => LinkSelection::All,
            TargetJoints::Selected => LinkSelection::Only(selected_links.clone()),
            TargetJoints::NonSelected => LinkSelection::Except(selected_links.clone()),
        };
        let range = if self.only_time_range {
            CheckRange::Seconds {
                begin: self.time_range[0],
                end: self.time_range[1],
            }
        } else {
            CheckRange::Whole
        };
        let (min_pct, max_pct) = VELOCITY_PERCENT_RANGE;

        CheckConfig::default()
            .with_checks(
                self.check_joint_positions,
                self.check_joint_velocities,
                self.check_self_collisions,
            )
            .with_link_selection(link_selection)
            .with_angle_margin(
                self.angle_margin_deg
                    .clamp(-ANGLE_MARGIN_DEG_LIMIT, ANGLE_MARGIN_DEG_LIMIT)
                    .to_radians(),
            )
            .with_translation_margin(
                self.translation_margin
                    .clamp(-TRANSLATION_MARGIN_LIMIT, TRANSLATION_MARGIN_LIMIT),
            )
            .with_velocity_limit_ratio(self.velocity_limit_percent.clamp(min_pct, max_pct) / 100.0)
            .with_range(range)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// File handling
// ────────────────────────────────────────────────────────────────────────────

/// Return the path to `~/.kinfault/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the settings path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".kinfault").join("config.toml")
}

/// Load the settings from the default path.  Returns `None` if the file does
/// not exist.
pub fn load() -> Result<Option<CheckerSettings>, CliError> {
    load_from(&config_path())
}

/// Load the settings from a specific path, then apply environment overrides.
pub fn load_from(path: &Path) -> Result<Option<CheckerSettings>, CliError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut settings: CheckerSettings =
        toml::from_str(&raw).map_err(|source| CliError::Settings {
            path: path.to_path_buf(),
            source,
        })?;
    apply_env_overrides(&mut settings);
    Ok(Some(settings))
}

/// Apply `KINFAULT_*` environment variable overrides to `settings`.
///
/// Unparseable values are ignored.
///
/// | Variable | Settings field |
/// |---|---|
/// | `KINFAULT_CHECK_POSITIONS` | `check_joint_positions` |
/// | `KINFAULT_CHECK_VELOCITIES` | `check_joint_velocities` |
/// | `KINFAULT_CHECK_COLLISIONS` | `check_self_collisions` |
/// | `KINFAULT_ANGLE_MARGIN_DEG` | `angle_margin_deg` |
/// | `KINFAULT_TRANSLATION_MARGIN` | `translation_margin` |
/// | `KINFAULT_VELOCITY_LIMIT_PERCENT` | `velocity_limit_percent` |
/// | `KINFAULT_TARGET_JOINTS` | `target_joints` |
pub fn apply_env_overrides(settings: &mut CheckerSettings) {
    if let Some(v) = env_bool("KINFAULT_CHECK_POSITIONS") {
        settings.check_joint_positions = v;
    }
    if let Some(v) = env_bool("KINFAULT_CHECK_VELOCITIES") {
        settings.check_joint_velocities = v;
    }
    if let Some(v) = env_bool("KINFAULT_CHECK_COLLISIONS") {
        settings.check_self_collisions = v;
    }
    if let Some(v) = env_f64("KINFAULT_ANGLE_MARGIN_DEG") {
        settings.angle_margin_deg = v;
    }
    if let Some(v) = env_f64("KINFAULT_TRANSLATION_MARGIN") {
        settings.translation_margin = v;
    }
    if let Some(v) = env_f64("KINFAULT_VELOCITY_LIMIT_PERCENT") {
        settings.velocity_limit_percent = v;
    }
    if let Ok(v) = std::env::var("KINFAULT_TARGET_JOINTS")
        && let Ok(target) = TargetJoints::from_str(&v, true)
    {
        settings.target_joints = target;
    }
}

fn env_f64(name: &str) -> Option<f64> {
    std::env::var(name).ok()?.trim().parse().ok()
}

fn env_bool(name: &str) -> Option<bool> {
    match std::env::var(name).ok()?.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Save the settings to the default path, creating `~/.kinfault/` if needed.
pub fn save(settings: &CheckerSettings) -> Result<(), CliError> {
    save_to(settings, &config_path())
}

/// Save the settings to a specific path.
pub fn save_to(settings: &CheckerSettings, path: &Path) -> Result<(), CliError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| CliError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let raw = toml::to_string_pretty(settings)?;
    fs::write(path, raw).map_err(|source| CliError::Write {
        path: path.to_path_buf(),
        source,
    })
}

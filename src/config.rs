use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Tuning knobs recognized by the synchronization engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncOptions {
    /// Minimum spacing between sync computations for one direction (one
    /// display refresh by default).
    pub throttle_interval_ms: u64,
    /// Quiet period before a dirty line map is rebuilt.
    pub rebuild_debounce_ms: u64,
    /// Smallest scroll delta (px) worth writing.
    pub pixel_threshold: f64,
    /// Time without notifications after which the active source is released.
    pub lock_quiet_ms: u64,
    /// Distance (px) around the viewport inside which elements are measured
    /// live when building the line map.
    pub visibility_margin: f64,
    /// Duration of eased programmatic jumps; 0 disables smoothing.
    pub smoothing_duration_ms: u64,
    /// Run interpolation on a worker thread when possible.
    pub use_offload: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            throttle_interval_ms: 16,
            rebuild_debounce_ms: 100,
            pixel_threshold: 1.0,
            lock_quiet_ms: 200,
            visibility_margin: 1000.0,
            smoothing_duration_ms: 250,
            use_offload: true,
        }
    }
}

impl SyncOptions {
    /// Check value ranges.
    ///
    /// # Errors
    /// Returns [`SyncError::InvalidOption`] for negative or non-finite pixel
    /// values and for a zero lock quiet period.
    pub fn validate(&self) -> Result<(), SyncError> {
        if !self.pixel_threshold.is_finite() || self.pixel_threshold < 0.0 {
            return Err(SyncError::InvalidOption {
                name: "pixelThreshold",
                reason: format!("expected a finite value >= 0, got {}", self.pixel_threshold),
            });
        }
        if !self.visibility_margin.is_finite() || self.visibility_margin < 0.0 {
            return Err(SyncError::InvalidOption {
                name: "visibilityMargin",
                reason: format!(
                    "expected a finite value >= 0, got {}",
                    self.visibility_margin
                ),
            });
        }
        if self.lock_quiet_ms == 0 {
            return Err(SyncError::InvalidOption {
                name: "lockQuietMs",
                reason: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    /// Replace out-of-range values so the engine can run with them: negative
    /// or non-finite pixel values fall back to their defaults and the lock
    /// quiet period is at least 1 ms.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !self.pixel_threshold.is_finite() || self.pixel_threshold < 0.0 {
            self.pixel_threshold = defaults.pixel_threshold;
        }
        if !self.visibility_margin.is_finite() || self.visibility_margin < 0.0 {
            self.visibility_margin = defaults.visibility_margin;
        }
        self.lock_quiet_ms = self.lock_quiet_ms.max(1);
        self
    }
}

/// Partial options as stored in a config file or given on the command line.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OptionOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throttle_interval_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rebuild_debounce_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pixel_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_quiet_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility_margin: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smoothing_duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_offload: Option<bool>,
}

impl OptionOverrides {
    /// Merge, with values from `other` taking precedence.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            throttle_interval_ms: other.throttle_interval_ms.or(self.throttle_interval_ms),
            rebuild_debounce_ms: other.rebuild_debounce_ms.or(self.rebuild_debounce_ms),
            pixel_threshold: other.pixel_threshold.or(self.pixel_threshold),
            lock_quiet_ms: other.lock_quiet_ms.or(self.lock_quiet_ms),
            visibility_margin: other.visibility_margin.or(self.visibility_margin),
            smoothing_duration_ms: other.smoothing_duration_ms.or(self.smoothing_duration_ms),
            use_offload: other.use_offload.or(self.use_offload),
        }
    }

    /// Apply the set values on top of `base`.
    pub fn apply(&self, base: SyncOptions) -> SyncOptions {
        SyncOptions {
            throttle_interval_ms: self.throttle_interval_ms.unwrap_or(base.throttle_interval_ms),
            rebuild_debounce_ms: self.rebuild_debounce_ms.unwrap_or(base.rebuild_debounce_ms),
            pixel_threshold: self.pixel_threshold.unwrap_or(base.pixel_threshold),
            lock_quiet_ms: self.lock_quiet_ms.unwrap_or(base.lock_quiet_ms),
            visibility_margin: self.visibility_margin.unwrap_or(base.visibility_margin),
            smoothing_duration_ms: self
                .smoothing_duration_ms
                .unwrap_or(base.smoothing_duration_ms),
            use_offload: self.use_offload.unwrap_or(base.use_offload),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

pub fn global_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("panesync").join("config.json");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("panesync")
                .join("config.json");
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("panesync").join("config.json");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join(".config")
                .join("panesync")
                .join("config.json");
        }
    }

    local_override_path()
}

pub fn local_override_path() -> PathBuf {
    PathBuf::from(".panesync.json")
}

/// Load overrides from a JSON file. A missing file yields no overrides.
///
/// # Errors
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_overrides(path: &Path) -> Result<OptionOverrides> {
    if !path.exists() {
        return Ok(OptionOverrides::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(OptionOverrides::default());
    }
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config {}", path.display()))
}

/// Save overrides as pretty-printed JSON, creating parent directories.
///
/// # Errors
/// Returns an error if the directory or file cannot be written.
pub fn save_overrides(path: &Path, overrides: &OptionOverrides) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config dir {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(overrides).context("Failed to encode config")?;
    fs::write(path, format!("{json}\n"))
        .with_context(|| format!("Failed to write config {}", path.display()))
}

/// # Errors
/// Returns an error if the file exists but cannot be removed.
pub fn clear_overrides(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

/// Resolve effective options: defaults, then global file, then local file,
/// then command-line overrides.
///
/// # Errors
/// Returns an error if a config file is unreadable or the result is invalid.
pub fn resolve_options(
    global: &Path,
    local: &Path,
    cli: &OptionOverrides,
) -> Result<SyncOptions> {
    let file = load_overrides(global)?.union(&load_overrides(local)?);
    let options = file.union(cli).apply(SyncOptions::default());
    options.validate()?;
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_match_recommended_values() {
        let options = SyncOptions::default();
        assert_eq!(options.throttle_interval_ms, 16);
        assert_eq!(options.lock_quiet_ms, 200);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_options_parse_camel_case_keys() {
        let json = r#"{ "throttleIntervalMs": 8, "pixelThreshold": 0.5, "useOffload": false }"#;
        let options: SyncOptions = serde_json::from_str(json).unwrap();
        assert_eq!(options.throttle_interval_ms, 8);
        assert_eq!(options.pixel_threshold, 0.5);
        assert!(!options.use_offload);
        assert_eq!(options.lock_quiet_ms, 200);
    }

    #[test]
    fn test_sanitized_repairs_out_of_range_values() {
        let options = SyncOptions {
            pixel_threshold: f64::NAN,
            visibility_margin: -5.0,
            lock_quiet_ms: 0,
            throttle_interval_ms: 40,
            ..SyncOptions::default()
        }
        .sanitized();
        assert!(options.validate().is_ok());
        assert_eq!(options.pixel_threshold, 1.0);
        assert_eq!(options.visibility_margin, 1000.0);
        assert_eq!(options.lock_quiet_ms, 1);
        assert_eq!(options.throttle_interval_ms, 40);
    }

    #[test]
    fn test_validate_rejects_negative_threshold() {
        let options = SyncOptions {
            pixel_threshold: -1.0,
            ..SyncOptions::default()
        };
        let err = options.validate().unwrap_err();
        assert!(err.to_string().contains("pixelThreshold"));
    }

    #[test]
    fn test_validate_rejects_zero_quiet_period() {
        let options = SyncOptions {
            lock_quiet_ms: 0,
            ..SyncOptions::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_union_prefers_other() {
        let file = OptionOverrides {
            throttle_interval_ms: Some(20),
            lock_quiet_ms: Some(300),
            ..OptionOverrides::default()
        };
        let cli = OptionOverrides {
            throttle_interval_ms: Some(8),
            ..OptionOverrides::default()
        };
        let merged = file.union(&cli);
        assert_eq!(merged.throttle_interval_ms, Some(8));
        assert_eq!(merged.lock_quiet_ms, Some(300));
    }

    #[test]
    fn test_save_load_and_clear_overrides() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let overrides = OptionOverrides {
            pixel_threshold: Some(2.5),
            use_offload: Some(false),
            ..OptionOverrides::default()
        };

        save_overrides(&path, &overrides).unwrap();
        let saved = std::fs::read_to_string(&path).unwrap();
        assert!(saved.contains("pixelThreshold"));
        assert!(!saved.contains("lockQuietMs"));
        assert_eq!(load_overrides(&path).unwrap(), overrides);

        clear_overrides(&path).unwrap();
        assert!(!path.exists());
        assert!(load_overrides(&path).unwrap().is_empty());
    }

    #[test]
    fn test_resolve_options_layers_files_and_cli() {
        let dir = tempdir().unwrap();
        let global = dir.path().join("global.json");
        let local = dir.path().join("local.json");
        std::fs::write(&global, r#"{"lockQuietMs": 250, "pixelThreshold": 3.0}"#).unwrap();
        std::fs::write(&local, r#"{"pixelThreshold": 2.0}"#).unwrap();
        let cli = OptionOverrides {
            smoothing_duration_ms: Some(0),
            ..OptionOverrides::default()
        };

        let options = resolve_options(&global, &local, &cli).unwrap();
        assert_eq!(options.lock_quiet_ms, 250);
        assert_eq!(options.pixel_threshold, 2.0);
        assert_eq!(options.smoothing_duration_ms, 0);
        assert_eq!(options.throttle_interval_ms, 16);
    }

    #[test]
    fn test_malformed_config_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = load_overrides(&path).unwrap_err();
        assert!(format!("{err:#}").contains("broken.json"));
    }
}

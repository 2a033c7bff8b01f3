//! TOML-based engine configuration.
//!
//! Stores:
//! - Movement, teleport and chat restrictions for working subjects
//! - Default visibility of the boss bar and title
//! - The template new presets are created from
//! - Named presets available to every subject
//!
//! Configuration is stored at `~/.config/focusfence/config.toml`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::adapters::PresetCatalog;
use crate::error::ConfigError;
use crate::geofence::GeofencePolicy;
use crate::position::SubjectId;
use crate::preset::Preset;

/// Restrictions applied while a subject is in a work interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestrictionsConfig {
    #[serde(default)]
    pub allow_chat: bool,
    /// Hard-block mode: every positional change is cancelled instead of
    /// being handled by the graduated pull-back.
    #[serde(default)]
    pub restrict_movement: bool,
    #[serde(default = "default_max_distance")]
    pub max_distance: f64,
    #[serde(default = "default_pull_back_delay_ms")]
    pub pull_back_delay_ms: u64,
}

/// Initial visual toggles of a new session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayDefaults {
    #[serde(default = "default_true")]
    pub bossbar: bool,
    #[serde(default = "default_true")]
    pub title: bool,
}

/// Engine configuration.
///
/// Serialized to/from TOML at `~/.config/focusfence/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub restrictions: RestrictionsConfig,
    #[serde(default)]
    pub display_defaults: DisplayDefaults,
    /// Durations copied into presets a subject creates.
    #[serde(default = "default_template")]
    pub template: Preset,
    #[serde(default = "default_presets")]
    pub presets: BTreeMap<String, Preset>,
}

// Default functions
fn default_max_distance() -> f64 {
    10.0
}
fn default_pull_back_delay_ms() -> u64 {
    2000
}
fn default_true() -> bool {
    true
}
fn default_template() -> Preset {
    Preset::default().named("")
}
fn default_presets() -> BTreeMap<String, Preset> {
    let mut presets = BTreeMap::new();
    presets.insert("classic".to_string(), Preset::default());
    presets.insert(
        "short".to_string(),
        Preset {
            name: "Short".into(),
            work_minutes: 15,
            break_minutes: 3,
            long_break_minutes: 10,
            cycle_length: 4,
        },
    );
    presets.insert(
        "deep".to_string(),
        Preset {
            name: "Deep Work".into(),
            work_minutes: 50,
            break_minutes: 10,
            long_break_minutes: 30,
            cycle_length: 2,
        },
    );
    presets
}

impl Default for RestrictionsConfig {
    fn default() -> Self {
        Self {
            allow_chat: false,
            restrict_movement: false,
            max_distance: default_max_distance(),
            pull_back_delay_ms: default_pull_back_delay_ms(),
        }
    }
}

impl Default for DisplayDefaults {
    fn default() -> Self {
        Self {
            bossbar: true,
            title: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            restrictions: RestrictionsConfig::default(),
            display_defaults: DisplayDefaults::default(),
            template: default_template(),
            presets: default_presets(),
        }
    }
}

impl Config {
    /// `restrictions.max_distance` -> `/restrictions/max_distance`.
    fn pointer(key: &str) -> Option<String> {
        if key.is_empty() || key.contains(['/', '~']) || key.split('.').any(str::is_empty) {
            return None;
        }
        Some(format!("/{}", key.replace('.', "/")))
    }

    /// Parses `raw` as the same JSON kind as the value it replaces.
    fn coerce(existing: &serde_json::Value, raw: &str) -> Result<serde_json::Value, String> {
        use serde_json::Value;

        match existing {
            Value::Bool(_) => raw.parse().map(Value::Bool).map_err(|e| e.to_string()),
            Value::Number(_) => raw
                .parse::<u64>()
                .ok()
                .map(Value::from)
                .or_else(|| {
                    raw.parse::<f64>()
                        .ok()
                        .and_then(serde_json::Number::from_f64)
                        .map(Value::Number)
                })
                .ok_or_else(|| format!("'{raw}' is not a number")),
            Value::Object(_) | Value::Array(_) => {
                serde_json::from_str(raw).map_err(|e| e.to_string())
            }
            _ => Ok(Value::String(raw.to_string())),
        }
    }

    /// Default location of `config.toml`.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults if the file is missing.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, writing defaults if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed, or if the
    /// default config cannot be written.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Self = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Value at a dot-separated key, strings unquoted.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        match json.pointer(&Self::pointer(key)?)? {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key. Does not save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not fit the
    /// field's type.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let unknown = || ConfigError::UnknownKey(key.to_string());

        let pointer = Self::pointer(key).ok_or_else(unknown)?;
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        let slot = json.pointer_mut(&pointer).ok_or_else(unknown)?;
        *slot = Self::coerce(slot, value).map_err(invalid)?;
        let updated: Self = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Range checks serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let max_distance = self.restrictions.max_distance;
        if !max_distance.is_finite() || max_distance < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "restrictions.max_distance".into(),
                message: format!("{max_distance} is not a non-negative distance"),
            });
        }
        Ok(())
    }

    pub fn geofence_policy(&self) -> GeofencePolicy {
        let delay_ms = i64::try_from(self.restrictions.pull_back_delay_ms).unwrap_or(i64::MAX);
        GeofencePolicy {
            max_distance: self.restrictions.max_distance,
            pull_back_delay: chrono::Duration::milliseconds(delay_ms),
        }
    }

    /// [`Config::load`], falling back to defaults when the file is unusable.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "using default configuration");
            Self::default()
        })
    }
}

impl PresetCatalog for Config {
    /// Configured presets; entries that fail validation are treated as absent.
    fn resolve(&self, _subject: SubjectId, key: &str) -> Option<Preset> {
        let preset = self.presets.get(key)?;
        match preset.validate() {
            Ok(()) => Some(preset.clone()),
            Err(e) => {
                tracing::warn!(preset = key, error = %e, "ignoring invalid configured preset");
                None
            }
        }
    }

    fn keys(&self, _subject: SubjectId) -> Vec<String> {
        self.presets.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
        assert_eq!(parsed.restrictions.pull_back_delay_ms, 2000);
        assert_eq!(parsed.presets["classic"].work_minutes, 25);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [restrictions]
            max_distance = 4.5

            [presets.sprint]
            name = "Sprint"
            work = 10
            break = 2
            long_break = 5
            cycle_length = 3
            "#,
        )
        .unwrap();
        assert_eq!(cfg.restrictions.max_distance, 4.5);
        assert!(!cfg.restrictions.allow_chat);
        assert!(cfg.display_defaults.bossbar);
        assert_eq!(cfg.presets.len(), 1);
        assert_eq!(cfg.presets["sprint"].break_minutes, 2);
    }

    #[test]
    fn get_and_set_by_dot_path() {
        let mut cfg = Config::default();
        assert_eq!(cfg.get("restrictions.max_distance").as_deref(), Some("10.0"));

        cfg.set("restrictions.allow_chat", "true").unwrap();
        assert!(cfg.restrictions.allow_chat);

        cfg.set("restrictions.max_distance", "12.5").unwrap();
        assert_eq!(cfg.restrictions.max_distance, 12.5);

        cfg.set("restrictions.pull_back_delay_ms", "3500").unwrap();
        assert_eq!(cfg.geofence_policy().pull_back_delay, chrono::Duration::milliseconds(3500));
    }

    #[test]
    fn set_rejects_unknown_keys_and_bad_values() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("restrictions.teleport", "true"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            cfg.set("display_defaults.title", "maybe"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(cfg.display_defaults.title);
    }

    #[test]
    fn negative_max_distance_is_rejected() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("restrictions.max_distance", "-5"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(cfg.restrictions.max_distance, 10.0);
        cfg.set("restrictions.max_distance", "0").unwrap();
        assert_eq!(cfg.restrictions.max_distance, 0.0);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[restrictions]\nmax_distance = -3.0\n").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn load_from_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());

        let mut changed = cfg.clone();
        changed.set("display_defaults.bossbar", "false").unwrap();
        changed.save_to(&path).unwrap();
        assert!(!Config::load_from(&path).unwrap().display_defaults.bossbar);
    }

    #[test]
    fn invalid_configured_preset_is_not_resolved() {
        let mut cfg = Config::default();
        cfg.presets.insert(
            "broken".into(),
            Preset {
                name: "Broken".into(),
                work_minutes: 0,
                break_minutes: 5,
                long_break_minutes: 15,
                cycle_length: 4,
            },
        );
        let subject = SubjectId::new();
        assert!(cfg.resolve(subject, "broken").is_none());
        assert!(cfg.resolve(subject, "classic").is_some());
    }
}

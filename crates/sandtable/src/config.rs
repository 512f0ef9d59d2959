//! Runtime configuration for the sandbox core.
//!
//! Loaded from JSON. Every field has a default, so a config file only needs
//! the values it changes. [`SandboxConfig::from_env`] reads the file named by
//! `SANDTABLE_CONFIG` and then applies single-value environment overrides.

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::path::CurveKind;

pub const BUILTIN_SANDBOX_CONFIG: &str = include_str!("data/sandtable_config.json");

/// Path of a JSON config file to load instead of the builtin one.
pub const CONFIG_PATH_ENV: &str = "SANDTABLE_CONFIG";
/// Overrides [`PlaybackConfig::duration_ms`].
pub const PLAYBACK_MS_ENV: &str = "SANDTABLE_PLAYBACK_MS";

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default)]
pub struct SandboxConfig {
    pub playback: PlaybackConfig,
    pub curve: CurveConfig,
    pub storage: StorageConfig,
}

/// Path playback timing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Time to traverse the whole path, start to end.
    pub duration_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self { duration_ms: 5000 }
    }
}

impl PlaybackConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// Path curve construction and sampling.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CurveConfig {
    pub kind: CurveKind,
    /// Only used by [`CurveKind::CatmullRom`].
    pub tension: f32,
    /// Line segments used when sampling the curve for display.
    pub display_segments: usize,
    /// Samples used to approximate arc length.
    pub arc_length_divisions: usize,
}

impl Default for CurveConfig {
    fn default() -> Self {
        Self {
            kind: CurveKind::Centripetal,
            tension: 0.5,
            display_segments: 100,
            arc_length_divisions: 200,
        }
    }
}

/// Key-value persistence naming.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Prepended to every key by [`FileStore`](crate::orbat::FileStore).
    pub prefix: String,
    /// Key the unit forest is saved under.
    pub orbat_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            prefix: "wargame-".to_string(),
            orbat_key: "orbat".to_string(),
        }
    }
}

impl SandboxConfig {
    /// The configuration shipped with the crate.
    pub fn builtin() -> Self {
        match Self::from_json_str(BUILTIN_SANDBOX_CONFIG) {
            Ok(config) => config,
            Err(e) => {
                log::error!("builtin sandbox config failed to parse: {e}");
                Self::default()
            }
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from `SANDTABLE_CONFIG` if set (builtin otherwise), then apply
    /// `SANDTABLE_PLAYBACK_MS`.
    pub fn from_env() -> Result<Self> {
        let mut config = match env::var_os(CONFIG_PATH_ENV) {
            Some(path) => {
                let path = Path::new(&path);
                log::info!("Loading sandbox config from {}", path.display());
                Self::from_file(path)?
            }
            None => Self::builtin(),
        };

        if let Ok(raw) = env::var(PLAYBACK_MS_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.playback.duration_ms = ms,
                Err(_) => log::warn!("Ignoring {PLAYBACK_MS_ENV}={raw:?}: not a whole number of milliseconds"),
            }
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_matches_defaults() {
        assert_eq!(SandboxConfig::builtin(), SandboxConfig::default());
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let config = SandboxConfig::from_json_str(r#"{ "playback": { "duration_ms": 1200 } }"#).unwrap();
        assert_eq!(config.playback.duration(), Duration::from_millis(1200));
        assert_eq!(config.curve, CurveConfig::default());
        assert_eq!(config.storage.prefix, "wargame-");
    }

    #[test]
    fn curve_kind_parses() {
        let config = SandboxConfig::from_json_str(
            r#"{ "curve": { "kind": "catmull_rom", "tension": 0.25 } }"#,
        )
        .unwrap();
        assert_eq!(config.curve.kind, CurveKind::CatmullRom);
        assert_eq!(config.curve.tension, 0.25);
        assert_eq!(config.curve.display_segments, 100);
    }

    #[test]
    fn bad_json_is_an_error() {
        assert!(SandboxConfig::from_json_str("{ not json").is_err());
    }

    #[test]
    fn from_file_reports_path() {
        let dir = std::env::temp_dir().join(format!("sandtable-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("broken.json");
        std::fs::write(&path, "[1, 2").unwrap();

        let err = SandboxConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, Error::Config { ref path, .. } if path.ends_with("broken.json")));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}

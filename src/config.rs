use dirs::config_dir;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::AnimationStyle;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "QUERYLENS_CONFIG";

const CONFIG_FILE: &str = "config.json";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Rendering and narration settings for step generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    pub animation_duration_ms: u64,
    pub animation_style: AnimationStyle,
    /// Cell text used for the missing side of an outer join.
    pub empty_placeholder: String,
    pub coverage_checks: bool,
    /// Narration extras: glossary hints and quiz prompts.
    pub learning_aids: bool,
    /// How many sample pairs a CROSS JOIN step describes.
    pub cross_join_pair_preview: usize,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            animation_duration_ms: 700,
            animation_style: AnimationStyle::Highlight,
            empty_placeholder: "∅".to_string(),
            coverage_checks: true,
            learning_aids: true,
            cross_join_pair_preview: 3,
        }
    }
}

impl VisualizerConfig {
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&content)?;
        info!(
            "Loaded visualizer config from {}: animation_duration_ms={}, \
             coverage_checks={}, learning_aids={}",
            path.display(),
            config.animation_duration_ms,
            config.coverage_checks,
            config.learning_aids
        );
        Ok(config)
    }

    /// Resolves the config file from `.env`/environment, then the user config
    /// directory. Missing or broken files fall back to defaults.
    pub fn load() -> Self {
        dotenv::dotenv().ok();
        let path = match std::env::var_os(CONFIG_ENV_VAR) {
            Some(p) => PathBuf::from(p),
            None => match default_config_path() {
                Some(p) if p.exists() => p,
                _ => return Self::default(),
            },
        };
        match Self::from_path(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("{}, using default visualizer config", e);
                Self::default()
            }
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    let mut path = config_dir()?;
    path.push("querylens");
    path.push(CONFIG_FILE);
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = VisualizerConfig::from_json_str(r#"{"animation_duration_ms": 250}"#).unwrap();
        assert_eq!(config.animation_duration_ms, 250);
        assert_eq!(config.empty_placeholder, "∅");
        assert!(config.coverage_checks);
    }

    #[test]
    fn malformed_json_is_an_error() {
        let err = VisualizerConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    // The only test that touches QUERYLENS_CONFIG.
    #[test]
    fn load_follows_env_override_and_falls_back() {
        let dir = tempfile::tempdir().expect("tempdir");

        let good = dir.path().join("override.json");
        let content = r#"{"animation_duration_ms": 120, "learning_aids": false}"#;
        std::fs::write(&good, content).expect("write");
        unsafe {
            std::env::set_var(CONFIG_ENV_VAR, &good);
        }
        let config = VisualizerConfig::load();
        assert_eq!(config.animation_duration_ms, 120);
        assert!(!config.learning_aids);
        assert!(config.coverage_checks);

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{ animation_duration_ms: ").expect("write");
        unsafe {
            std::env::set_var(CONFIG_ENV_VAR, &broken);
        }
        assert_eq!(VisualizerConfig::load(), VisualizerConfig::default());

        unsafe {
            std::env::set_var(CONFIG_ENV_VAR, dir.path().join("missing.json"));
        }
        assert_eq!(VisualizerConfig::load(), VisualizerConfig::default());

        unsafe {
            std::env::remove_var(CONFIG_ENV_VAR);
        }
    }

    #[test]
    fn missing_file_reports_path() {
        let err = VisualizerConfig::from_path(Path::new("/definitely/missing/querylens.json"))
            .unwrap_err();
        assert!(err.to_string().contains("querylens.json"));
    }
}

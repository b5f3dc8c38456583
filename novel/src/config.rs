use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Settings read from `config.toml`; every field is optional in the file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Device pixels per point.
    pub density: f32,
    pub log_level: String,
    pub state_path: Option<PathBuf>,
    pub load_timeout_secs: u64,
    pub heading_pattern: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            viewport_width: 1000,
            viewport_height: 1600,
            density: 1.0,
            log_level: "warn".to_string(),
            state_path: None,
            load_timeout_secs: 30,
            heading_pattern: None,
        }
    }
}

impl AppConfig {
    /// Reads `path` if given, otherwise the platform `config.toml`. A missing
    /// default file yields the defaults; an explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match novel_core::config::config_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = AppConfig::parse("").expect("parses");
        assert_eq!(cfg.viewport_width, 1000);
        assert_eq!(cfg.log_level, "warn");
        assert!(cfg.state_path.is_none());
    }

    #[test]
    fn overrides_selected_fields() {
        let cfg = AppConfig::parse(
            "viewport_width = 720\ndensity = 2.0\nstate_path = \"/tmp/state.json\"\n",
        )
        .expect("parses");
        assert_eq!(cfg.viewport_width, 720);
        assert_eq!(cfg.viewport_height, 1600);
        assert_eq!(cfg.density, 2.0);
        assert_eq!(cfg.state_path, Some(PathBuf::from("/tmp/state.json")));
    }

    #[test]
    fn rejects_wrong_types() {
        assert!(AppConfig::parse("viewport_width = \"wide\"").is_err());
    }

    #[test]
    fn loads_explicit_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "log_level = \"debug\"\nload_timeout_secs = 5\n").expect("write");
        let cfg = AppConfig::load(Some(&path)).expect("loads");
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.load_timeout_secs, 5);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(AppConfig::load(Some(&dir.path().join("absent.toml"))).is_err());
    }
}

//! Optional per-project configuration: `<base>/.seam/config.toml`.
//!
//! All fields use `#[serde(default)]` so a partial file is fine. CLI flags
//! always win over file values.

use std::path::Path;

use anyhow::{Context, Result};
use seam_engine::CONTROL_DIR;
use serde::Deserialize;

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct SeamConfig {
    pub validation: ValidationConfig,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Shell command run after every apply; non-zero exit rolls back.
    pub command: Option<String>,
    /// Wall-clock limit for the command, in seconds.
    pub timeout_secs: Option<u64>,
}

impl SeamConfig {
    /// Load the project config, or defaults when no file exists.
    pub fn load(base: &Path) -> Result<Self> {
        let path = base.join(CONTROL_DIR).join("config.toml");
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempdir().unwrap();
        let config = SeamConfig::load(dir.path()).unwrap();
        assert!(config.validation.command.is_none());
        assert!(config.validation.timeout_secs.is_none());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".seam")).unwrap();
        std::fs::write(
            dir.path().join(".seam/config.toml"),
            "[validation]\ncommand = \"pytest\"\n",
        )
        .unwrap();

        let config = SeamConfig::load(dir.path()).unwrap();
        assert_eq!(config.validation.command.as_deref(), Some("pytest"));
        assert!(config.validation.timeout_secs.is_none());
    }

    #[test]
    fn test_load_invalid_toml_errors() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".seam")).unwrap();
        std::fs::write(dir.path().join(".seam/config.toml"), "not toml [[").unwrap();
        assert!(SeamConfig::load(dir.path()).is_err());
    }
}

//! Project configuration (`.manabuild.json`).

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Config file looked up in the project directory.
pub const CONFIG_FILE_NAME: &str = ".manabuild.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    /// Name of the binary to build
    #[serde(default)]
    pub target_binary_name: Option<String>,
}

/// A config file that was found and parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedConfig {
    pub path: PathBuf,
    pub config: ProjectConfig,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Load `.manabuild.json` from `project_dir`. A missing file is `Ok(None)`.
pub fn load(project_dir: &Path) -> Result<Option<LoadedConfig>, ConfigError> {
    let path = project_dir.join(CONFIG_FILE_NAME);
    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(ConfigError::Read { path, source }),
    };
    let config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.clone(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "loaded project config");
    Ok(Some(LoadedConfig { path, config }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_config() {
        let dir = tempdir().unwrap();
        assert_eq!(load(dir.path()).unwrap(), None);
    }

    #[test]
    fn test_load_config() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{"targetBinaryName": "mquery-sru"}"#,
        )
        .unwrap();

        let loaded = load(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.path, dir.path().join(CONFIG_FILE_NAME));
        assert_eq!(loaded.config.target_binary_name.as_deref(), Some("mquery-sru"));
    }

    #[test]
    fn test_empty_object_is_valid() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "{}").unwrap();
        let loaded = load(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.config, ProjectConfig::default());
    }

    #[test]
    fn test_malformed_config() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "{targetBinaryName:").unwrap();
        let err = load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(CONFIG_FILE_NAME));
    }
}

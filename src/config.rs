use crate::errors::RefactorError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Number of state transitions buffered per subscriber before it lags
    pub state_channel_capacity: usize,
    /// Number of errors buffered per error-stream subscriber
    pub error_channel_capacity: usize,
    /// Grammar scopes served by the built-in word rename provider
    pub word_rename_scopes: Vec<String>,
    /// Priority of the built-in word rename provider
    pub word_rename_priority: i32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            state_channel_capacity: 64,
            error_channel_capacity: 64,
            word_rename_scopes: vec![
                "text.plain".to_string(),
                "text.plain.null-grammar".to_string(),
            ],
            word_rename_priority: 0,
        }
    }
}

impl StoreConfig {
    /// Default location of the user configuration file (`~/.refactorizer/config.yaml`)
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".refactorizer")
            .join("config.yaml")
    }

    /// Load a configuration from a YAML file. Missing keys fall back to defaults.
    pub fn load(path: &Path) -> Result<Self, RefactorError> {
        let content = std::fs::read_to_string(path)?;
        let config: StoreConfig = serde_yaml::from_str(&content)?;
        if config.state_channel_capacity == 0 || config.error_channel_capacity == 0 {
            return Err(RefactorError::Config(
                "channel capacities must be greater than zero".to_string(),
            ));
        }
        Ok(config)
    }

    /// Load `path` if it exists, otherwise return the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, RefactorError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "error_channel_capacity: 8\n").unwrap();

        let config = StoreConfig::load(&path).unwrap();
        assert_eq!(config.error_channel_capacity, 8);
        assert_eq!(config.state_channel_capacity, 64);
        assert_eq!(config.word_rename_scopes.len(), 2);
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "state_channel_capacity: 0\n").unwrap();

        let result = StoreConfig::load(&path);
        assert!(matches!(result, Err(RefactorError::Config(_))));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig::load_or_default(&temp_dir.path().join("nope.yaml")).unwrap();
        assert_eq!(config, StoreConfig::default());
    }
}

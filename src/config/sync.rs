//! Remote sync settings.
//!
//! Values come from the `[sync]` table of config.toml. The environment
//! variables `ATTENDANCE_INSTALLATION_ID` and `ATTENDANCE_SYNC_DIR` take
//! precedence when set, so a deployment can point at a different remote
//! without editing the file.

use serde::Deserialize;
use std::path::PathBuf;

/// Settings for the optional remote document store
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SyncConfig {
    /// Per-installation identifier the remote documents are filed under
    pub installation_id: Option<String>,
    /// Root directory of a directory-backed remote store
    pub directory: Option<PathBuf>,
}

impl SyncConfig {
    /// Applies environment overrides on top of the file values.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(id) = std::env::var("ATTENDANCE_INSTALLATION_ID") {
            self.installation_id = Some(id);
        }
        if let Ok(dir) = std::env::var("ATTENDANCE_SYNC_DIR") {
            self.directory = Some(PathBuf::from(dir));
        }
        self
    }

    /// Remote sync runs only with both an installation id and a target directory.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.installation_id
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty())
            && self.directory.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_without_installation_id() {
        let config = SyncConfig {
            installation_id: None,
            directory: Some(PathBuf::from("/tmp/remote")),
        };
        assert!(!config.is_enabled());
    }

    #[test]
    fn test_disabled_with_blank_installation_id() {
        let config = SyncConfig {
            installation_id: Some("   ".to_string()),
            directory: Some(PathBuf::from("/tmp/remote")),
        };
        assert!(!config.is_enabled());
    }

    #[test]
    fn test_enabled_with_both_values() {
        let config = SyncConfig {
            installation_id: Some("school-1".to_string()),
            directory: Some(PathBuf::from("/tmp/remote")),
        };
        assert!(config.is_enabled());
    }
}

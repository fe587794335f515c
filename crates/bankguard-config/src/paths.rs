//! Path utilities and XDG directory discovery

use crate::ConfigError;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// XDG-compliant paths for bankguard
pub struct Paths {
    project_dirs: Option<ProjectDirs>,
}

impl Paths {
    /// Create a new Paths instance with XDG discovery
    pub fn new() -> Self {
        Self {
            project_dirs: ProjectDirs::from("com", "Bankguard", "bankguard"),
        }
    }

    /// Get user config directory (~/.config/bankguard/)
    pub fn user_config_dir(&self) -> Result<PathBuf, ConfigError> {
        self.project_dirs
            .as_ref()
            .map(|p| p.config_dir().to_path_buf())
            .ok_or_else(|| {
                ConfigError::XdgError("Failed to determine user config directory".to_string())
            })
    }

    /// Get user config file path (~/.config/bankguard/config.toml)
    pub fn user_config_file(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.user_config_dir()?.join("config.toml"))
    }

    /// Get project config file path (bankguard.toml)
    pub fn project_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join("bankguard.toml")
    }

    /// Get local config file path (bankguard.local.toml, gitignored)
    pub fn local_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join("bankguard.local.toml")
    }

    /// Config files that exist under `project_dir`, lowest precedence first.
    pub fn existing_project_files(project_dir: impl AsRef<Path>) -> Vec<PathBuf> {
        let project_dir = project_dir.as_ref();
        [
            Self::project_config_file(project_dir),
            Self::local_config_file(project_dir),
        ]
        .into_iter()
        .filter(|path| path.exists())
        .collect()
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_xdg_paths() {
        let paths = Paths::new();

        // Paths vary by platform; only check the application name
        if let Ok(config_file) = paths.user_config_file() {
            assert!(config_file.to_string_lossy().contains("bankguard"));
            assert!(config_file.ends_with("config.toml"));
        }
    }

    #[test]
    fn test_project_paths() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        let config_file = Paths::project_config_file(project_dir);
        assert_eq!(config_file, project_dir.join("bankguard.toml"));

        let local_file = Paths::local_config_file(project_dir);
        assert_eq!(local_file, project_dir.join("bankguard.local.toml"));

        assert!(Paths::existing_project_files(project_dir).is_empty());

        std::fs::write(&local_file, "[logging]\nlevel = \"debug\"\n").unwrap();
        std::fs::write(&config_file, "[logging]\nlevel = \"info\"\n").unwrap();
        assert_eq!(
            Paths::existing_project_files(project_dir),
            vec![config_file, local_file]
        );
    }
}

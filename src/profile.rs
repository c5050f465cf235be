use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

/// Per-install locations for settings, key-value storage and logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl Profile {
    /// Uses `dir` for everything when given, the platform's project
    /// directories otherwise.
    pub fn resolve(dir: Option<PathBuf>) -> Result<Self> {
        if let Some(dir) = dir {
            return Ok(Profile::single(dir));
        }
        let dirs = ProjectDirs::from("", "", "notefile").context("locating profile directories")?;
        Ok(Profile {
            config_dir: dirs.config_dir().to_path_buf(),
            data_dir: dirs.data_dir().to_path_buf(),
        })
    }

    pub fn single(dir: PathBuf) -> Self {
        Profile {
            config_dir: dir.clone(),
            data_dir: dir,
        }
    }

    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }

    pub fn storage_file(&self) -> PathBuf {
        self.data_dir.join("storage.json")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

/// Expands a leading `~` to the user's home directory.
pub fn expand_home(input: &str) -> PathBuf {
    let home = || directories::UserDirs::new().map(|d| d.home_dir().to_path_buf());
    if input == "~" {
        if let Some(home) = home() {
            return home;
        }
    } else if let Some(rest) = input.strip_prefix("~/") {
        if let Some(home) = home() {
            return home.join(rest);
        }
    }
    PathBuf::from(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_directory_profile_layout() {
        let profile = Profile::resolve(Some(PathBuf::from("/srv/notes"))).unwrap();
        assert_eq!(profile.settings_file(), PathBuf::from("/srv/notes/settings.json"));
        assert_eq!(profile.storage_file(), PathBuf::from("/srv/notes/storage.json"));
        assert_eq!(profile.log_dir(), PathBuf::from("/srv/notes/logs"));
    }

    #[test]
    fn plain_paths_are_not_expanded() {
        assert_eq!(expand_home("notes.json"), PathBuf::from("notes.json"));
        assert_eq!(expand_home("/a/~/b"), PathBuf::from("/a/~/b"));
    }
}

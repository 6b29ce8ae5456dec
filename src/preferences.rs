//! User preferences stored as TOML.
//!
//! Lives at `<config dir>/sheetplay/preferences.toml`. A missing file means
//! defaults.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use sheetplay_core::DEFAULT_BROADCAST_PORT;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const APP_DIR: &str = "sheetplay";
const FILE_NAME: &str = "preferences.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Directory holding the compiler executable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bin_path: Option<PathBuf>,
    pub broadcast_port: u16,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            bin_path: None,
            broadcast_port: DEFAULT_BROADCAST_PORT,
        }
    }
}

impl Preferences {
    /// Default location, or `None` if no config directory can be determined.
    pub fn default_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join(APP_DIR).join(FILE_NAME))
    }

    /// Load from the default location.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No preferences at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(Error::Io(e)),
        };
        toml::from_str(&text).map_err(|e| Error::Preferences(format!("{}: {e}", path.display())))
    }

    /// Save to the default location.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path()
            .ok_or_else(|| Error::Preferences("no config directory".into()))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(self).map_err(|e| Error::Preferences(e.to_string()))?;
        fs::write(path, text)?;
        debug!("Saved preferences to {}", path.display());
        Ok(())
    }
}

fn config_dir() -> Option<PathBuf> {
    if let Some(dir) = env::var_os("XDG_CONFIG_HOME").filter(|d| !d.is_empty()) {
        return Some(PathBuf::from(dir));
    }
    if cfg!(windows) {
        if let Some(dir) = env::var_os("APPDATA") {
            return Some(PathBuf::from(dir));
        }
    }
    env::var_os("HOME").map(|home| PathBuf::from(home).join(".config"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = Preferences::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(prefs, Preferences::default());
        assert_eq!(prefs.broadcast_port, 7935);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(FILE_NAME);
        let prefs = Preferences {
            bin_path: Some("/opt/sheetc/bin".into()),
            broadcast_port: 9000,
        };
        prefs.save_to(&path).unwrap();
        assert_eq!(Preferences::load_from(&path).unwrap(), prefs);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FILE_NAME);
        fs::write(&path, "bin_path = \"/usr/bin\"\n").unwrap();
        let prefs = Preferences::load_from(&path).unwrap();
        assert_eq!(prefs.bin_path, Some(PathBuf::from("/usr/bin")));
        assert_eq!(prefs.broadcast_port, DEFAULT_BROADCAST_PORT);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FILE_NAME);
        fs::write(&path, "broadcast_port = \"loud\"").unwrap();
        assert!(matches!(
            Preferences::load_from(&path),
            Err(Error::Preferences(_))
        ));
    }
}

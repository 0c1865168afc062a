//! Runtime settings and configuration directory lookup
//!
//! `settings.yaml` (or `.yml`/`.json`) sits next to the other documents and
//! is optional; every field has a default.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::{find_document, read_document, ConfigError};
use crate::dataset::GeneratorSettings;
use crate::shell::Shell;

/// Environment variable naming the configuration directory
pub const CONFIG_DIR_ENV: &str = "WHISPERA_CONFIG_DIR";

/// The `shell` setting: a fixed dialect, or `auto` to follow `$SHELL`
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ShellSetting {
    #[default]
    Auto,
    Posix,
    Fish,
}

impl ShellSetting {
    pub fn resolve(self) -> Shell {
        match self {
            ShellSetting::Auto => Shell::from_env(),
            ShellSetting::Posix => Shell::Posix,
            ShellSetting::Fish => Shell::Fish,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub shell: ShellSetting,
    pub generator: GeneratorSettings,
}

impl Settings {
    /// Load `settings` from `dir`, or defaults if there is none
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        match find_document(dir.as_ref(), "settings") {
            Some(path) => read_document(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn shell(&self) -> Shell {
        self.shell.resolve()
    }
}

/// Pick the configuration directory.
///
/// An explicit path (flag or `WHISPERA_CONFIG_DIR`) wins; then `./config`
/// if it exists; then the platform config directory (`~/.config/whispera`).
pub fn resolve_config_dir(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir;
    }
    let local = PathBuf::from("config");
    if local.is_dir() {
        return local;
    }
    dirs::config_dir()
        .map(|d| d.join("whispera"))
        .unwrap_or(local)
}

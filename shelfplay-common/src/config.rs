//! Configuration file and data folder resolution
//!
//! Resolution order for the bootstrap TOML file:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Platform config directory (`<config_dir>/shelfplay/shelfplay.toml`)
//!
//! A missing config file is not an error; callers fall back to built-in
//! defaults.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name looked up in the platform config directory
pub const CONFIG_FILE_NAME: &str = "shelfplay.toml";

/// Locate the bootstrap config file
///
/// Returns `None` when no candidate exists on disk.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: platform config directory
    let candidate = dirs::config_dir().map(|d| d.join("shelfplay").join(CONFIG_FILE_NAME))?;
    if candidate.exists() {
        Some(candidate)
    } else {
        debug!("No config file at {}", candidate.display());
        None
    }
}

/// Parse a TOML file into `T`
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Invalid TOML in {}: {}", path.display(), e)))
}

/// Parse a TOML file, falling back to `T::default()` when absent or invalid
///
/// Invalid files are logged, never fatal.
pub fn load_toml_or_default<T: DeserializeOwned + Default>(path: Option<&Path>) -> T {
    let Some(path) = path else {
        return T::default();
    };
    match load_toml(path) {
        Ok(config) => config,
        Err(e) => {
            warn!("Using default configuration: {}", e);
            T::default()
        }
    }
}

/// OS-dependent default data folder (holds the SQLite database)
pub fn default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("shelfplay"))
        .unwrap_or_else(|| PathBuf::from("./shelfplay_data"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Sample {
        #[serde(default)]
        port: u16,
        #[serde(default)]
        name: Option<String>,
    }

    #[test]
    fn test_cli_argument_wins() {
        let path = PathBuf::from("/tmp/explicit.toml");
        let resolved = resolve_config_path(Some(&path), "SHELFPLAY_TEST_UNUSED_VAR");
        assert_eq!(resolved, Some(path));
    }

    #[test]
    fn test_load_toml_parses_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 6000\nname = \"den\"").unwrap();

        let parsed: Sample = load_toml(file.path()).unwrap();
        assert_eq!(parsed.port, 6000);
        assert_eq!(parsed.name.as_deref(), Some("den"));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = [not toml").unwrap();

        let err = load_toml::<Sample>(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_missing_file_falls_back_to_default() {
        let missing = PathBuf::from("/definitely/not/here/shelfplay.toml");
        let parsed: Sample = load_toml_or_default(Some(&missing));
        assert_eq!(parsed, Sample::default());

        let parsed: Sample = load_toml_or_default(None);
        assert_eq!(parsed, Sample::default());
    }

    #[test]
    fn test_default_data_folder_is_named() {
        let folder = default_data_folder();
        assert!(folder.to_string_lossy().contains("shelfplay"));
    }
}

//! Configuration loading for the Pantograph CLI.
//!
//! An explicit `--config` path must exist and parse; without one, the
//! platform configuration directory is consulted and silently skipped when
//! absent.

use std::fs;
use std::path::PathBuf;

use directories::ProjectDirs;
use log::debug;

use pantograph::config::AppConfig;

use crate::CliError;

/// Loads the application configuration.
///
/// # Errors
///
/// Returns `CliError` when an explicitly requested file cannot be read or
/// does not parse as TOML.
pub fn load_config(path: Option<&String>) -> Result<AppConfig, CliError> {
    if let Some(path) = path {
        debug!(path = path.as_str(); "Loading configuration");
        let raw = fs::read_to_string(path)?;
        return toml::from_str(&raw).map_err(|err| CliError::Config(format!("{path}: {err}")));
    }

    if let Some(default_path) = default_config_path()
        && default_path.exists()
    {
        debug!(path:? = default_path; "Loading default configuration");
        let raw = fs::read_to_string(&default_path)?;
        return toml::from_str(&raw)
            .map_err(|err| CliError::Config(format!("{}: {err}", default_path.display())));
    }

    Ok(AppConfig::default())
}

fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "pantographworks", "pantograph")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn explicit_config_is_parsed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[layout]\ncolumn_width = 240.0\n\n[report]\nhide = [\"note\"]"
        )
        .unwrap();
        let path = file.path().to_string_lossy().to_string();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.report().hidden_kinds(), ["note".to_string()]);
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let path = "definitely/not/here.toml".to_string();
        assert!(matches!(load_config(Some(&path)), Err(CliError::Io(_))));
    }

    #[test]
    fn malformed_explicit_config_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not [valid toml").unwrap();
        let path = file.path().to_string_lossy().to_string();

        assert!(matches!(load_config(Some(&path)), Err(CliError::Config(_))));
    }
}

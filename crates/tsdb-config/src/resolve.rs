//! Settings file resolution and loading.
//!
//! Resolution order: CLI argument → environment variable → XDG config →
//! system config → built-in defaults. Individual `TSDB_*` variables are
//! applied on top of whichever source won.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::settings::StoreSettings;
use crate::validate::ValidationResult;

/// Where the settings file was found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicitly provided via CLI argument.
    CliArgument,

    /// Set via environment variable.
    Environment,

    /// Found in XDG config directory.
    XdgConfig,

    /// Found in /etc/tsdb-logstore/.
    SystemConfig,

    /// No file; built-in defaults only.
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::XdgConfig => write!(f, "XDG config"),
            ConfigSource::SystemConfig => write!(f, "system config"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

/// Environment variable naming the settings file.
pub const ENV_CONFIG_PATH: &str = "TSDB_LOGSTORE_CONFIG";

/// Standard settings file name.
pub const SETTINGS_FILENAME: &str = "logstore.toml";

/// Application name for XDG directories.
const APP_NAME: &str = "tsdb-logstore";

/// Resolve the settings file path.
pub fn resolve_settings_path(cli_path: Option<&Path>) -> (Option<PathBuf>, ConfigSource) {
    // 1. CLI argument
    if let Some(path) = cli_path {
        if path.exists() {
            return (Some(path.to_path_buf()), ConfigSource::CliArgument);
        }
    }

    // 2. Environment variable
    if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return (Some(path), ConfigSource::Environment);
        }
    }

    // 3. XDG config directory
    if let Some(dir) = xdg_config_dir() {
        let path = dir.join(SETTINGS_FILENAME);
        if path.exists() {
            return (Some(path), ConfigSource::XdgConfig);
        }
    }

    // 4. System config
    let system_path = system_config_dir().join(SETTINGS_FILENAME);
    if system_path.exists() {
        return (Some(system_path), ConfigSource::SystemConfig);
    }

    (None, ConfigSource::BuiltinDefault)
}

/// Resolve, load, and apply `TSDB_*` environment overrides.
///
/// A CLI path that does not exist is an error rather than a silent fallback.
pub fn load_settings(cli_path: Option<&Path>) -> ValidationResult<(StoreSettings, ConfigSource)> {
    load_settings_with(cli_path, |var| std::env::var(var).ok())
}

/// [`load_settings`] with an explicit variable lookup.
pub fn load_settings_with<F>(
    cli_path: Option<&Path>,
    lookup: F,
) -> ValidationResult<(StoreSettings, ConfigSource)>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = cli_path {
        if !path.exists() {
            return Err(crate::ValidationError::IoError(format!(
                "settings file not found: {}",
                path.display()
            )));
        }
    }

    let (path, source) = resolve_settings_path(cli_path);
    let mut settings = match &path {
        Some(p) => StoreSettings::from_file(p)?,
        None => StoreSettings::default(),
    };
    settings.apply_overrides(lookup)?;

    debug!(
        source = %source,
        path = ?path,
        "settings loaded"
    );
    Ok((settings, source))
}

/// Get the XDG config directory for the log store.
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Get the system config directory.
pub fn system_config_dir() -> PathBuf {
    PathBuf::from("/etc").join(APP_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_source_display() {
        assert_eq!(format!("{}", ConfigSource::CliArgument), "CLI argument");
        assert_eq!(
            format!("{}", ConfigSource::Environment),
            "environment variable"
        );
        assert_eq!(
            format!("{}", ConfigSource::BuiltinDefault),
            "builtin default"
        );
    }

    #[test]
    fn test_cli_path_wins() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "host = \"cli-host\"\n").unwrap();

        let (resolved, source) = resolve_settings_path(Some(&path));
        assert_eq!(resolved.as_deref(), Some(path.as_path()));
        assert_eq!(source, ConfigSource::CliArgument);
    }

    #[test]
    fn test_missing_cli_path_is_error() {
        let err = load_settings_with(Some(Path::new("/nonexistent/logstore.toml")), |_| None)
            .unwrap_err();
        assert!(matches!(err, crate::ValidationError::IoError(_)));
    }

    #[test]
    fn test_load_file_then_overrides() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("logstore.toml");
        std::fs::write(
            &path,
            "host = \"file-host\"\npassword = \"pw\"\ndbtable = \"audit_events\"\n",
        )
        .unwrap();

        let (settings, source) = load_settings_with(Some(&path), |var| {
            (var == "TSDB_HOST").then(|| "env-host".to_string())
        })
        .unwrap();
        assert_eq!(source, ConfigSource::CliArgument);
        assert_eq!(settings.host.as_deref(), Some("env-host"));
        assert_eq!(settings.dbtable.as_deref(), Some("audit_events"));
    }

    #[test]
    fn test_system_config_dir() {
        assert_eq!(system_config_dir(), PathBuf::from("/etc/tsdb-logstore"));
    }
}

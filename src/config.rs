//! Optional config file loading. Search order: ./kepub.toml, then
//! $XDG_CONFIG_HOME/kepub/config.toml (or ~/.config/kepub/config.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file contents. All fields optional; only present keys override defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Config {
    /// HTTP User-Agent header.
    pub user_agent: Option<String>,
    /// Whole-request timeout in seconds (0 disables).
    pub timeout_secs: Option<u64>,
    /// Connect timeout in seconds (0 disables).
    pub connect_timeout_secs: Option<u64>,
    /// Redirects to follow before giving up.
    pub max_redirects: Option<usize>,
    /// Extra PEM bundle of trusted CA certificates.
    pub ca_file: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot determine current directory: {0}")]
    CurrentDir(std::io::Error),

    #[error("Cannot read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Search order: (1) ./kepub.toml, (2) $XDG_CONFIG_HOME/kepub/config.toml.
/// Missing file returns Ok(None). Invalid TOML or I/O error reading a present file returns Err.
pub fn load_config() -> Result<Option<Config>, ConfigError> {
    let cwd = std::env::current_dir().map_err(ConfigError::CurrentDir)?;
    let mut paths = vec![cwd.join("kepub.toml")];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join("kepub").join("config.toml"));
    }
    load_first(&paths)
}

/// Load the first existing file in `paths`.
pub fn load_first(paths: &[PathBuf]) -> Result<Option<Config>, ConfigError> {
    match paths.iter().find(|p| p.exists()) {
        Some(path) => load_file(path).map(Some),
        None => Ok(None),
    }
}

fn load_file(path: &Path) -> Result<Config, ConfigError> {
    let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: Config = toml::from_str(&s).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_config() {
        let c: Config = toml::from_str("").unwrap();
        assert!(c.user_agent.is_none());
        assert!(c.timeout_secs.is_none());
        assert!(c.connect_timeout_secs.is_none());
        assert!(c.max_redirects.is_none());
        assert!(c.ca_file.is_none());
    }

    #[test]
    fn parse_full_config() {
        let s = r#"
            user_agent = "Custom/1.0"
            timeout_secs = 120
            connect_timeout_secs = 10
            max_redirects = 3
            ca_file = "/etc/ssl/certs/extra.pem"
        "#;
        let c: Config = toml::from_str(s).unwrap();
        assert_eq!(c.user_agent.as_deref(), Some("Custom/1.0"));
        assert_eq!(c.timeout_secs, Some(120));
        assert_eq!(c.connect_timeout_secs, Some(10));
        assert_eq!(c.max_redirects, Some(3));
        assert_eq!(
            c.ca_file.as_deref(),
            Some(Path::new("/etc/ssl/certs/extra.pem"))
        );
    }

    #[test]
    fn invalid_toml_errors() {
        assert!(toml::from_str::<Config>("timeout_secs = [").is_err());
    }

    #[test]
    fn load_first_skips_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("kepub.toml");
        let present = dir.path().join("config.toml");
        std::fs::write(&present, "timeout_secs = 7").unwrap();
        let c = load_first(&[missing, present]).unwrap().unwrap();
        assert_eq!(c.timeout_secs, Some(7));
    }

    #[test]
    fn load_first_none_when_nothing_exists() {
        let dir = tempfile::tempdir().unwrap();
        let c = load_first(&[dir.path().join("kepub.toml")]).unwrap();
        assert!(c.is_none());
    }

    #[test]
    fn load_first_reports_parse_error_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kepub.toml");
        std::fs::write(&path, "max_redirects = \"many\"").unwrap();
        let err = load_first(&[path.clone()]).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(&path.display().to_string()));
    }
}

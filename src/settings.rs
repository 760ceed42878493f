use std::path::PathBuf;

use axum::http::{HeaderValue, Method};
use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

#[derive(thiserror::Error, Debug)]
pub enum StartupError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Process-wide settings, read once from the environment at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// `YTDLP_PATH`
    #[serde(default)]
    pub ytdlp_path: Option<String>,

    /// `PORT`
    #[serde(default = "default_port")]
    pub port: u16,

    /// `CORS_ORIGIN`, comma separated
    #[serde(default)]
    pub cors_origin: Option<String>,

    /// `YTDLP_BIN_DIR`
    #[serde(default = "default_bin_dir", rename = "ytdlp_bin_dir")]
    pub bin_dir: PathBuf,

    /// `DOWNLOADS_DIR`
    #[serde(default = "default_downloads_dir")]
    pub downloads_dir: PathBuf,
}

fn default_port() -> u16 {
    4000
}

fn default_bin_dir() -> PathBuf {
    PathBuf::from("bin")
}

fn default_downloads_dir() -> PathBuf {
    PathBuf::from("downloads")
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            ytdlp_path: None,
            port: default_port(),
            cors_origin: None,
            bin_dir: default_bin_dir(),
            downloads_dir: default_downloads_dir(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_environment(Environment::default())
    }

    fn from_environment(environment: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(environment.ignore_empty(true))
            .build()?
            .try_deserialize()
    }

    pub fn allowed_origins(&self) -> Vec<String> {
        self.cors_origin
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(String::from)
            .collect()
    }

    pub fn cors_layer(&self) -> CorsLayer {
        let origins: Vec<HeaderValue> = self
            .allowed_origins()
            .into_iter()
            .filter_map(|origin| match HeaderValue::from_str(&origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("Ignoring unusable CORS origin: {}", origin);
                    None
                }
            })
            .collect();

        let layer = CorsLayer::new()
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any);

        if origins.is_empty() {
            info!("CORS: allowing any origin");
            layer.allow_origin(Any)
        } else {
            info!("CORS: allowing origins {:?}", origins);
            layer.allow_origin(AllowOrigin::list(origins))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let source: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::default().source(Some(source))
    }

    #[test]
    fn defaults_apply_to_empty_environment() {
        let settings = Settings::from_environment(env(&[])).unwrap();

        assert_eq!(settings.port, 4000);
        assert_eq!(settings.ytdlp_path, None);
        assert_eq!(settings.bin_dir, PathBuf::from("bin"));
        assert_eq!(settings.downloads_dir, PathBuf::from("downloads"));
        assert!(settings.allowed_origins().is_empty());
    }

    #[test]
    fn reads_overrides_from_environment() {
        let settings = Settings::from_environment(env(&[
            ("YTDLP_PATH", "/usr/local/bin/yt-dlp"),
            ("PORT", "8123"),
            ("CORS_ORIGIN", "http://localhost:3000, https://example.com ,,"),
            ("YTDLP_BIN_DIR", "/srv/tubegate/bin"),
            ("DOWNLOADS_DIR", "/srv/tubegate/downloads"),
        ]))
        .unwrap();

        assert_eq!(settings.ytdlp_path.as_deref(), Some("/usr/local/bin/yt-dlp"));
        assert_eq!(settings.port, 8123);
        assert_eq!(settings.bin_dir, PathBuf::from("/srv/tubegate/bin"));
        assert_eq!(settings.downloads_dir, PathBuf::from("/srv/tubegate/downloads"));
        assert_eq!(
            settings.allowed_origins(),
            vec!["http://localhost:3000", "https://example.com"]
        );
    }

    #[test]
    fn empty_values_are_treated_as_unset() {
        let settings = Settings::from_environment(env(&[("YTDLP_PATH", ""), ("CORS_ORIGIN", "")])).unwrap();

        assert_eq!(settings.ytdlp_path, None);
        assert!(settings.allowed_origins().is_empty());
    }

    #[test]
    fn rejects_non_numeric_port() {
        assert!(Settings::from_environment(env(&[("PORT", "not-a-port")])).is_err());
    }
}

use directories::ProjectDirs;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no home directory to place the config file in")]
    NoConfigDir,
    #[error("failed to access config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to serialize default config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid server URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Delays for the UI wind-down after an attempt ends, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// Pause between "Complete!" and the download link appearing.
    pub link_reveal_delay_ms: u64,
    /// After the link appears, how long the progress bar stays.
    pub progress_hide_delay_ms: u64,
    /// After the link appears, how long the preview stays.
    pub preview_hide_delay_ms: u64,
    /// How long a failure stays on screen before progress and preview reset.
    pub failure_reset_delay_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            link_reveal_delay_ms: 1000,
            progress_hide_delay_ms: 3000,
            preview_hide_delay_ms: 5000,
            failure_reset_delay_ms: 3000,
        }
    }
}

impl Timings {
    pub fn link_reveal_delay(&self) -> Duration {
        Duration::from_millis(self.link_reveal_delay_ms)
    }

    pub fn progress_hide_delay(&self) -> Duration {
        Duration::from_millis(self.progress_hide_delay_ms)
    }

    pub fn preview_hide_delay(&self) -> Duration {
        Duration::from_millis(self.preview_hide_delay_ms)
    }

    pub fn failure_reset_delay(&self) -> Duration {
        Duration::from_millis(self.failure_reset_delay_ms)
    }
}

/// Configuration loaded from `config.toml` in the platform config directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the processing server.
    pub server_url: String,
    /// Path of the upload endpoint, relative to `server_url`.
    pub upload_path: String,
    pub timings: Timings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5000".to_string(),
            upload_path: "/upload".to_string(),
            timings: Timings::default(),
        }
    }
}

impl AppConfig {
    pub fn server_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.server_url).map_err(|e| ConfigError::InvalidUrl {
            url: self.server_url.clone(),
            reason: e.to_string(),
        })
    }

    pub fn upload_url(&self) -> Result<Url, ConfigError> {
        self.server_url()?
            .join(&self.upload_path)
            .map_err(|e| ConfigError::InvalidUrl {
                url: format!("{}{}", self.server_url, self.upload_path),
                reason: e.to_string(),
            })
    }
}

pub fn config_path() -> Result<PathBuf, ConfigError> {
    let dirs = ProjectDirs::from("", "", "video-blur-uploader").ok_or(ConfigError::NoConfigDir)?;
    Ok(dirs.config_dir().join("config.toml"))
}

/// Loads `path`, writing the defaults there first if it does not exist.
pub fn load_or_init(path: &Path) -> Result<AppConfig, ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };

    if !path.exists() {
        let default_cfg = AppConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, toml).map_err(io_err)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path).map_err(io_err)?;
    toml::from_str(&data).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_targets_local_server() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server_url, "http://127.0.0.1:5000");
        assert_eq!(
            cfg.upload_url().unwrap().as_str(),
            "http://127.0.0.1:5000/upload"
        );
        assert_eq!(cfg.timings.failure_reset_delay(), Duration::from_secs(3));
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let cfg = load_or_init(&path).unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert!(path.exists());

        let reloaded = load_or_init(&path).unwrap();
        assert_eq!(reloaded, cfg);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
                server_url = "https://blur.example.com"

                [timings]
                failure_reset_delay_ms = 500
            "#,
        )
        .unwrap();

        let cfg = load_or_init(&path).unwrap();
        assert_eq!(cfg.upload_path, "/upload");
        assert_eq!(
            cfg.upload_url().unwrap().as_str(),
            "https://blur.example.com/upload"
        );
        assert_eq!(cfg.timings.failure_reset_delay_ms, 500);
        assert_eq!(cfg.timings.link_reveal_delay_ms, 1000);
    }

    #[test]
    fn invalid_toml_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "server_url = [").unwrap();

        let err = load_or_init(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn bad_server_url_is_rejected() {
        let cfg = AppConfig {
            server_url: "not a url".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(
            cfg.upload_url(),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }
}

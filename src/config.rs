use serde::Deserialize;
use std::io::Read;
use std::time::Duration;
use std::{
    fs::File,
    path::{Path, PathBuf},
};
use thiserror::*;
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("io error {0} when reading config")]
    IoError(#[from] std::io::Error),
    #[error("cannot open config file '{0}' : {1}")]
    OpeningError(PathBuf, std::io::Error),
    #[error("UTF8 format error when reading config")]
    Utf8Error,
    #[error("format error {0} when reading config")]
    FormatError(#[from] serde_yaml::Error),
    #[error("invalid value for '{0}': {1}")]
    InvalidValue(&'static str, String),
}

#[derive(Clone, Debug, Deserialize)]
pub struct GatewayConfig {
    /// Base URL the `/tasks/` routes hang off, e.g. `http://localhost:8000/api/v1`.
    pub url: Url,
    /// Request timeout in humantime notation (`30s`, `1m 30s`).
    pub timeout: Option<String>,
    pub user_agent: Option<String>,
}

impl GatewayConfig {
    pub fn timeout(&self) -> Result<Option<Duration>, ConfigError> {
        self.timeout
            .as_deref()
            .map(|raw| {
                humantime::parse_duration(raw)
                    .map_err(|err| ConfigError::InvalidValue("gateway.timeout", err.to_string()))
            })
            .transpose()
    }
}

/// Used when neither `--config` nor `TASKBOARD_CONFIG` names a file.
pub const DEFAULT_CONFIG: &str = r#"
gateway:
    url: http://localhost:8000/api/v1
    timeout: 30s
    user_agent: taskboard
"#;

#[derive(Deserialize)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub log: Option<crate::log::Log>,
}

impl Config {
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(s)?;
        config.gateway.timeout()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let p = path.as_ref();
        let mut file = File::open(p).map_err(|e| ConfigError::OpeningError(p.to_owned(), e))?;
        let mut contents = vec![];
        file.read_to_end(&mut contents)?;
        let contents = String::from_utf8(contents).map_err(|_| ConfigError::Utf8Error)?;
        Config::from_str(&contents)
    }
}

pub mod testdata {
    use super::Config;

    #[allow(dead_code)]
    pub fn test_config() -> Config {
        Config::from_str(
            r#"
        log:
            level: trace
            backend:
                type: Stderr
            structured: false
        gateway:
            url: http://127.0.0.1:8000/api/v1
            timeout: 5s
        "#,
        )
        .unwrap()
    }
}

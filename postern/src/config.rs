use std::path::Path;

use postern_common::logging::LogConfig;
use postern_smtp::Server;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse configuration file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// The whole YAML configuration file.
///
/// ```yaml
/// server:
///   listeners:
///     - socket: 0.0.0.0:25
///     - socket: 127.0.0.1:2525
///       session:
///         hostname: mx.example.org
///         max_message_size: 10485760
/// logging:
///   file: /var/log/postern.log
///   level: info
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default, alias = "smtp")]
    pub server: Server,
    #[serde(default)]
    pub logging: LogConfig,
}

impl Config {
    /// Load and parse the configuration at `path`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read or is not valid
    /// YAML for this schema.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

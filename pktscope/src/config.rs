use crate::report::OutputFormat;
use common::logging::LogError;
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub const CONFIG_FILENAME: &str = "config.toml";

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_READ_TIMEOUT_MS: i32 = 100;
const DEFAULT_SNAPLEN: i32 = 65535;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub log_level: String,
    pub log_format: String,
    pub log_to_file: bool,

    pub read_timeout_ms: i32,
    pub promiscuous: bool,
    pub snaplen: i32,

    pub output: OutputFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_format: common::logging::DEFAULT_FORMAT.to_string(),
            log_to_file: false,

            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            promiscuous: true,
            snaplen: DEFAULT_SNAPLEN,

            output: OutputFormat::Text,
        }
    }
}

impl Config {
    /// Reads the config. A missing file is created with defaults.
    pub fn from_file(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map_or_else(|| PathBuf::from(CONFIG_FILENAME), Path::to_path_buf);

        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let config = Config::default();
                config.save_to_file(&path)?;
                return Ok(config);
            },
            Err(err) => return Err(ConfigError::IOError(err)),
        };

        let config: Config =
            toml::from_str(&data).map_err(ConfigError::TomlDeserializationError)?;
        config.validate()?;

        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let data = toml::to_string(&self).map_err(ConfigError::TomlSerializationError)?;

        std::fs::write(path, data).map_err(ConfigError::IOError)?;

        Ok(())
    }

    pub fn log_level(&self) -> Result<LevelFilter, LogError> {
        LevelFilter::from_str(&self.log_level)
            .map_err(|_| LogError::WrongLogLevel(self.log_level.clone()))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.read_timeout_ms <= 0 {
            return Err(ConfigError::WrongValue {
                key: "read_timeout_ms",
                value: self.read_timeout_ms.to_string(),
            });
        }
        if self.snaplen <= 0 {
            return Err(ConfigError::WrongValue {
                key: "snaplen",
                value: self.snaplen.to_string(),
            });
        }

        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO Error.")]
    IOError(#[from] std::io::Error),

    #[error("TOML Serialization Error.")]
    TomlSerializationError(#[from] toml::ser::Error),

    #[error("TOML Deserialization Error.")]
    TomlDeserializationError(#[from] toml::de::Error),

    #[error("Wrong config value.")]
    WrongValue { key: &'static str, value: String },
}

impl ConfigError {
    pub fn additional_info(&self) -> Option<String> {
        match self {
            ConfigError::IOError(err) => Some(err.to_string()),
            ConfigError::TomlSerializationError(err) => Some(err.to_string()),
            ConfigError::TomlDeserializationError(err) => Some(err.to_string()),
            ConfigError::WrongValue { key, value } => {
                Some(format!("{key} = {value}, expected a positive number"))
            },
        }
    }
}

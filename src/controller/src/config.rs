use std::fs;

use serde::{Deserialize, Serialize};

use super::error::{ConfigError, Error};

pub const DEFAULT_ENDPOINT: &str = "0.0.0.0:8080";
pub const DEFAULT_RESYNC_INTERVAL: u64 = 60;
pub const DEFAULT_BACKOFF_INITIAL: u64 = 1;
pub const DEFAULT_BACKOFF_MAX: u64 = 60;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub endpoint: String,
    // seconds
    pub resync_interval: u64,
    pub backoff: BackoffConfig,
    pub topology_file: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub initial: u64,
    pub max: u64,
}

impl Config {
    pub fn load(file: &str) -> Result<Self, Error> {
        let contents = fs::read_to_string(file).map_err(Error::StdIo)?;
        let config: Config = serde_yaml::from_str(&contents)
            .map_err(|e| Error::Config(ConfigError::FailedToLoad(e.to_string())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.resync_interval == 0 {
            return Err(Error::Config(ConfigError::InvalidArgument(
                "resync_interval must be positive".to_string(),
            )));
        }
        if self.backoff.initial == 0 || self.backoff.initial > self.backoff.max {
            return Err(Error::Config(ConfigError::InvalidArgument(
                "backoff.initial must be positive and not exceed backoff.max".to_string(),
            )));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            resync_interval: DEFAULT_RESYNC_INTERVAL,
            backoff: BackoffConfig::default(),
            topology_file: None,
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: DEFAULT_BACKOFF_INITIAL,
            max: DEFAULT_BACKOFF_MAX,
        }
    }
}

use std::{fs::File, str::FromStr, sync::Mutex};

use thiserror::Error;
use tracing_subscriber::{filter::LevelFilter, prelude::*, Registry};

#[derive(Debug, Clone)]
pub struct TraceConfig {
    pub level: String,
    pub format: String,
    pub file: Option<String>,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "plain".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid log level: {0}")]
    InvalidLevel(String),

    #[error("failed to open log file: {0}")]
    LogFile(#[source] std::io::Error),

    #[error("failed to install subscriber: {0}")]
    Init(#[source] tracing_subscriber::util::TryInitError),
}

pub fn prepare_tracing(conf: TraceConfig) -> Result<(), Error> {
    let level =
        LevelFilter::from_str(&conf.level).map_err(|_| Error::InvalidLevel(conf.level.clone()))?;
    let file = match &conf.file {
        Some(path) => Some(Mutex::new(File::create(path).map_err(Error::LogFile)?)),
        None => None,
    };

    let registry = Registry::default().with(level);
    match (conf.format.as_str(), file) {
        ("json", Some(file)) => registry
            .with(tracing_subscriber::fmt::Layer::new().json().with_writer(file))
            .try_init(),
        ("json", None) => registry
            .with(tracing_subscriber::fmt::Layer::new().json())
            .try_init(),
        (_, Some(file)) => registry
            .with(
                tracing_subscriber::fmt::Layer::new()
                    .with_ansi(false)
                    .with_writer(file),
            )
            .try_init(),
        (_, None) => registry
            .with(tracing_subscriber::fmt::Layer::new().with_ansi(true))
            .try_init(),
    }
    .map_err(Error::Init)
}

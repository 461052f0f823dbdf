use nimbusd_trace::error::TraceableError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("std::io::Error: {0}")]
    StdIo(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Trace Error: {0}")]
    Trace(#[source] nimbusd_trace::init::Error),

    #[error("Metrics Error: {0}")]
    Metrics(#[source] prometheus::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load: {0}")]
    FailedToLoad(String),
    #[error("topology source is not specified")]
    MissingTopologySource,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl TraceableError for Error {
    fn metric_label(&self) -> String {
        match self {
            Error::StdIo(_) => "io".to_string(),
            Error::Config(_) => "config".to_string(),
            Error::Trace(_) => "trace".to_string(),
            Error::Metrics(_) => "metrics".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest(
        err,
        expected,
        case(Error::Config(ConfigError::MissingTopologySource), "config"),
        case(Error::StdIo(std::io::Error::from(std::io::ErrorKind::AddrInUse)), "io"),
        case(Error::Metrics(prometheus::Error::Msg("duplicate".to_string())), "metrics")
    )]
    fn works_error_metric_label(err: Error, expected: &str) {
        assert_eq!(err.metric_label(), expected);
    }
}

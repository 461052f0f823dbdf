use nimbusd_trace::error::TraceableError;
use thiserror::Error;

use crate::provider;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Provider Error: {0}")]
    Provider(#[source] provider::Error),

    #[error("resync cancelled")]
    Cancelled,
}

impl TraceableError for Error {
    fn metric_label(&self) -> String {
        match self {
            Error::Provider(e) => format!("provider_{}", e.metric_label()),
            Error::Cancelled => "cancelled".to_string(),
        }
    }
}

use async_trait::async_trait;
use nimbusd_trace::error::TraceableError;
use thiserror::Error;

use crate::types::{InstanceMap, Subnet, VirtualNetwork};

/// Everything a single resync merges into the caches.
#[derive(Debug, Clone, Default)]
pub struct TopologySnapshot {
    pub instances: InstanceMap,
    pub subnets: Vec<Subnet>,
    pub virtual_networks: Vec<VirtualNetwork>,
}

/// Query contract of a cloud vendor's topology API.
///
/// Each call must return a coherent point-in-time view. Pagination, authentication and
/// rate limiting against the vendor are the implementation's concern.
#[async_trait]
pub trait TopologyProvider: Send + Sync {
    async fn list_instances(&self) -> Result<InstanceMap, Error>;
    async fn list_subnets(&self) -> Result<Vec<Subnet>, Error>;
    async fn list_virtual_networks(&self) -> Result<Vec<VirtualNetwork>, Error>;

    /// Fetch all three lists for one resync.
    ///
    /// The default issues the list calls concurrently. Providers that can read a whole
    /// document at once override it so the lists come from the same version.
    async fn snapshot(&self) -> Result<TopologySnapshot, Error> {
        let (subnets, virtual_networks, instances) = tokio::try_join!(
            self.list_subnets(),
            self.list_virtual_networks(),
            self.list_instances(),
        )?;
        Ok(TopologySnapshot {
            instances,
            subnets,
            virtual_networks,
        })
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("std::io::Error: {0}")]
    StdIo(#[from] std::io::Error),

    #[error("failed to parse topology: {0}")]
    Parse(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("rate limited")]
    RateLimited,

    #[error("unauthorized")]
    Unauthorized,
}

impl TraceableError for Error {
    fn metric_label(&self) -> String {
        match self {
            Error::StdIo(_) => "io",
            Error::Parse(_) => "parse",
            Error::Api(_) => "api",
            Error::RateLimited => "rate_limited",
            Error::Unauthorized => "unauthorized",
        }
        .to_string()
    }
}

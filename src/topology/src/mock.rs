use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use ipnet::IpNet;
use nimbusd_ipam::{
    error::Error as IpamError,
    manager::{PoolAllocator, PoolSet},
};

use crate::{
    provider::{Error, TopologyProvider},
    types::{InstanceMap, Subnet, VirtualNetwork},
};

#[derive(Debug, Clone)]
pub enum MockFailure {
    Api(String),
    RateLimited,
    Unauthorized,
}

impl From<&MockFailure> for Error {
    fn from(value: &MockFailure) -> Self {
        match value {
            MockFailure::Api(msg) => Error::Api(msg.clone()),
            MockFailure::RateLimited => Error::RateLimited,
            MockFailure::Unauthorized => Error::Unauthorized,
        }
    }
}

/// In-memory cloud API fake.
#[derive(Clone, Debug, Default)]
pub struct MockTopologyApi {
    inner: Arc<Mutex<MockTopologyApiInner>>,
}

#[derive(Clone, Debug, Default)]
pub struct MockTopologyApiInner {
    pub instances: InstanceMap,
    pub subnets: Vec<Subnet>,
    pub vnets: Vec<VirtualNetwork>,
    pub failure: Option<MockFailure>,
    pub delay: Option<Duration>,
}

impl MockTopologyApi {
    pub fn new(subnets: Vec<Subnet>, vnets: Vec<VirtualNetwork>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockTopologyApiInner {
                subnets,
                vnets,
                ..Default::default()
            })),
        }
    }

    pub fn update_instances(&self, instances: InstanceMap) {
        self.inner.lock().unwrap().instances = instances;
    }

    pub fn update_subnets(&self, subnets: Vec<Subnet>) {
        self.inner.lock().unwrap().subnets = subnets;
    }

    pub fn update_virtual_networks(&self, vnets: Vec<VirtualNetwork>) {
        self.inner.lock().unwrap().vnets = vnets;
    }

    // Every list call fails with the given error until cleared.
    pub fn fail_with(&self, failure: Option<MockFailure>) {
        self.inner.lock().unwrap().failure = failure;
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        self.inner.lock().unwrap().delay = delay;
    }

    async fn read<T>(&self, f: impl Fn(&MockTopologyApiInner) -> T) -> Result<T, Error> {
        let delay = self.inner.lock().unwrap().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let inner = self.inner.lock().unwrap();
        match &inner.failure {
            Some(failure) => Err(failure.into()),
            None => Ok(f(&inner)),
        }
    }
}

#[async_trait]
impl TopologyProvider for MockTopologyApi {
    async fn list_instances(&self) -> Result<InstanceMap, Error> {
        self.read(|inner| inner.instances.clone()).await
    }

    async fn list_subnets(&self) -> Result<Vec<Subnet>, Error> {
        self.read(|inner| inner.subnets.clone()).await
    }

    async fn list_virtual_networks(&self) -> Result<Vec<VirtualNetwork>, Error> {
        self.read(|inner| inner.vnets.clone()).await
    }
}

/// Pool allocator that refuses to create pools for selected subnets.
#[derive(Clone, Debug, Default)]
pub struct MockPoolAllocator {
    pools: PoolSet,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl MockPoolAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, subnet_id: &str) {
        self.failing.lock().unwrap().insert(subnet_id.to_string());
    }

    pub fn recover(&self, subnet_id: &str) {
        self.failing.lock().unwrap().remove(subnet_id);
    }
}

impl PoolAllocator for MockPoolAllocator {
    fn pool_exists(&self, subnet_id: &str) -> bool {
        self.pools.pool_exists(subnet_id)
    }

    fn create_pool(&self, subnet_id: &str, cidr: &IpNet) -> Result<(), IpamError> {
        if self.failing.lock().unwrap().contains(subnet_id) {
            return Err(IpamError::Unavailable(subnet_id.to_string()));
        }
        self.pools.create_pool(subnet_id, cidr)
    }
}

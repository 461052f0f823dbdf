use std::{
    collections::HashMap,
    net::IpAddr,
    sync::{Arc, Mutex, MutexGuard},
};

use ipnet::IpNet;

use super::{
    allocator::{Allocator, AllocatorMethod},
    error::Error,
};

/// Capability consumed by the topology engine: a set of address pools keyed by subnet ID.
pub trait PoolAllocator: Send + Sync {
    fn pool_exists(&self, subnet_id: &str) -> bool;

    /// Creating a pool that already exists is a no-op.
    fn create_pool(&self, subnet_id: &str, cidr: &IpNet) -> Result<(), Error>;
}

#[derive(Debug, Default, Clone)]
pub struct PoolSet {
    inner: Arc<Mutex<PoolSetInner>>,
}

impl PoolSet {
    pub fn new() -> PoolSet {
        PoolSet::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, PoolSetInner>, Error> {
        self.inner.lock().map_err(|_| Error::FailedToGetLock)
    }

    pub fn allocate(&self, subnet_id: &str, addr: &IpAddr) -> Result<IpAddr, Error> {
        let mut inner = self.lock()?;
        inner.get_mut(subnet_id)?.allocator.allocate(addr)
    }

    pub fn allocate_next(&self, subnet_id: &str) -> Result<IpAddr, Error> {
        let mut inner = self.lock()?;
        inner.get_mut(subnet_id)?.allocator.allocate_next()
    }

    pub fn release(&self, subnet_id: &str, addr: &IpAddr) -> Result<IpAddr, Error> {
        let mut inner = self.lock()?;
        inner.get_mut(subnet_id)?.allocator.release(addr)
    }

    pub fn is_allocated(&self, subnet_id: &str, addr: &IpAddr) -> Result<bool, Error> {
        let inner = self.lock()?;
        Ok(inner.get(subnet_id)?.allocator.is_allocated(addr))
    }

    // Number of addresses that can still be handed out from the pool.
    pub fn free(&self, subnet_id: &str) -> Result<u128, Error> {
        let inner = self.lock()?;
        Ok(inner.get(subnet_id)?.allocator.free())
    }

    pub fn pool_ids(&self) -> Result<Vec<String>, Error> {
        let inner = self.lock()?;
        let mut ids: Vec<String> = inner.pools.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

impl PoolAllocator for PoolSet {
    fn pool_exists(&self, subnet_id: &str) -> bool {
        match self.lock() {
            Ok(inner) => inner.pools.contains_key(subnet_id),
            Err(_) => false,
        }
    }

    fn create_pool(&self, subnet_id: &str, cidr: &IpNet) -> Result<(), Error> {
        let mut inner = self.lock()?;
        if let Some(pool) = inner.pools.get(subnet_id) {
            if pool.allocator.cidr().ne(cidr) {
                tracing::warn!(
                    subnet = subnet_id,
                    existing = %pool.allocator.cidr(),
                    requested = %cidr,
                    "Pool already exists with a different CIDR"
                );
            }
            return Ok(());
        }
        let pool = Pool::new(subnet_id, cidr)?;
        inner.pools.insert(subnet_id.to_string(), pool);
        tracing::debug!(subnet = subnet_id, cidr = %cidr, "Create pool");
        Ok(())
    }
}

#[derive(Debug, Default)]
struct PoolSetInner {
    pools: HashMap<String, Pool>,
}

impl PoolSetInner {
    fn get(&self, subnet_id: &str) -> Result<&Pool, Error> {
        self.pools
            .get(subnet_id)
            .ok_or_else(|| Error::PoolNotFound(subnet_id.to_string()))
    }

    fn get_mut(&mut self, subnet_id: &str) -> Result<&mut Pool, Error> {
        self.pools
            .get_mut(subnet_id)
            .ok_or_else(|| Error::PoolNotFound(subnet_id.to_string()))
    }
}

#[derive(Debug)]
pub struct Pool {
    pub subnet_id: String,
    pub allocator: Allocator,
}

impl Pool {
    // The network and broadcast addresses are never handed out.
    pub fn new(subnet_id: &str, cidr: &IpNet) -> Result<Pool, Error> {
        let mut allocator = Allocator::new(*cidr, AllocatorMethod::Bit)?;
        if allocator.size() > 2 {
            allocator.allocate(&cidr.network())?;
            allocator.allocate(&cidr.broadcast())?;
        }
        Ok(Pool {
            subnet_id: subnet_id.to_string(),
            allocator,
        })
    }
}

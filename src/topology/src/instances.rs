use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard},
};

use chrono::{DateTime, Utc};
use nimbusd_ipam::manager::{PoolAllocator, PoolSet};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{field, Span};

use crate::{
    error::Error,
    metrics::Metrics,
    provider::{TopologyProvider, TopologySnapshot},
    types::{
        Instance, InstanceMap, Interface, PoolQuota, PoolQuotaMap, Subnet, SubnetMap,
        VirtualNetwork, VirtualNetworkMap, RESERVED_ADDRESSES,
    },
};

/// In-memory view of the tenant's network topology.
///
/// The instance cache is replaced by every resync while subnets and virtual networks are
/// only ever inserted or overwritten, so a pool created for a subnet is never lost.
pub struct InstancesManager {
    api: Arc<dyn TopologyProvider>,
    allocator: Arc<dyn PoolAllocator>,
    cache: RwLock<Cache>,
    // serializes resyncs; readers only touch `cache`
    resync_lock: Mutex<()>,
    metrics: Metrics,
}

#[derive(Debug, Default)]
struct Cache {
    instances: InstanceMap,
    subnets: SubnetMap,
    vnets: VirtualNetworkMap,
    last_resync: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResyncSummary {
    pub started_at: DateTime<Utc>,
    pub instances: usize,
    pub subnets: usize,
    pub virtual_networks: usize,
    pub created_pools: Vec<String>,
    // subnet id -> reason
    pub pool_failures: BTreeMap<String, String>,
}

impl InstancesManager {
    pub fn new(api: Arc<dyn TopologyProvider>) -> InstancesManager {
        InstancesManager::with_allocator(api, Arc::new(PoolSet::new()))
    }

    pub fn with_allocator(
        api: Arc<dyn TopologyProvider>,
        allocator: Arc<dyn PoolAllocator>,
    ) -> InstancesManager {
        InstancesManager {
            api,
            allocator,
            cache: RwLock::new(Cache::default()),
            resync_lock: Mutex::new(()),
            metrics: Metrics::default(),
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> InstancesManager {
        self.metrics = metrics;
        self
    }

    /// Fetch a full snapshot from the provider and merge it into the caches.
    ///
    /// Provider errors and cancellation leave the caches untouched.
    #[tracing::instrument(skip_all, fields(trace_id))]
    pub async fn resync(&self, token: &CancellationToken) -> Result<ResyncSummary, Error> {
        let trace_id = nimbusd_trace::telemetry::get_trace_id();
        Span::current().record("trace_id", &field::display(&trace_id));

        let _measure = self.metrics.count_and_measure();
        let res = self.resync_inner(token).await;
        match &res {
            Ok(summary) => tracing::info!(
                instances = summary.instances,
                subnets = summary.subnets,
                virtual_networks = summary.virtual_networks,
                created_pools = summary.created_pools.len(),
                pool_failures = summary.pool_failures.len(),
                "Resync completed"
            ),
            Err(e) => {
                tracing::warn!(error=?e, "Resync failed");
                self.metrics.resync_failure(e);
            }
        }
        res
    }

    async fn resync_inner(&self, token: &CancellationToken) -> Result<ResyncSummary, Error> {
        let _guard = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(Error::Cancelled),
            guard = self.resync_lock.lock() => guard,
        };

        let started_at = Utc::now();
        let snapshot = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(Error::Cancelled),
            res = self.fetch() => res?,
        };
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        Ok(self.merge(snapshot, started_at))
    }

    async fn fetch(&self) -> Result<TopologySnapshot, Error> {
        let snapshot = self.api.snapshot().await.map_err(Error::Provider)?;
        tracing::debug!(
            instances = snapshot.instances.len(),
            subnets = snapshot.subnets.len(),
            virtual_networks = snapshot.virtual_networks.len(),
            "Fetched topology snapshot"
        );
        Ok(snapshot)
    }

    fn merge(&self, snapshot: TopologySnapshot, started_at: DateTime<Utc>) -> ResyncSummary {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);

        cache.instances = snapshot.instances;
        for subnet in snapshot.subnets.into_iter() {
            cache.subnets.insert(subnet.id.clone(), subnet);
        }
        for vnet in snapshot.virtual_networks.into_iter() {
            cache.vnets.insert(vnet.id.clone(), vnet);
        }

        let mut subnets: Vec<&Subnet> = cache.subnets.values().collect();
        subnets.sort_by(|a, b| a.id.cmp(&b.id));

        let mut created_pools = Vec::new();
        let mut pool_failures = BTreeMap::new();
        for subnet in subnets.into_iter() {
            if self.allocator.pool_exists(&subnet.id) {
                continue;
            }
            match self.allocator.create_pool(&subnet.id, &subnet.cidr) {
                Ok(()) => {
                    tracing::info!(
                        subnet = subnet.id,
                        cidr = %subnet.cidr,
                        "Created pool for subnet"
                    );
                    self.metrics.pools_created.inc();
                    created_pools.push(subnet.id.clone());
                }
                Err(e) => {
                    tracing::warn!(
                        subnet = subnet.id,
                        cidr = %subnet.cidr,
                        error = %e,
                        "Failed to create pool for subnet"
                    );
                    self.metrics.pool_creation_failure(&subnet.id);
                    pool_failures.insert(subnet.id.clone(), e.to_string());
                }
            }
        }

        cache.last_resync = Some(started_at);
        self.metrics.cached_instances.set(cache.instances.len() as i64);

        ResyncSummary {
            started_at,
            instances: cache.instances.len(),
            subnets: cache.subnets.len(),
            virtual_networks: cache.vnets.len(),
            created_pools,
            pool_failures,
        }
    }

    // The snapshot is assigned to the cache before any pool is created, so a lock poisoned
    // by a panicking allocator still guards a consistent state.
    fn read(&self) -> RwLockReadGuard<'_, Cache> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn pool_exists(&self, subnet_id: &str) -> bool {
        let _cache = self.read();
        self.allocator.pool_exists(subnet_id)
    }

    /// Interfaces of the instance ordered by interface ID, empty for an unknown instance.
    pub fn get_interfaces(&self, instance_id: &str) -> Vec<Interface> {
        self.read()
            .instances
            .get(instance_id)
            .map(|instance| instance.interfaces.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Addresses still available in each known subnet.
    ///
    /// Recomputed from the instance cache on every call. The value may be negative when the
    /// provider reports more active addresses than the subnet can hold.
    pub fn get_pool_quota(&self) -> PoolQuotaMap {
        let cache = self.read();
        let quota = compute_quota(&cache.subnets, &cache.instances);
        drop(cache);
        self.metrics.quota(&quota);
        quota
    }

    pub fn get_subnet(&self, subnet_id: &str) -> Option<Subnet> {
        self.read().subnets.get(subnet_id).cloned()
    }

    pub fn get_subnets(&self) -> Vec<Subnet> {
        let mut subnets: Vec<Subnet> = self.read().subnets.values().cloned().collect();
        subnets.sort_by(|a, b| a.id.cmp(&b.id));
        subnets
    }

    pub fn get_virtual_networks(&self) -> Vec<VirtualNetwork> {
        let mut vnets: Vec<VirtualNetwork> = self.read().vnets.values().cloned().collect();
        vnets.sort_by(|a, b| a.id.cmp(&b.id));
        vnets
    }

    pub fn instance_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read().instances.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn last_resync(&self) -> Option<DateTime<Utc>> {
        self.read().last_resync
    }
}

fn compute_quota(subnets: &SubnetMap, instances: &InstanceMap) -> PoolQuotaMap {
    let allocated = count_active_addresses(instances.values());
    subnets
        .values()
        .map(|subnet| {
            let used = allocated.get(subnet.id.as_str()).copied().unwrap_or(0);
            let available_ips = subnet
                .total_addresses()
                .saturating_sub(RESERVED_ADDRESSES)
                .saturating_sub(used);
            (subnet.id.clone(), PoolQuota { available_ips })
        })
        .collect()
}

fn count_active_addresses<'a>(
    instances: impl Iterator<Item = &'a Instance>,
) -> HashMap<&'a str, i128> {
    let mut allocated: HashMap<&str, i128> = HashMap::new();
    for addr in instances
        .flat_map(|instance| instance.interfaces.values())
        .flat_map(|interface| interface.addresses.iter())
        .filter(|addr| addr.is_active())
    {
        *allocated.entry(addr.subnet.as_str()).or_default() += 1;
    }
    allocated
}

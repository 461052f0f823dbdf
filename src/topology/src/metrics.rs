use nimbusd_trace::error::TraceableError;
use prometheus::{
    histogram_opts, opts, Histogram, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Registry,
};
use tokio::time::Instant;

use crate::types::PoolQuotaMap;

#[derive(Debug, Clone)]
pub struct Metrics {
    pub resyncs: IntCounter,
    pub failures: IntCounterVec,
    pub resync_duration: Histogram,
    pub pools_created: IntCounter,
    pub pool_creation_failures: IntCounterVec,
    pub available_ips: IntGaugeVec,
    pub cached_instances: IntGauge,
}

impl Default for Metrics {
    fn default() -> Self {
        let resync_duration = Histogram::with_opts(
            histogram_opts!(
                "nimbusd_resync_duration_seconds",
                "The duration of resync to complete in seconds"
            )
            .buckets(vec![0.01, 0.1, 0.25, 0.5, 1., 5., 15., 60.]),
        )
        .unwrap();
        let resyncs = IntCounter::with_opts(opts!(
            "nimbusd_resync_total",
            "Total count of topology resyncs"
        ))
        .unwrap();
        let failures = IntCounterVec::new(
            opts!(
                "nimbusd_resync_errors_total",
                "Total count of failed topology resyncs",
            ),
            &["error"],
        )
        .unwrap();
        let pools_created = IntCounter::with_opts(opts!(
            "nimbusd_pools_created_total",
            "Total count of created subnet pools"
        ))
        .unwrap();
        let pool_creation_failures = IntCounterVec::new(
            opts!(
                "nimbusd_pool_creation_errors_total",
                "Total count of subnet pool creation errors"
            ),
            &["subnet"],
        )
        .unwrap();
        let available_ips = IntGaugeVec::new(
            opts!(
                "nimbusd_subnet_available_ips",
                "The number of addresses still available in a subnet"
            ),
            &["subnet"],
        )
        .unwrap();
        let cached_instances = IntGauge::with_opts(opts!(
            "nimbusd_cached_instances",
            "The number of instances in the latest topology snapshot"
        ))
        .unwrap();
        Metrics {
            resyncs,
            failures,
            resync_duration,
            pools_created,
            pool_creation_failures,
            available_ips,
            cached_instances,
        }
    }
}

impl Metrics {
    pub fn register(self, registry: &Registry) -> Result<Self, prometheus::Error> {
        registry.register(Box::new(self.resyncs.clone()))?;
        registry.register(Box::new(self.failures.clone()))?;
        registry.register(Box::new(self.resync_duration.clone()))?;
        registry.register(Box::new(self.pools_created.clone()))?;
        registry.register(Box::new(self.pool_creation_failures.clone()))?;
        registry.register(Box::new(self.available_ips.clone()))?;
        registry.register(Box::new(self.cached_instances.clone()))?;
        Ok(self)
    }

    pub fn resync_failure<E: TraceableError>(&self, e: &E) {
        self.failures
            .with_label_values(&[e.metric_label().as_ref()])
            .inc()
    }

    pub fn pool_creation_failure(&self, subnet: &str) {
        self.pool_creation_failures
            .with_label_values(&[subnet])
            .inc()
    }

    // The gauge is clamped to i64::MAX for large IPv6 subnets.
    pub fn quota(&self, quota: &PoolQuotaMap) {
        for (subnet, q) in quota.iter() {
            self.available_ips
                .with_label_values(&[subnet])
                .set(i64::try_from(q.available_ips).unwrap_or(i64::MAX));
        }
    }

    pub fn count_and_measure(&self) -> ResyncMeasurer {
        self.resyncs.inc();
        ResyncMeasurer {
            start: Instant::now(),
            metric: self.resync_duration.clone(),
        }
    }
}

/// Records the elapsed time of a resync into the histogram when dropped.
pub struct ResyncMeasurer {
    start: Instant,
    metric: Histogram,
}

impl Drop for ResyncMeasurer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_millis() as f64 / 1000.0;
        self.metric.observe(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PoolQuota;

    #[test]
    fn works_metrics_register() {
        let registry = Registry::default();
        let metrics = Metrics::default().register(&registry).unwrap();
        {
            let _m = metrics.count_and_measure();
        }
        metrics.pool_creation_failure("subnet-1");
        let mut quota = PoolQuotaMap::new();
        quota.insert("subnet-1".to_string(), PoolQuota { available_ips: 10 });
        quota.insert(
            "subnet-v6".to_string(),
            PoolQuota {
                available_ips: 1 << 80,
            },
        );
        metrics.quota(&quota);

        assert_eq!(metrics.resyncs.get(), 1);
        assert_eq!(
            metrics.available_ips.with_label_values(&["subnet-1"]).get(),
            10
        );
        assert_eq!(
            metrics.available_ips.with_label_values(&["subnet-v6"]).get(),
            i64::MAX
        );
        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|f| f.get_name().to_string())
            .collect();
        assert!(names.contains(&"nimbusd_resync_duration_seconds".to_string()));
        assert!(names.contains(&"nimbusd_pool_creation_errors_total".to_string()));

        assert!(Metrics::default().register(&registry).is_err());
    }
}

use std::{sync::Arc, time::Duration};

use nimbusd_topology::{error::Error, instances::InstancesManager};
use tokio_util::sync::CancellationToken;

use crate::config::BackoffConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
}

impl Backoff {
    // attempt starts from 1
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial.saturating_mul(factor).min(self.max)
    }
}

impl From<&BackoffConfig> for Backoff {
    fn from(value: &BackoffConfig) -> Self {
        Backoff {
            initial: Duration::from_secs(value.initial),
            max: Duration::from_secs(value.max),
        }
    }
}

/// Periodically resyncs the topology until cancelled.
pub struct ResyncDriver {
    manager: Arc<InstancesManager>,
    interval: Duration,
    backoff: Backoff,
}

impl ResyncDriver {
    pub fn new(manager: Arc<InstancesManager>, interval: Duration, backoff: Backoff) -> Self {
        Self {
            manager,
            interval,
            backoff,
        }
    }

    #[tracing::instrument(skip_all)]
    pub async fn run(&self, token: CancellationToken) {
        tracing::info!(interval = ?self.interval, "Start resync driver");
        let mut failures = 0u32;
        loop {
            let wait = match self.manager.resync(&token).await {
                Ok(_) => {
                    failures = 0;
                    self.interval
                }
                Err(Error::Cancelled) => break,
                Err(e) => {
                    failures += 1;
                    let wait = self.backoff.delay(failures);
                    tracing::warn!(
                        error = %e,
                        failures,
                        retry_in = ?wait,
                        "Resync failed, retrying"
                    );
                    wait
                }
            };
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }
        tracing::info!("Stop resync driver");
    }
}

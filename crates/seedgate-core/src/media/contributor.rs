//! Periodic poller turning a media server's stream bandwidth into an upload
//! reduction.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::BandwidthProvider;
use crate::aggregate::{Contribution, ContributorId, ReductionAggregate};
use crate::units::{convert, Unit};

pub struct BandwidthContributor<P: BandwidthProvider + 'static> {
    id: ContributorId,
    provider: Arc<Mutex<P>>,
    multiplier: f64,
    units: Unit,
    interval: Duration,
    aggregate: Arc<ReductionAggregate>,
}

impl<P: BandwidthProvider + 'static> BandwidthContributor<P> {
    /// Registers an explicit zero for the provider so an idle first poll does
    /// not trigger a recompute.
    pub fn new(
        provider: P,
        multiplier: f64,
        units: Unit,
        interval: Duration,
        aggregate: Arc<ReductionAggregate>,
    ) -> Self {
        let id = ContributorId::new(provider.label());
        aggregate.register(&id);
        Self {
            id,
            provider: Arc::new(Mutex::new(provider)),
            multiplier,
            units,
            interval,
            aggregate,
        }
    }

    pub fn id(&self) -> &ContributorId {
        &self.id
    }

    /// Reduction (configured units) for a measured bandwidth in bits/s.
    pub fn reduction_for(&self, bits_per_sec: u64) -> f64 {
        convert(bits_per_sec as f64 * self.multiplier, Unit::Bit, self.units)
    }

    /// Poll once. Returns whether the aggregate changed. A failed poll is
    /// logged and leaves the previous contribution in place.
    pub async fn tick(&self) -> bool {
        let provider = Arc::clone(&self.provider);
        let polled = tokio::task::spawn_blocking(move || {
            let mut provider = provider.lock().expect("provider lock poisoned");
            provider.get_bandwidth()
        })
        .await;

        let bits = match polled {
            Ok(Ok(bits)) => bits,
            Ok(Err(e)) => {
                tracing::error!(contributor = %self.id, "failed to get bandwidth: {}", e);
                return false;
            }
            Err(e) => {
                tracing::error!(contributor = %self.id, "bandwidth poll task failed: {}", e);
                return false;
            }
        };

        let reduction = self.reduction_for(bits);
        let changed = self
            .aggregate
            .set(&self.id, Contribution::upload_only(reduction));
        if changed {
            tracing::info!(
                contributor = %self.id,
                "stream bandwidth {} bit/s, reserving {} {}",
                bits,
                reduction,
                self.units
            );
        }
        changed
    }

    /// Poll every `interval` until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    // Dropping an in-flight poll leaves it to finish on the
                    // blocking pool.
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = self.tick() => {}
                    }
                }
            }
        }
        tracing::debug!(contributor = %self.id, "bandwidth contributor stopped");
    }
}

//! The control loop: wait for the update signal, recompute targets from the
//! whole aggregate, push limits to every client.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::allocate::{allocate, ClientAllocation, SpeedBounds, SpeedTarget};
use crate::aggregate::{ReductionAggregate, ReductionTotals};
use crate::clients::TorrentClient;
use crate::units::Unit;

/// How long one wait on the signal lasts before checking for shutdown.
pub const SIGNAL_WAIT: Duration = Duration::from_millis(200);

pub type SharedClients = Arc<Mutex<Vec<Box<dyn TorrentClient>>>>;

/// What happened to one client during a cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientOutcome {
    pub label: String,
    /// `None` when the count query failed and the client was skipped.
    pub active: Option<u32>,
    pub limits: Option<ClientAllocation>,
    pub errors: Vec<String>,
}

impl ClientOutcome {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Result of one control cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub totals: ReductionTotals,
    pub target: SpeedTarget,
    pub outcomes: Vec<ClientOutcome>,
}

#[derive(Clone)]
pub struct ControlLoop {
    aggregate: Arc<ReductionAggregate>,
    upload: SpeedBounds,
    download: SpeedBounds,
    units: Unit,
    clients: SharedClients,
}

impl ControlLoop {
    pub fn new(
        aggregate: Arc<ReductionAggregate>,
        upload: SpeedBounds,
        download: SpeedBounds,
        units: Unit,
        clients: Vec<Box<dyn TorrentClient>>,
    ) -> Self {
        Self {
            aggregate,
            upload,
            download,
            units,
            clients: Arc::new(Mutex::new(clients)),
        }
    }

    pub fn target_for(&self, totals: ReductionTotals) -> SpeedTarget {
        SpeedTarget {
            upload: self.upload.target(totals.upload),
            download: self.download.target(totals.download),
        }
    }

    /// Run one cycle. Blocks on client I/O.
    ///
    /// A client whose count query fails is skipped and left out of the
    /// total active count. A failed limit update is recorded and does not
    /// stop the other clients.
    pub fn apply_cycle(&self) -> CycleReport {
        let totals = self.aggregate.snapshot_total();
        let target = self.target_for(totals);
        tracing::info!(
            "reductions upload {} / download {}, new targets upload {}{} / download {}{}",
            totals.upload,
            totals.download,
            target.upload,
            self.units,
            target.download,
            self.units
        );

        let mut clients = self.clients.lock().expect("client list lock poisoned");
        let mut outcomes: Vec<ClientOutcome> = Vec::with_capacity(clients.len());
        let mut counted: Vec<usize> = Vec::new();
        let mut counts: Vec<u32> = Vec::new();

        for (i, client) in clients.iter_mut().enumerate() {
            let label = client.label().to_string();
            match client.active_session_count() {
                Ok(active) => {
                    tracing::debug!(client = %label, "{} active torrents", active);
                    counted.push(i);
                    counts.push(active);
                    outcomes.push(ClientOutcome {
                        label,
                        active: Some(active),
                        limits: None,
                        errors: Vec::new(),
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        client = %label,
                        "failed to get active torrents, skipping: {}",
                        e
                    );
                    outcomes.push(ClientOutcome {
                        label,
                        active: None,
                        limits: None,
                        errors: vec![e.to_string()],
                    });
                }
            }
        }

        for (&i, limits) in counted.iter().zip(allocate(target, &counts)) {
            let client = &mut clients[i];
            let outcome = &mut outcomes[i];
            if let Err(e) = client.set_upload_limit(limits.upload) {
                tracing::warn!(client = %outcome.label, "failed to set upload limit: {}", e);
                outcome.errors.push(e.to_string());
            }
            if let Err(e) = client.set_download_limit(limits.download) {
                tracing::warn!(client = %outcome.label, "failed to set download limit: {}", e);
                outcome.errors.push(e.to_string());
            }
            if outcome.is_ok() {
                tracing::info!(
                    client = %outcome.label,
                    "set upload {}{} / download {}{}",
                    limits.upload,
                    self.units,
                    limits.download,
                    self.units
                );
            }
            outcome.limits = Some(limits);
        }

        CycleReport {
            totals,
            target,
            outcomes,
        }
    }

    /// Wait for updates and apply them until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let signal = Arc::clone(self.aggregate.signal());
        loop {
            let raised = tokio::select! {
                _ = cancel.cancelled() => break,
                raised = signal.await_and_consume(SIGNAL_WAIT) => raised,
            };
            if !raised {
                continue;
            }

            tracing::debug!("update signal raised");
            let cycle = self.clone();
            let handle = tokio::task::spawn_blocking(move || cycle.apply_cycle());
            // An in-flight cycle is left to finish on the blocking pool.
            tokio::select! {
                _ = cancel.cancelled() => break,
                joined = handle => {
                    if let Err(e) = joined {
                        tracing::error!("control cycle panicked: {}", e);
                    }
                }
            }
        }
        tracing::debug!("control loop stopped");
    }
}

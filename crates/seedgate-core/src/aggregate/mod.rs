//! Reduction aggregate: the latest reduction requested by every contributor.
//!
//! Contributors (media-server pollers, schedule windows) each own one entry
//! and replace it wholesale. The control loop reads the summed total. All
//! reads and read-compare-write updates happen under a single lock
//! acquisition, so a total never reflects a half-applied update and no
//! contributor's write can be lost to a concurrent reader.

mod signal;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

pub use signal::UpdateSignal;

/// Stable identity of one configured contributor instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContributorId(String);

impl ContributorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContributorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A contributor's requested reduction, in configured units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Contribution {
    pub upload: f64,
    pub download: f64,
}

impl Contribution {
    pub const ZERO: Contribution = Contribution {
        upload: 0.0,
        download: 0.0,
    };

    pub fn new(upload: f64, download: f64) -> Self {
        Self { upload, download }
    }

    pub fn upload_only(upload: f64) -> Self {
        Self {
            upload,
            download: 0.0,
        }
    }
}

/// Sum of all present contributions.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ReductionTotals {
    pub upload: f64,
    pub download: f64,
}

/// Shared map of contributor id -> contribution, plus the update signal.
#[derive(Debug)]
pub struct ReductionAggregate {
    entries: Mutex<HashMap<ContributorId, Contribution>>,
    signal: Arc<UpdateSignal>,
}

impl Default for ReductionAggregate {
    fn default() -> Self {
        Self::new()
    }
}

impl ReductionAggregate {
    pub fn new() -> Self {
        Self::with_signal(Arc::new(UpdateSignal::new()))
    }

    pub fn with_signal(signal: Arc<UpdateSignal>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            signal,
        }
    }

    pub fn signal(&self) -> &Arc<UpdateSignal> {
        &self.signal
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ContributorId, Contribution>> {
        // A poisoned map means a contributor panicked mid-update: a defect,
        // not a runtime condition.
        self.entries.lock().expect("reduction aggregate lock poisoned")
    }

    /// Insert an explicit zero for `id` if it has no entry yet. Does not raise
    /// the signal; used at startup so the first real poll of an idle server
    /// is a no-op.
    pub fn register(&self, id: &ContributorId) {
        self.lock().entry(id.clone()).or_insert(Contribution::ZERO);
    }

    /// Store `value` for `id`. Returns true and raises the signal only if the
    /// stored value changed.
    pub fn set(&self, id: &ContributorId, value: Contribution) -> bool {
        let changed = {
            let mut entries = self.lock();
            match entries.get(id) {
                Some(current) if *current == value => false,
                _ => {
                    entries.insert(id.clone(), value);
                    true
                }
            }
        };
        if changed {
            self.signal.raise();
        }
        changed
    }

    /// Remove the entry for `id`. Returns true and raises the signal only if
    /// an entry was present.
    pub fn remove(&self, id: &ContributorId) -> bool {
        let changed = self.lock().remove(id).is_some();
        if changed {
            self.signal.raise();
        }
        changed
    }

    pub fn get(&self, id: &ContributorId) -> Option<Contribution> {
        self.lock().get(id).copied()
    }

    /// Sum of every present contribution, read under one lock.
    pub fn snapshot_total(&self) -> ReductionTotals {
        self.lock()
            .values()
            .fold(ReductionTotals::default(), |acc, c| ReductionTotals {
                upload: acc.upload + c.upload,
                download: acc.download + c.download,
            })
    }

    /// All entries sorted by id (for logging and `check`).
    pub fn entries(&self) -> Vec<(ContributorId, Contribution)> {
        let mut entries: Vec<_> = self
            .lock()
            .iter()
            .map(|(id, c)| (id.clone(), *c))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

//! Target computation and proportional split across clients.

/// Configured min/max speed for one direction, in configured units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedBounds {
    pub min: f64,
    pub max: f64,
}

impl SpeedBounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// `max - reduction`, floored at `min`.
    pub fn target(&self, reduction: f64) -> f64 {
        (self.max - reduction).max(self.min)
    }
}

/// Global target speeds for one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedTarget {
    pub upload: f64,
    pub download: f64,
}

/// Limits dispatched to one client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientAllocation {
    pub upload: f64,
    pub download: f64,
}

/// Split `target` across clients by their active session counts.
///
/// A client with no active sessions gets the whole target; otherwise it gets
/// `count / total * target`. When idle and active clients coexist the sum
/// exceeds `target`.
pub fn split_target(target: f64, counts: &[u32]) -> Vec<f64> {
    let total: u64 = counts.iter().map(|&c| u64::from(c)).sum();
    counts
        .iter()
        .map(|&count| {
            if count == 0 {
                target
            } else {
                f64::from(count) / total as f64 * target
            }
        })
        .collect()
}

/// Split both directions independently.
pub fn allocate(target: SpeedTarget, counts: &[u32]) -> Vec<ClientAllocation> {
    split_target(target.upload, counts)
        .into_iter()
        .zip(split_target(target.download, counts))
        .map(|(upload, download)| ClientAllocation { upload, download })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_is_max_minus_reduction_floored_at_min() {
        let bounds = SpeedBounds::new(1.0, 20.0);
        assert_eq!(bounds.target(0.0), 20.0);
        assert_eq!(bounds.target(5.0), 15.0);
        assert_eq!(bounds.target(19.5), 1.0);
        assert_eq!(bounds.target(100.0), 1.0);
    }

    #[test]
    fn idle_clients_get_the_full_target() {
        let split = split_target(1000.0, &[0, 2, 3]);
        assert_eq!(split, vec![1000.0, 400.0, 600.0]);
        // Idle and active clients together are allowed more than the target.
        let sum: f64 = split.iter().sum();
        assert_eq!(sum, 2000.0);
        assert!(sum > 1000.0);
    }

    #[test]
    fn active_clients_share_the_target() {
        let split = split_target(900.0, &[1, 2]);
        assert_eq!(split, vec![300.0, 600.0]);
        assert_eq!(split_target(10.0, &[0, 0]), vec![10.0, 10.0]);
        assert!(split_target(10.0, &[]).is_empty());
    }

    #[test]
    fn allocate_splits_directions_independently() {
        let target = SpeedTarget {
            upload: 10.0,
            download: 100.0,
        };
        let allocs = allocate(target, &[1, 3]);
        assert_eq!(
            allocs,
            vec![
                ClientAllocation {
                    upload: 2.5,
                    download: 25.0
                },
                ClientAllocation {
                    upload: 7.5,
                    download: 75.0
                },
            ]
        );
    }
}

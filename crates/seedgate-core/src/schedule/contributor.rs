//! Schedule contributor: one task per window, sleeping until the next edge.

use chrono::{DateTime, Local, TimeZone};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::occurrence::WindowState;
use super::window::ScheduleWindow;
use crate::aggregate::{ContributorId, ReductionAggregate};
use crate::error::ConfigError;

/// Upper bound on a single sleep. Re-evaluating periodically picks up wall
/// clock jumps (suspend/resume, manual clock changes); the aggregate
/// suppresses the resulting no-op updates.
const MAX_SLEEP: Duration = Duration::from_secs(60);

pub struct ScheduleContributor {
    id: ContributorId,
    window: ScheduleWindow,
    aggregate: Arc<ReductionAggregate>,
    state: Option<WindowState>,
}

impl ScheduleContributor {
    pub fn new(index: usize, window: ScheduleWindow, aggregate: Arc<ReductionAggregate>) -> Self {
        let id = ContributorId::new(format!("schedule#{}|{}", index, window.label()));
        Self {
            id,
            window,
            aggregate,
            state: None,
        }
    }

    pub fn id(&self) -> &ContributorId {
        &self.id
    }

    pub fn window(&self) -> &ScheduleWindow {
        &self.window
    }

    /// State after the last [`step`](Self::step); `None` before the first.
    pub fn state(&self) -> Option<WindowState> {
        self.state
    }

    /// Evaluate the window at `now`, push the result into the aggregate and
    /// return when to evaluate next.
    pub fn step<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) -> Result<DateTime<Tz>, ConfigError>
    where
        Tz::Offset: std::fmt::Display,
    {
        let decision = self.window.decide(now)?;
        tracing::debug!(
            contributor = %self.id,
            "next start {}, next end {}",
            decision.next_start,
            decision.next_end
        );

        match decision.state {
            WindowState::InsideWindow => {
                self.aggregate.set(&self.id, self.window.reduction());
            }
            WindowState::OutsideWindow => {
                self.aggregate.remove(&self.id);
            }
        }

        if self.state != Some(decision.state) {
            match decision.state {
                WindowState::InsideWindow => tracing::info!(
                    contributor = %self.id,
                    "window open until {}, reducing upload by {} and download by {}",
                    decision.next_end,
                    self.window.reduction().upload,
                    self.window.reduction().download
                ),
                WindowState::OutsideWindow => tracing::info!(
                    contributor = %self.id,
                    "window closed until {}",
                    decision.next_start
                ),
            }
            self.state = Some(decision.state);
        }

        Ok(decision.wake_at().clone())
    }

    /// Step at `now` and return how long to sleep before the next step. A
    /// failed evaluation is logged and retried after [`MAX_SLEEP`]; the
    /// aggregate entry keeps its last value meanwhile.
    pub fn next_delay<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) -> Duration
    where
        Tz::Offset: std::fmt::Display,
    {
        match self.step(now) {
            Ok(wake_at) => (wake_at - now.clone())
                .to_std()
                .unwrap_or(Duration::ZERO)
                .min(MAX_SLEEP),
            Err(e) => {
                tracing::warn!(contributor = %self.id, "cannot evaluate window: {}", e);
                MAX_SLEEP
            }
        }
    }

    /// Run until `cancel` fires, evaluating at every window edge.
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            let delay = self.next_delay(&Local::now());
            tracing::trace!(contributor = %self.id, "sleeping for {:?}", delay);

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        tracing::debug!(contributor = %self.id, "schedule contributor stopped");
    }
}

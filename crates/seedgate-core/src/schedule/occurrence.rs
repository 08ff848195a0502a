//! Next-occurrence computation and the inside/outside decision.
//!
//! Edges are found and compared as local wall-clock times; they are mapped to
//! instants only afterwards, to know how long to sleep. Two distinct times of
//! day therefore keep their order across DST transitions.

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDateTime, NaiveTime, TimeZone};
use std::cmp::Ordering;

use super::window::{ScheduleWindow, WeekdaySet};
use crate::error::ConfigError;

/// First local date-time strictly after `now` whose weekday is in `days` and
/// whose time of day is `at`. Scans today and the following seven days, so a
/// slot already passed today lands on the next permitted day, wrapping across
/// the week boundary.
fn next_local(
    now: NaiveDateTime,
    at: NaiveTime,
    days: WeekdaySet,
) -> Result<NaiveDateTime, ConfigError> {
    if days.is_empty() {
        return Err(ConfigError::EmptyWeekdays);
    }
    (0..=7)
        .map(|offset| now.date() + Duration::days(offset))
        .filter(|date| days.contains(date.weekday()))
        .map(|date| date.and_time(at))
        .find(|candidate| *candidate > now)
        // Offset 7 is the same weekday a week later, so a non-empty set
        // always matches.
        .ok_or(ConfigError::EmptyWeekdays)
}

/// Map a local date-time later than `now` to an instant.
///
/// Ambiguous times (DST fall-back) take the earlier instant unless it has
/// already passed. Skipped times (DST spring-forward) map to the first
/// instant after the gap, so every skipped time lands on the same instant and
/// none overtakes a later time of day.
fn resolve_local<Tz: TimeZone>(now: &DateTime<Tz>, naive: NaiveDateTime) -> DateTime<Tz> {
    let tz = now.timezone();
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(t) => t,
        LocalResult::Ambiguous(early, late) => {
            if early > *now {
                early
            } else {
                late
            }
        }
        LocalResult::None => (1..=24 * 60)
            .find_map(|m| {
                tz.from_local_datetime(&(naive + Duration::minutes(m)))
                    .earliest()
            })
            .unwrap_or_else(|| tz.from_utc_datetime(&naive)),
    }
}

/// First moment strictly after `now` whose weekday is in `days` and whose
/// local time of day is `at`.
pub fn next_occurrence<Tz: TimeZone>(
    now: &DateTime<Tz>,
    at: NaiveTime,
    days: WeekdaySet,
) -> Result<DateTime<Tz>, ConfigError> {
    let naive = next_local(now.naive_local(), at, days)?;
    Ok(resolve_local(now, naive))
}

/// Whether "now" falls inside a schedule window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    OutsideWindow,
    InsideWindow,
}

/// Outcome of evaluating a window at one instant.
#[derive(Debug, Clone)]
pub struct WindowDecision<Tz: TimeZone> {
    pub state: WindowState,
    pub next_start: DateTime<Tz>,
    pub next_end: DateTime<Tz>,
}

impl<Tz: TimeZone> WindowDecision<Tz> {
    /// When the state can next change: the end while inside, the start while
    /// outside.
    pub fn wake_at(&self) -> &DateTime<Tz> {
        match self.state {
            WindowState::InsideWindow => &self.next_end,
            WindowState::OutsideWindow => &self.next_start,
        }
    }
}

impl ScheduleWindow {
    /// Evaluate the window at `now`. If the next end comes before the next
    /// start, a window has already opened and we are inside it.
    pub fn decide<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
    ) -> Result<WindowDecision<Tz>, ConfigError> {
        let local = now.naive_local();
        let start = next_local(local, self.start(), self.days())?;
        let end = next_local(local, self.end(), self.days())?;
        let state = match start.cmp(&end) {
            Ordering::Greater => WindowState::InsideWindow,
            Ordering::Less => WindowState::OutsideWindow,
            // Distinct times of day never meet; `new` rejects equal ones.
            Ordering::Equal => {
                return Err(ConfigError::EqualStartEnd(
                    self.start().format("%H:%M").to_string(),
                ))
            }
        };
        Ok(WindowDecision {
            state,
            next_start: resolve_local(now, start),
            next_end: resolve_local(now, end),
        })
    }
}

//! Time-of-day / day-of-week schedules.
//!
//! A [`ScheduleWindow`] is a fixed reduction that applies between a start and
//! an end time of day on a set of weekdays. Its [`ScheduleContributor`] wakes
//! at each window edge and sets or removes its aggregate entry.

mod contributor;
mod occurrence;
mod window;

pub use contributor::ScheduleContributor;
pub use occurrence::{next_occurrence, WindowDecision, WindowState};
pub use window::{parse_time_of_day, ScheduleWindow, WeekdaySet};

//! Schedule window: time-of-day range, weekday set and fixed reduction.

use chrono::{NaiveTime, Weekday};
use std::fmt;

use crate::aggregate::Contribution;
use crate::config::ScheduleConfig;
use crate::error::ConfigError;

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Set of weekdays, one bit per day (Monday = bit 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub const ALL: WeekdaySet = WeekdaySet(0b111_1111);
    pub const EMPTY: WeekdaySet = WeekdaySet(0);

    /// Parse config names: `mon`..`sun` (case-insensitive) or `all`.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, ConfigError> {
        let mut set = WeekdaySet::EMPTY;
        for name in names {
            let name = name.as_ref().trim().to_ascii_lowercase();
            if name == "all" {
                return Ok(WeekdaySet::ALL);
            }
            let day = match name.as_str() {
                "mon" => Weekday::Mon,
                "tue" => Weekday::Tue,
                "wed" => Weekday::Wed,
                "thu" => Weekday::Thu,
                "fri" => Weekday::Fri,
                "sat" => Weekday::Sat,
                "sun" => Weekday::Sun,
                _ => return Err(ConfigError::UnknownWeekday(name)),
            };
            set.insert(day);
        }
        if set.is_empty() {
            return Err(ConfigError::EmptyWeekdays);
        }
        Ok(set)
    }

    pub fn from_days(days: &[Weekday]) -> Self {
        let mut set = WeekdaySet::EMPTY;
        for day in days {
            set.insert(*day);
        }
        set
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= 1 << day.num_days_from_monday();
    }

    pub fn contains(self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Weekday> {
        WEEK.into_iter().filter(move |d| self.contains(*d))
    }
}

impl fmt::Display for WeekdaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == WeekdaySet::ALL {
            return f.write_str("all");
        }
        let names: Vec<String> = self
            .iter()
            .map(|d| d.to_string().to_ascii_lowercase())
            .collect();
        f.write_str(&names.join(","))
    }
}

/// Parse `HH:MM` into a time of day.
pub fn parse_time_of_day(s: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|_| ConfigError::InvalidTime(s.to_string()))
}

/// A validated schedule window. Reductions are resolved to absolute amounts in
/// configured units at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleWindow {
    start: NaiveTime,
    end: NaiveTime,
    days: WeekdaySet,
    reduction: Contribution,
}

impl ScheduleWindow {
    pub fn new(
        start: NaiveTime,
        end: NaiveTime,
        days: WeekdaySet,
        reduction: Contribution,
    ) -> Result<Self, ConfigError> {
        if start == end {
            return Err(ConfigError::EqualStartEnd(start.format("%H:%M").to_string()));
        }
        if days.is_empty() {
            return Err(ConfigError::EmptyWeekdays);
        }
        Ok(Self {
            start,
            end,
            days,
            reduction,
        })
    }

    /// Build from config. Upload percentages are of `max_upload`, download
    /// percentages of `max_download`.
    pub fn from_config(
        cfg: &ScheduleConfig,
        max_upload: f64,
        max_download: f64,
    ) -> Result<Self, ConfigError> {
        let start = parse_time_of_day(&cfg.start)?;
        let end = parse_time_of_day(&cfg.end)?;
        let days = WeekdaySet::from_names(&cfg.days)?;
        let reduction = Contribution::new(
            cfg.upload.resolve(max_upload)?,
            cfg.download.resolve(max_download)?,
        );
        Self::new(start, end, days, reduction)
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    pub fn days(&self) -> WeekdaySet {
        self.days
    }

    pub fn reduction(&self) -> Contribution {
        self.reduction
    }

    /// Short label such as `22:00-06:00 [all]`.
    pub fn label(&self) -> String {
        format!(
            "{}-{} [{}]",
            self.start.format("%H:%M"),
            self.end.format("%H:%M"),
            self.days
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReductionSpec;

    fn cfg(start: &str, end: &str, days: &[&str]) -> ScheduleConfig {
        ScheduleConfig {
            start: start.to_string(),
            end: end.to_string(),
            days: days.iter().map(|d| d.to_string()).collect(),
            upload: ReductionSpec::Text("50%".to_string()),
            download: ReductionSpec::Text("10%".to_string()),
        }
    }

    #[test]
    fn weekday_names_parse() {
        let set = WeekdaySet::from_names(&["mon", "Wed", " sun "]).unwrap();
        assert!(set.contains(Weekday::Mon));
        assert!(set.contains(Weekday::Wed));
        assert!(set.contains(Weekday::Sun));
        assert!(!set.contains(Weekday::Tue));
        assert_eq!(set.to_string(), "mon,wed,sun");
    }

    #[test]
    fn all_wildcard_covers_the_week() {
        let set = WeekdaySet::from_names(&["mon", "all"]).unwrap();
        assert_eq!(set, WeekdaySet::ALL);
        assert_eq!(set.iter().count(), 7);
        assert_eq!(set.to_string(), "all");
    }

    #[test]
    fn empty_or_unknown_weekdays_are_rejected() {
        let none: [&str; 0] = [];
        assert!(matches!(
            WeekdaySet::from_names(&none),
            Err(ConfigError::EmptyWeekdays)
        ));
        assert!(matches!(
            WeekdaySet::from_names(&["mon", "funday"]),
            Err(ConfigError::UnknownWeekday(_))
        ));
    }

    #[test]
    fn time_of_day_parses_hh_mm() {
        assert_eq!(
            parse_time_of_day("06:30").unwrap(),
            NaiveTime::from_hms_opt(6, 30, 0).unwrap()
        );
        assert!(matches!(
            parse_time_of_day("25:00"),
            Err(ConfigError::InvalidTime(_))
        ));
        assert!(matches!(
            parse_time_of_day("noon"),
            Err(ConfigError::InvalidTime(_))
        ));
    }

    #[test]
    fn from_config_resolves_percentages_against_their_own_max() {
        let window = ScheduleWindow::from_config(&cfg("22:00", "06:00", &["all"]), 20.0, 200.0)
            .unwrap();
        assert_eq!(window.reduction(), Contribution::new(10.0, 20.0));
        assert_eq!(window.label(), "22:00-06:00 [all]");
    }

    #[test]
    fn equal_start_and_end_fails_fast() {
        let err = ScheduleWindow::from_config(&cfg("08:15", "08:15", &["all"]), 10.0, 10.0)
            .unwrap_err();
        assert!(matches!(err, ConfigError::EqualStartEnd(ref t) if t == "08:15"));
    }

    #[test]
    fn new_rejects_empty_day_set() {
        let t = |h| NaiveTime::from_hms_opt(h, 0, 0).unwrap();
        assert!(matches!(
            ScheduleWindow::new(t(1), t(2), WeekdaySet::EMPTY, Contribution::ZERO),
            Err(ConfigError::EmptyWeekdays)
        ));
    }
}

use core::fmt;

use jiff::civil;
use serde::{Deserialize, Serialize};

/// Upper bound on stored watering windows, matching the persisted image.
pub const MAX_INTERVALS: usize = 8;

/// Wall-clock time of day with minute resolution.
///
/// `hour` is 0..=23 and `minute` 0..=59; values are compared through
/// [`TimeOfDay::minutes`], so the derived ordering is chronological.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
}

impl TimeOfDay {
    pub const fn new(hour: u8, minute: u8) -> Self {
        Self { hour, minute }
    }

    /// Minutes since midnight.
    pub const fn minutes(self) -> u16 {
        self.hour as u16 * 60 + self.minute as u16
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Set of weekdays as a 7-bit mask, bit 0 = Sunday through bit 6 = Saturday.
///
/// The empty set is a valid state: such an interval stays configured but
/// never matches.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Weekdays(u8);

impl Weekdays {
    pub const EMPTY: Weekdays = Weekdays(0);
    pub const SUNDAY: Weekdays = Weekdays(1 << 0);
    pub const MONDAY: Weekdays = Weekdays(1 << 1);
    pub const TUESDAY: Weekdays = Weekdays(1 << 2);
    pub const WEDNESDAY: Weekdays = Weekdays(1 << 3);
    pub const THURSDAY: Weekdays = Weekdays(1 << 4);
    pub const FRIDAY: Weekdays = Weekdays(1 << 5);
    pub const SATURDAY: Weekdays = Weekdays(1 << 6);
    pub const EVERY_DAY: Weekdays = Weekdays(0x7f);

    /// Builds a set from raw bits; anything above bit 6 is discarded.
    pub const fn from_bits(bits: u8) -> Self {
        Weekdays(bits & 0x7f)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, day: civil::Weekday) -> bool {
        self.0 & (1 << day.to_sunday_zero_offset()) != 0
    }
}

impl core::ops::BitOr for Weekdays {
    type Output = Weekdays;

    fn bitor(self, rhs: Weekdays) -> Weekdays {
        Weekdays(self.0 | rhs.0)
    }
}

const DAY_LETTERS: [char; 7] = ['S', 'M', 'T', 'W', 'T', 'F', 'S'];

impl fmt::Display for Weekdays {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (bit, letter) in DAY_LETTERS.iter().enumerate() {
            if self.0 & (1 << bit) != 0 {
                write!(f, "{}", letter)?;
            } else {
                write!(f, "-")?;
            }
        }
        Ok(())
    }
}

/// One recurring watering window.
///
/// Active from `start` (inclusive) to `stop` (exclusive) on every day in
/// `days`. The default value is the inert all-zero record used to pad the
/// fixed-size persisted image.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Interval {
    pub start: TimeOfDay,
    pub stop: TimeOfDay,
    pub days: Weekdays,
}

impl Interval {
    pub const fn new(start: TimeOfDay, stop: TimeOfDay, days: Weekdays) -> Self {
        Self { start, stop, days }
    }

    /// Whether the window covers the given local wall-clock moment.
    pub fn covers(&self, at: civil::DateTime) -> bool {
        if !self.days.contains(at.weekday()) {
            return false;
        }
        let now = at.hour() as u16 * 60 + at.minute() as u16;
        self.start.minutes() <= now && now < self.stop.minutes()
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{} {}", self.start, self.stop, self.days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;

    fn monday_window() -> Interval {
        Interval::new(
            TimeOfDay::new(6, 0),
            TimeOfDay::new(6, 30),
            Weekdays::MONDAY,
        )
    }

    #[test]
    fn time_of_day_orders_chronologically() {
        assert!(TimeOfDay::new(6, 59) < TimeOfDay::new(7, 0));
        assert_eq!(TimeOfDay::new(23, 59).minutes(), 1439);
        assert_eq!(TimeOfDay::default().minutes(), 0);
    }

    #[test]
    fn start_is_inclusive_stop_is_exclusive() {
        let window = monday_window();
        // 2025-06-02 is a Monday
        assert!(window.covers(date(2025, 6, 2).at(6, 0, 0, 0)));
        assert!(window.covers(date(2025, 6, 2).at(6, 29, 59, 0)));
        assert!(!window.covers(date(2025, 6, 2).at(6, 30, 0, 0)));
        assert!(!window.covers(date(2025, 6, 2).at(5, 59, 0, 0)));
    }

    #[test]
    fn wrong_weekday_never_matches() {
        let window = monday_window();
        // Same time on a Tuesday
        assert!(!window.covers(date(2025, 6, 3).at(6, 15, 0, 0)));
    }

    #[test]
    fn empty_day_set_is_inert() {
        let window = Interval::new(
            TimeOfDay::new(0, 0),
            TimeOfDay::new(23, 59),
            Weekdays::EMPTY,
        );
        for day in 1..=7 {
            assert!(!window.covers(date(2025, 6, day).at(12, 0, 0, 0)));
        }
    }

    #[test]
    fn default_interval_is_the_inert_sentinel() {
        let sentinel = Interval::default();
        assert_eq!(sentinel.start.minutes(), 0);
        assert_eq!(sentinel.stop.minutes(), 0);
        assert!(sentinel.days.is_empty());
        assert!(!sentinel.covers(date(2025, 6, 2).at(0, 0, 0, 0)));
    }

    #[test]
    fn weekday_bits_line_up_with_jiff() {
        let sunday = date(2025, 6, 1);
        assert_eq!(sunday.weekday().to_sunday_zero_offset(), 0);
        assert!(Weekdays::SUNDAY.contains(sunday.weekday()));
        assert!(Weekdays::SATURDAY.contains(date(2025, 6, 7).weekday()));
        assert!(!Weekdays::SUNDAY.contains(date(2025, 6, 7).weekday()));
        assert_eq!(Weekdays::EVERY_DAY.bits(), 0x7f);
        assert_eq!(Weekdays::from_bits(0xff).bits(), 0x7f);
    }

    #[test]
    fn display_formats_window_and_days() {
        let window = Interval::new(
            TimeOfDay::new(6, 0),
            TimeOfDay::new(18, 5),
            Weekdays::MONDAY | Weekdays::FRIDAY,
        );
        assert_eq!(format!("{}", window), "06:00-18:05 -M---F-");
    }
}

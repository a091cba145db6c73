use core::fmt;
use core::str::FromStr;

use embedded_hal::digital::OutputPin;
use heapless::Vec;
use jiff::civil;
use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ScheduleError};
use crate::schedule::{Interval, MAX_INTERVALS};

/// Threshold a fresh device starts with. Zero means any reading passes, so
/// automatic mode degenerates to scheduled until the operator sets a limit.
pub const DEFAULT_THRESHOLD: u16 = 0;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OperatingMode {
    /// Schedule evaluation is off; the relay only moves on explicit toggles.
    Manual,
    /// Follow the interval table.
    #[default]
    Scheduled,
    /// Follow the interval table, but only switch on with enough water.
    Automatic,
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperatingMode::Manual => "manual",
            OperatingMode::Scheduled => "scheduled",
            OperatingMode::Automatic => "automatic",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for OperatingMode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(OperatingMode::Manual),
            "scheduled" => Ok(OperatingMode::Scheduled),
            "automatic" => Ok(OperatingMode::Automatic),
            _ => Err(ParseError::InvalidArgument),
        }
    }
}

/// Pump relay plus its indicator LED, driven by the weekly schedule.
///
/// The relay and the LED are owned here and move together; nothing else in
/// the firmware touches those pins. All mutation goes through this API and
/// is expected to run on a single task, so the mode/cache/state triple is
/// always updated as a unit.
pub struct Pump<R, L> {
    relay: R,
    led: L,
    relay_on: bool,
    mode: OperatingMode,
    cached_mode: OperatingMode,
    scheduled_state: bool,
    threshold: u16,
    intervals: Vec<Interval, MAX_INTERVALS>,
}

impl<R: OutputPin, L: OutputPin> Pump<R, L> {
    pub fn new(relay: R, led: L) -> Self {
        Self {
            relay,
            led,
            relay_on: false,
            mode: OperatingMode::default(),
            cached_mode: OperatingMode::default(),
            scheduled_state: false,
            threshold: DEFAULT_THRESHOLD,
            intervals: Vec::new(),
        }
    }

    /// Periodic schedule evaluation; call at least once per minute boundary.
    ///
    /// Computes whether any interval covers `now` and acts only on a change
    /// of that result (edge triggered), so repeated calls with unchanged
    /// inputs never touch the hardware. `None` for `now` means the wall
    /// clock is not available yet and matches no interval. In automatic
    /// mode an edge to "on" with `water_level` below the threshold leaves
    /// the relay off; the level alone rising later does not retrigger until
    /// the next schedule edge.
    ///
    /// Returns whether an edge was seen.
    pub fn evaluate(&mut self, now: Option<civil::DateTime>, water_level: u16) -> bool {
        if self.mode == OperatingMode::Manual {
            return false;
        }

        // Every interval is checked; overlapping windows OR together.
        let new_state = match now {
            Some(at) => self
                .intervals
                .iter()
                .fold(false, |on, window| on | window.covers(at)),
            None => false,
        };

        if new_state == self.scheduled_state {
            return false;
        }
        self.scheduled_state = new_state;

        let on = new_state
            && (self.mode != OperatingMode::Automatic || water_level >= self.threshold);
        self.drive(on);
        true
    }

    /// Suspend schedule evaluation, remembering the mode to come back to.
    /// The relay keeps whatever state it currently has.
    pub fn pause(&mut self) {
        if self.mode != OperatingMode::Manual {
            self.cached_mode = self.mode;
            self.mode = OperatingMode::Manual;
        }
    }

    /// Return to the mode active before [`Pump::pause`]. The recorded
    /// schedule state is kept, so the next evaluation sees no forced edge.
    pub fn resume(&mut self) {
        self.mode = self.cached_mode;
    }

    /// Flip the relay regardless of mode. The recorded schedule state stays
    /// untouched, so the next schedule edge can immediately override this.
    pub fn toggle(&mut self) {
        let on = !self.relay_on;
        self.drive(on);
    }

    /// Explicit mode selection. Also rewrites the pause cache, so a later
    /// pause/resume pair lands back on the mode chosen here.
    pub fn set_mode(&mut self, mode: OperatingMode) {
        self.mode = mode;
        self.cached_mode = mode;
    }

    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    pub fn set_threshold(&mut self, level: u16) {
        self.threshold = level;
    }

    pub fn threshold(&self) -> u16 {
        self.threshold
    }

    pub fn add_interval(&mut self, window: Interval) -> Result<(), ScheduleError> {
        self.intervals
            .push(window)
            .map_err(|_| ScheduleError::CapacityExceeded)
    }

    pub fn remove_interval(&mut self, index: usize) -> Result<Interval, ScheduleError> {
        if index < self.intervals.len() {
            Ok(self.intervals.remove(index))
        } else {
            Err(ScheduleError::IndexOutOfRange)
        }
    }

    pub fn replace_intervals(&mut self, windows: &[Interval]) -> Result<(), ScheduleError> {
        if windows.len() > MAX_INTERVALS {
            return Err(ScheduleError::CapacityExceeded);
        }
        self.intervals.clear();
        self.intervals
            .extend_from_slice(windows)
            .map_err(|_| ScheduleError::CapacityExceeded)
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn is_on(&self) -> bool {
        self.relay_on
    }

    pub fn scheduled_state(&self) -> bool {
        self.scheduled_state
    }

    fn drive(&mut self, on: bool) {
        self.relay_on = on;
        if on {
            self.relay.set_high().ok();
            self.led.set_high().ok();
        } else {
            self.relay.set_low().ok();
            self.led.set_low().ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{TimeOfDay, Weekdays};
    use core::convert::Infallible;
    use jiff::civil::{DateTime, date};
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct MockPin {
        level: Rc<Cell<bool>>,
    }

    impl embedded_hal::digital::ErrorType for MockPin {
        type Error = Infallible;
    }

    impl OutputPin for MockPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.level.set(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.level.set(true);
            Ok(())
        }
    }

    fn rig() -> (Pump<MockPin, MockPin>, Rc<Cell<bool>>, Rc<Cell<bool>>) {
        let relay = MockPin::default();
        let led = MockPin::default();
        let relay_level = relay.level.clone();
        let led_level = led.level.clone();
        (Pump::new(relay, led), relay_level, led_level)
    }

    fn morning_window() -> Interval {
        Interval::new(
            TimeOfDay::new(6, 0),
            TimeOfDay::new(6, 30),
            Weekdays::MONDAY,
        )
    }

    // 2025-06-02 was a Monday.
    fn monday(hour: i8, minute: i8) -> Option<DateTime> {
        Some(date(2025, 6, 2).at(hour, minute, 0, 0))
    }

    #[test]
    fn monday_morning_scenario() {
        let (mut pump, relay, led) = rig();
        pump.add_interval(morning_window()).unwrap();

        assert!(pump.evaluate(monday(6, 15), 0));
        assert!(relay.get());
        assert!(led.get());

        // Same minute again: no edge, no flicker.
        assert!(!pump.evaluate(monday(6, 15), 0));
        assert!(relay.get());

        // Window end switches off.
        assert!(pump.evaluate(monday(6, 30), 0));
        assert!(!relay.get());
        assert!(!led.get());
    }

    #[test]
    fn repeated_evaluation_is_idempotent() {
        let (mut pump, _, _) = rig();
        pump.add_interval(morning_window()).unwrap();

        for now in [monday(6, 15), monday(12, 0), None] {
            pump.evaluate(now, 0);
            assert!(!pump.evaluate(now, 0));
        }
    }

    #[test]
    fn overlapping_windows_or_together() {
        let (mut pump, relay, _) = rig();
        pump.add_interval(morning_window()).unwrap();
        pump.add_interval(Interval::new(
            TimeOfDay::new(6, 10),
            TimeOfDay::new(7, 0),
            Weekdays::EVERY_DAY,
        ))
        .unwrap();

        assert!(pump.evaluate(monday(6, 15), 0));
        assert!(relay.get());
        // Leaving the first window keeps the second one active: no edge.
        assert!(!pump.evaluate(monday(6, 45), 0));
        assert!(relay.get());
    }

    #[test]
    fn manual_mode_absorbs_schedule_edges() {
        let (mut pump, relay, _) = rig();
        pump.add_interval(morning_window()).unwrap();
        pump.set_mode(OperatingMode::Manual);

        assert!(!pump.evaluate(monday(6, 15), 1000));
        assert!(!relay.get());
        assert!(!pump.scheduled_state());
    }

    #[test]
    fn pause_resume_round_trips_every_mode() {
        for mode in [
            OperatingMode::Manual,
            OperatingMode::Scheduled,
            OperatingMode::Automatic,
        ] {
            let (mut pump, _, _) = rig();
            pump.set_mode(mode);
            pump.pause();
            assert_eq!(pump.mode(), OperatingMode::Manual);
            pump.resume();
            assert_eq!(pump.mode(), mode);
        }
    }

    #[test]
    fn pause_keeps_relay_state() {
        let (mut pump, relay, _) = rig();
        pump.add_interval(morning_window()).unwrap();
        pump.evaluate(monday(6, 15), 0);
        assert!(relay.get());

        pump.pause();
        assert!(relay.get());
        // Paused: the window end passes without an edge.
        assert!(!pump.evaluate(monday(6, 30), 0));
        assert!(relay.get());
    }

    #[test]
    fn resume_does_not_force_an_edge() {
        let (mut pump, relay, _) = rig();
        pump.add_interval(morning_window()).unwrap();
        pump.evaluate(monday(6, 15), 0);
        pump.pause();
        pump.resume();

        // Still inside the window, schedule state unchanged.
        assert!(!pump.evaluate(monday(6, 20), 0));
        assert!(relay.get());
    }

    #[test]
    fn automatic_mode_respects_threshold() {
        let (mut pump, relay, _) = rig();
        pump.add_interval(morning_window()).unwrap();
        pump.set_mode(OperatingMode::Automatic);
        pump.set_threshold(500);

        // Edge to "on" with too little water: relay stays off but the
        // schedule state records the window.
        assert!(pump.evaluate(monday(6, 15), 400));
        assert!(!relay.get());
        assert!(pump.scheduled_state());

        // Water rising without a schedule edge does not retrigger.
        assert!(!pump.evaluate(monday(6, 20), 800));
        assert!(!relay.get());

        // Next cycle with enough water switches on.
        assert!(pump.evaluate(monday(6, 30), 800));
        assert!(pump.evaluate(Some(date(2025, 6, 9).at(6, 15, 0, 0)), 800));
        assert!(relay.get());
    }

    #[test]
    fn automatic_mode_with_enough_water_follows_schedule() {
        let (mut pump, relay, _) = rig();
        pump.add_interval(morning_window()).unwrap();
        pump.set_mode(OperatingMode::Automatic);
        pump.set_threshold(500);

        assert!(pump.evaluate(monday(6, 15), 500));
        assert!(relay.get());
    }

    #[test]
    fn lost_clock_matches_nothing() {
        let (mut pump, relay, _) = rig();
        pump.add_interval(Interval::new(
            TimeOfDay::new(0, 0),
            TimeOfDay::new(23, 59),
            Weekdays::EVERY_DAY,
        ))
        .unwrap();

        assert!(!pump.evaluate(None, 0));
        assert!(!relay.get());

        // Clock loss while on counts as leaving the window.
        pump.evaluate(monday(12, 0), 0);
        assert!(relay.get());
        assert!(pump.evaluate(None, 0));
        assert!(!relay.get());
    }

    #[test]
    fn toggle_flips_relay_in_any_mode() {
        let (mut pump, relay, led) = rig();
        pump.toggle();
        assert!(relay.get());
        assert!(led.get());
        pump.toggle();
        assert!(!relay.get());

        pump.set_mode(OperatingMode::Manual);
        pump.toggle();
        assert!(relay.get());
    }

    #[test]
    fn schedule_edge_overrides_manual_toggle() {
        let (mut pump, relay, _) = rig();
        pump.add_interval(morning_window()).unwrap();
        pump.evaluate(monday(6, 15), 0);
        pump.toggle();
        assert!(!relay.get());

        // The toggle did not rewrite the schedule state, so the next edge
        // (window end) still lands and keeps the relay off.
        assert!(pump.evaluate(monday(6, 30), 0));
        assert!(!relay.get());
    }

    #[test]
    fn ninth_interval_is_rejected() {
        let (mut pump, _, _) = rig();
        for hour in 0..8 {
            pump.add_interval(Interval::new(
                TimeOfDay::new(hour, 0),
                TimeOfDay::new(hour, 30),
                Weekdays::MONDAY,
            ))
            .unwrap();
        }

        let spare = morning_window();
        assert_eq!(
            pump.add_interval(spare),
            Err(ScheduleError::CapacityExceeded)
        );
        assert_eq!(pump.intervals().len(), 8);
        assert_eq!(pump.intervals()[0].start, TimeOfDay::new(0, 0));
    }

    #[test]
    fn remove_interval_checks_bounds() {
        let (mut pump, _, _) = rig();
        pump.add_interval(morning_window()).unwrap();

        assert_eq!(
            pump.remove_interval(1),
            Err(ScheduleError::IndexOutOfRange)
        );
        assert_eq!(pump.remove_interval(0), Ok(morning_window()));
        assert!(pump.intervals().is_empty());
        assert_eq!(
            pump.remove_interval(0),
            Err(ScheduleError::IndexOutOfRange)
        );
    }

    #[test]
    fn replace_intervals_swaps_the_whole_table() {
        let (mut pump, _, _) = rig();
        pump.add_interval(morning_window()).unwrap();

        let fresh = [Interval::default(); MAX_INTERVALS];
        pump.replace_intervals(&fresh).unwrap();
        assert_eq!(pump.intervals().len(), MAX_INTERVALS);

        let too_many = [Interval::default(); MAX_INTERVALS + 1];
        assert_eq!(
            pump.replace_intervals(&too_many),
            Err(ScheduleError::CapacityExceeded)
        );

        pump.replace_intervals(&[]).unwrap();
        assert!(pump.intervals().is_empty());
    }

    #[test]
    fn mode_names_round_trip() {
        for mode in [
            OperatingMode::Manual,
            OperatingMode::Scheduled,
            OperatingMode::Automatic,
        ] {
            let name = format!("{}", mode);
            assert_eq!(name.parse::<OperatingMode>().unwrap(), mode);
        }
        assert!("off".parse::<OperatingMode>().is_err());
    }
}

use core::fmt::Write;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use heapless::{String, Vec};
use serde::Serialize;

use crate::pump::OperatingMode;
use crate::schedule::{Interval, MAX_INTERVALS};

pub const CLOCK_LEN: usize = 24;
pub const LINE_LEN: usize = 128;

/// Snapshot of the controller state, refreshed by the service task after
/// every evaluation or command and served to the console.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Status {
    pub mode: OperatingMode,
    pub pump_on: bool,
    pub schedule_active: bool,
    pub water_level: u16,
    pub threshold: u16,
    pub clock: String<CLOCK_LEN>,
    pub intervals: Vec<Interval, MAX_INTERVALS>,
}

impl Status {
    pub const fn empty() -> Self {
        Self {
            mode: OperatingMode::Scheduled,
            pump_on: false,
            schedule_active: false,
            water_level: 0,
            threshold: 0,
            clock: String::new(),
            intervals: Vec::new(),
        }
    }

    pub fn summary_line(&self) -> String<LINE_LEN> {
        let mut line = String::new();
        let clock = if self.clock.is_empty() {
            "unsynced"
        } else {
            self.clock.as_str()
        };
        write!(
            line,
            "mode={} pump={} schedule={} level={} threshold={} windows={} clock={}",
            self.mode,
            on_off(self.pump_on),
            on_off(self.schedule_active),
            self.water_level,
            self.threshold,
            self.intervals.len(),
            clock,
        )
        .ok();
        line
    }
}

fn on_off(state: bool) -> &'static str {
    if state { "on" } else { "off" }
}

static STATUS: Mutex<CriticalSectionRawMutex, Status> = Mutex::new(Status::empty());

pub async fn publish_status(status: Status) {
    *STATUS.lock().await = status;
}

pub async fn get_status() -> Status {
    STATUS.lock().await.clone()
}

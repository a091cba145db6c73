use core::sync::atomic::{AtomicU8, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::Duration;

/// Poll period while a press is being sampled.
pub const SAMPLE_PERIOD: Duration = Duration::from_millis(100);

/// Samples with the pin held before a press counts as long (3 s).
pub const LONG_PRESS_TICKS: u8 = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Press {
    Short,
    Long,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    /// Waiting for a rising edge; the periodic sampler is off.
    Idle,
    /// Rising edge seen, polling the pin level every tick.
    Sampling { count: u8 },
}

/// Debounce state machine turning raw pin levels into press events.
///
/// Pure logic: the surrounding task arms it on a rising edge and feeds it
/// one pin sample per tick. A long press is reported exactly once while the
/// pin is still held; a short press on release. A press shorter than one
/// tick is treated as bounce and dropped.
pub struct PressClassifier {
    state: State,
}

impl PressClassifier {
    pub const fn new() -> Self {
        Self { state: State::Idle }
    }

    /// Start sampling after a rising edge.
    pub fn begin(&mut self) {
        self.state = State::Sampling { count: 0 };
    }

    pub fn is_sampling(&self) -> bool {
        matches!(self.state, State::Sampling { .. })
    }

    /// Feed one periodic sample of the pin level.
    pub fn sample(&mut self, pressed: bool) -> Option<Press> {
        let State::Sampling { count } = &mut self.state else {
            return None;
        };

        if pressed {
            *count = count.saturating_add(1);
            if *count == LONG_PRESS_TICKS {
                return Some(Press::Long);
            }
            return None;
        }

        // Released: anything between bounce and the long threshold is a
        // short press; a long press was already reported while held.
        let held = *count;
        self.state = State::Idle;
        if held > 0 && held < LONG_PRESS_TICKS {
            Some(Press::Short)
        } else {
            None
        }
    }
}

impl Default for PressClassifier {
    fn default() -> Self {
        Self::new()
    }
}

const SLOT_NONE: u8 = 0;
const SLOT_SHORT: u8 = 1;
const SLOT_LONG: u8 = 2;

/// Single-slot press hand-off between the sampler and the consuming task.
///
/// Holds at most one pending press: a newer press overwrites an unconsumed
/// one. The slot keeps its value until [`PressIndicator::reset`], so a
/// release after a reported long press never downgrades it.
pub struct PressIndicator {
    slot: AtomicU8,
    wake: Signal<CriticalSectionRawMutex, ()>,
}

impl PressIndicator {
    pub const fn new() -> Self {
        Self {
            slot: AtomicU8::new(SLOT_NONE),
            wake: Signal::new(),
        }
    }

    /// Publish a press and wake the consumer. Safe from any context.
    pub fn raise(&self, press: Press) {
        let value = match press {
            Press::Short => SLOT_SHORT,
            Press::Long => SLOT_LONG,
        };
        self.slot.store(value, Ordering::Release);
        self.wake.signal(());
    }

    pub fn current(&self) -> Option<Press> {
        match self.slot.load(Ordering::Acquire) {
            SLOT_SHORT => Some(Press::Short),
            SLOT_LONG => Some(Press::Long),
            _ => None,
        }
    }

    pub fn reset(&self) {
        self.slot.store(SLOT_NONE, Ordering::Release);
    }

    /// Wait until a press has been published.
    pub async fn wait(&self) {
        self.wake.wait().await;
    }
}

/// The single hand-off slot between the button sampler and the service task.
pub static PRESS: PressIndicator = PressIndicator::new();

#[cfg(feature = "esp32")]
#[embassy_executor::task]
pub async fn button_task(mut pin: esp_hal::gpio::Input<'static>) {
    use embassy_time::Timer;

    let mut classifier = PressClassifier::new();
    loop {
        pin.wait_for_rising_edge().await;
        classifier.begin();
        while classifier.is_sampling() {
            Timer::after(SAMPLE_PERIOD).await;
            if let Some(press) = classifier.sample(pin.is_high()) {
                log::debug!("button: {:?} press", press);
                PRESS.raise(press);
            }
        }
    }
}

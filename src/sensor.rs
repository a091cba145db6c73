use core::sync::atomic::{AtomicU16, Ordering};

/// Latest raw water-level reading, shared between the sampler and the
/// service task. Higher means more water; the scheduler only ever compares
/// it against the configured threshold.
pub struct WaterLevelCell(AtomicU16);

impl WaterLevelCell {
    pub const fn new() -> Self {
        Self(AtomicU16::new(0))
    }

    pub fn publish(&self, level: u16) {
        self.0.store(level, Ordering::Release);
    }

    pub fn latest(&self) -> u16 {
        self.0.load(Ordering::Acquire)
    }
}

impl Default for WaterLevelCell {
    fn default() -> Self {
        Self::new()
    }
}

pub static WATER_LEVEL: WaterLevelCell = WaterLevelCell::new();

#[cfg(feature = "esp32")]
mod task {
    use embassy_time::{Duration, Timer};
    use esp_hal::Blocking;
    use esp_hal::analog::adc::{Adc, AdcPin};
    use esp_hal::gpio::Output;
    use esp_hal::peripherals::{ADC1, GPIO33};
    use log::{debug, warn};

    use super::WATER_LEVEL;

    const MEASURE_PERIOD: Duration = Duration::from_secs(60);
    // The level sensor needs roughly 360 ms after power-up before it reads
    const SETTLE_DELAY: Duration = Duration::from_millis(370);
    const SAMPLE_GAP: Duration = Duration::from_millis(5);
    const SAMPLES: u32 = 8;

    pub type LevelAdc = Adc<'static, ADC1<'static>, Blocking>;
    pub type LevelAdcPin = AdcPin<GPIO33<'static>, ADC1<'static>>;

    /// Powers the sensor rail only around the measurement burst and
    /// publishes the averaged reading.
    #[embassy_executor::task]
    pub async fn measure_task(
        mut supply: Output<'static>,
        mut adc: LevelAdc,
        mut level_pin: LevelAdcPin,
    ) {
        loop {
            supply.set_high();
            Timer::after(SETTLE_DELAY).await;

            let mut sum: u32 = 0;
            let mut taken: u32 = 0;
            for _ in 0..SAMPLES {
                if let Ok(raw) = adc.read_oneshot(&mut level_pin) {
                    sum += raw as u32;
                    taken += 1;
                }
                Timer::after(SAMPLE_GAP).await;
            }
            supply.set_low();

            if taken > 0 {
                let level = (sum / taken) as u16;
                WATER_LEVEL.publish(level);
                debug!("water level: {}", level);
            } else {
                warn!("sensor: ADC read failed, keeping the last level");
            }

            Timer::after(MEASURE_PERIOD).await;
        }
    }
}

#[cfg(feature = "esp32")]
pub use task::{LevelAdc, LevelAdcPin, measure_task};

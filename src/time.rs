use jiff::tz::{self, TimeZone};

pub static TZ: TimeZone = tz::get!("Europe/Vienna");

#[cfg(feature = "esp32")]
mod clock {
    use jiff::{Timestamp, civil};

    use super::TZ;
    use crate::{error::TimeError, io::rtc::get_time};

    /// RTC epoch values below this are leftovers from a cold boot, not a
    /// synced wall clock.
    const SYNC_FLOOR_US: u64 = 1000 * 1_000_000;

    /// Local wall-clock time, or [`TimeError::NotSynced`] until NTP has
    /// written a plausible epoch into the RTC.
    pub async fn localtime() -> Result<civil::DateTime, TimeError> {
        let micros = get_time().await?;
        if micros < SYNC_FLOOR_US {
            return Err(TimeError::NotSynced);
        }
        let now = Timestamp::from_microsecond(micros as i64)?;
        Ok(TZ.to_datetime(now))
    }
}

#[cfg(feature = "esp32")]
pub use clock::localtime;

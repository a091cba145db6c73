use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use esp_hal::peripherals::LPWR;
use esp_hal::rtc_cntl::Rtc;

use crate::error::TimeError;

static GLOBAL_RTC: Mutex<CriticalSectionRawMutex, Option<Rtc>> = Mutex::new(None);

/// Current RTC value in epoch microseconds. Before [`init`] has run there
/// is no clock to read, which callers treat the same as an unsynced one.
pub async fn get_time() -> Result<u64, TimeError> {
    let rtc = GLOBAL_RTC.lock().await;
    if let Some(rtc) = rtc.as_ref() {
        Ok(rtc.current_time_us())
    } else {
        Err(TimeError::NotSynced)
    }
}

pub async fn set_time(stamp: u64) -> Result<(), TimeError> {
    let rtc = GLOBAL_RTC.lock().await;
    if let Some(rtc) = rtc.as_ref() {
        rtc.set_current_time_us(stamp);
        Ok(())
    } else {
        Err(TimeError::NotSynced)
    }
}

pub async fn init(peripheral: LPWR<'static>) {
    let rtc = Rtc::new(peripheral);

    GLOBAL_RTC.lock().await.replace(rtc);
}

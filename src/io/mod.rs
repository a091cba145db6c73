pub mod rtc;
pub mod wifi;

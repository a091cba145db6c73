use thiserror_no_std::Error;

#[cfg(feature = "esp32")]
macro_rules! transitive_from {
    ($($to:ty: $from:ty => $via:ident),* $(,)?) => {
        $(
            impl From<$from> for $to {
                fn from(err: $from) -> Self {
                    Self::$via(err.into())
                }
            }
        )*
    };
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("interval table is full")]
    CapacityExceeded,
    #[error("no interval at that index")]
    IndexOutOfRange,
}

#[derive(Debug, Error)]
pub enum TimeError {
    #[error("wall clock not synced yet")]
    NotSynced,
    #[error("timestamp conversion failed")]
    Timestamp(#[from] jiff::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("flash access failed")]
    Flash,
    #[error("stored image is not valid")]
    BadImage,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command")]
    UnknownCommand,
    #[error("missing argument")]
    MissingArgument,
    #[error("invalid argument")]
    InvalidArgument,
}

#[cfg(feature = "esp32")]
#[derive(Debug, Error)]
pub enum HwError {
    WifiInit(#[from] esp_wifi::InitializationError),
    Wifi(#[from] esp_wifi::wifi::WifiError),
    Spawn(#[from] embassy_executor::SpawnError),
}

#[cfg(feature = "esp32")]
#[derive(Debug, Error)]
pub enum NetError {
    #[error("can't bind socket")]
    Bind,
    #[error("name resolution failed")]
    Dns,
    #[error("NTP exchange failed")]
    Ntp,
}

#[cfg(feature = "esp32")]
#[derive(Debug, Error)]
pub enum SysError {
    Time(#[from] TimeError),
    Storage(#[from] StorageError),
    Hardware(#[from] HwError),
    Net(#[from] NetError),
}

// Generate transitive From implementations
#[cfg(feature = "esp32")]
transitive_from!(
    SysError: jiff::Error => Time,
    SysError: esp_wifi::InitializationError => Hardware,
    SysError: esp_wifi::wifi::WifiError => Hardware,
    SysError: embassy_executor::SpawnError => Hardware,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_error_messages_render() {
        assert_eq!(TimeError::NotSynced.to_string(), "wall clock not synced yet");

        let out_of_range = jiff::Timestamp::from_second(i64::MAX).unwrap_err();
        assert_eq!(
            TimeError::from(out_of_range).to_string(),
            "timestamp conversion failed"
        );
    }
}

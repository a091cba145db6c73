use embedded_hal::digital::OutputPin;

use crate::button::Press;
use crate::command::Command;
use crate::error::ScheduleError;
use crate::pump::{OperatingMode, Pump};

/// Button policy: a short press pauses or resumes the schedule, a long
/// press toggles the pump directly.
pub fn handle_press<R: OutputPin, L: OutputPin>(pump: &mut Pump<R, L>, press: Press) {
    match press {
        Press::Short => {
            if pump.mode() == OperatingMode::Manual {
                pump.resume();
            } else {
                pump.pause();
            }
        }
        Press::Long => pump.toggle(),
    }
}

/// Applies one command to the pump. `Ok(true)` means the persisted settings
/// (intervals or threshold) changed and should be written back.
pub fn handle_command<R: OutputPin, L: OutputPin>(
    pump: &mut Pump<R, L>,
    command: &Command,
) -> Result<bool, ScheduleError> {
    match command {
        Command::Toggle => {
            pump.toggle();
            Ok(false)
        }
        Command::Pause => {
            pump.pause();
            Ok(false)
        }
        Command::Resume => {
            pump.resume();
            Ok(false)
        }
        Command::SetMode(mode) => {
            pump.set_mode(*mode);
            Ok(false)
        }
        Command::SetThreshold(level) => {
            pump.set_threshold(*level);
            Ok(true)
        }
        Command::AddInterval(window) => {
            pump.add_interval(*window)?;
            Ok(true)
        }
        Command::RemoveInterval(index) => {
            pump.remove_interval(*index as usize)?;
            Ok(true)
        }
        Command::ClearIntervals => {
            pump.replace_intervals(&[])?;
            Ok(true)
        }
        Command::Report => Ok(false),
    }
}

#[cfg(feature = "esp32")]
mod task {
    use core::fmt::Write;

    use embassy_futures::select::{Either3, select3};
    use embassy_time::{Duration, Ticker};
    use esp_hal::gpio::Output;
    use esp_storage::FlashStorage;
    use heapless::{String, Vec};
    use log::{info, warn};

    use super::{handle_command, handle_press};
    use crate::button::PRESS;
    use crate::command::status::{CLOCK_LEN, Status, publish_status};
    use crate::command::{COMMANDS, REPLIES};
    use crate::pump::Pump;
    use crate::sensor::WATER_LEVEL;
    use crate::settings::Settings;
    use crate::time::localtime;

    /// Evaluation cadence; the schedule has minute resolution.
    const EVAL_PERIOD: Duration = Duration::from_secs(60);

    type PumpPins = Pump<Output<'static>, Output<'static>>;

    /// Owns the pump and serializes everything that may move it: the
    /// periodic schedule evaluation, button presses and console commands.
    #[embassy_executor::task]
    pub async fn service_task(mut pump: PumpPins, mut settings: Settings<FlashStorage>) {
        // Catch up with the schedule right after boot.
        evaluate(&mut pump).await;
        refresh_status(&pump).await;

        let mut ticker = Ticker::every(EVAL_PERIOD);
        loop {
            match select3(ticker.next(), PRESS.wait(), COMMANDS.receive()).await {
                Either3::First(()) => evaluate(&mut pump).await,
                Either3::Second(()) => {
                    if let Some(press) = PRESS.current() {
                        info!("button: {:?} press", press);
                        handle_press(&mut pump, press);
                    }
                    PRESS.reset();
                }
                Either3::Third(command) => {
                    let result = handle_command(&mut pump, &command);
                    if result == Ok(true) {
                        if let Err(err) = settings.store(pump.intervals(), pump.threshold()) {
                            warn!("settings: {}", err);
                        }
                    }
                    if let Err(err) = &result {
                        warn!("command rejected: {}", err);
                    }
                    REPLIES.send(result.map(|_| ())).await;
                }
            }
            refresh_status(&pump).await;
        }
    }

    async fn evaluate(pump: &mut PumpPins) {
        let now = localtime().await.ok();
        let level = WATER_LEVEL.latest();
        if pump.evaluate(now, level) {
            info!(
                "schedule edge: pump {}",
                if pump.is_on() { "on" } else { "off" }
            );
        }
    }

    async fn refresh_status(pump: &PumpPins) {
        let mut clock: String<CLOCK_LEN> = String::new();
        if let Ok(now) = localtime().await {
            write!(
                clock,
                "{} {:02}:{:02}",
                day_name(now.weekday()),
                now.hour(),
                now.minute()
            )
            .ok();
        }

        publish_status(Status {
            mode: pump.mode(),
            pump_on: pump.is_on(),
            schedule_active: pump.scheduled_state(),
            water_level: WATER_LEVEL.latest(),
            threshold: pump.threshold(),
            clock,
            intervals: Vec::from_slice(pump.intervals()).unwrap_or_default(),
        })
        .await;
    }

    fn day_name(day: jiff::civil::Weekday) -> &'static str {
        match day {
            jiff::civil::Weekday::Sunday => "Sun",
            jiff::civil::Weekday::Monday => "Mon",
            jiff::civil::Weekday::Tuesday => "Tue",
            jiff::civil::Weekday::Wednesday => "Wed",
            jiff::civil::Weekday::Thursday => "Thu",
            jiff::civil::Weekday::Friday => "Fri",
            jiff::civil::Weekday::Saturday => "Sat",
        }
    }
}

#[cfg(feature = "esp32")]
pub use task::service_task;

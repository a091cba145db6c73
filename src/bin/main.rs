//! Well controller firmware entry point.
//!
//! Set SSID and PASSWORD env variables before building.
#![no_std]
#![no_main]

use brunnen::button::button_task;
use brunnen::io::rtc;
use brunnen::io::wifi::wifi_hw_init;
use brunnen::net::console::console_task;
use brunnen::net::ntp::{NtpClient, ntp_task};
use brunnen::net::stack::{init_net, wait_for_ip, wait_for_link};
use brunnen::pump::Pump;
use brunnen::sensor::measure_task;
use brunnen::service::service_task;
use brunnen::settings::Settings;
use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use esp_alloc as _;
use esp_backtrace as _;
use esp_hal::analog::adc::{Adc, AdcConfig, Attenuation};
use esp_hal::gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull};
use esp_hal::{clock::CpuClock, rng::Rng, timer::timg::TimerGroup};
use esp_storage::FlashStorage;
use log::info;
esp_bootloader_esp_idf::esp_app_desc!();

/// Start of the two flash sectors holding the schedule image (the data
/// partition area).
const SETTINGS_OFFSET: u32 = 0x9000;

#[esp_hal_embassy::main]
async fn main(spawner: Spawner) -> ! {
    esp_println::logger::init_logger_from_env();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(size: 72 * 1024);

    let mut rng = Rng::new(peripherals.RNG);
    let wifi_timer = TimerGroup::new(peripherals.TIMG0).timer0;

    // We need second timer for Embassy to work
    let embassy_timer = TimerGroup::new(peripherals.TIMG1).timer0;
    esp_hal_embassy::init(embassy_timer);

    rtc::init(peripherals.LPWR).await;

    // Pump, button and sensor wiring
    let relay = Output::new(peripherals.GPIO13, Level::Low, OutputConfig::default());
    let pump_led = Output::new(peripherals.GPIO17, Level::Low, OutputConfig::default());
    let button = Input::new(
        peripherals.GPIO15,
        InputConfig::default().with_pull(Pull::Down),
    );
    let mut status_led = Output::new(peripherals.GPIO2, Level::Low, OutputConfig::default());
    let sensor_supply = Output::new(peripherals.GPIO25, Level::Low, OutputConfig::default());

    let mut adc_config = AdcConfig::new();
    let level_pin = adc_config.enable_pin(peripherals.GPIO33, Attenuation::_11dB);
    let adc = Adc::new(peripherals.ADC1, adc_config);

    let mut settings = Settings::new(FlashStorage::new(), SETTINGS_OFFSET);
    let (windows, threshold) = settings.load();
    info!(
        "loaded {} watering windows, threshold {}",
        windows.len(),
        threshold
    );

    let mut pump = Pump::new(relay, pump_led);
    pump.replace_intervals(&windows).unwrap();
    pump.set_threshold(threshold);

    spawner.spawn(button_task(button)).unwrap();
    spawner.spawn(measure_task(sensor_supply, adc, level_pin)).unwrap();
    spawner.spawn(service_task(pump, settings)).unwrap();

    let wifi = wifi_hw_init(wifi_timer, rng, peripherals.WIFI, &spawner)
        .await
        .unwrap();

    let seed = (rng.random() as u64) << 32 | rng.random() as u64;

    // Init network stack
    let stack = init_net(wifi, seed, &spawner).await.unwrap();

    wait_for_link(stack).await;
    let address = wait_for_ip(stack).await;
    info!("network up at {}", address);

    spawner.spawn(ntp_task(NtpClient::new(stack))).unwrap();
    spawner.spawn(console_task(stack)).unwrap();

    // Slow heartbeat once everything is running
    loop {
        status_led.toggle();
        Timer::after(Duration::from_millis(1_000)).await;
    }
}

use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use esp_hal::{peripherals::WIFI, rng::Rng, timer::timg::Timer as HalTimer};
use esp_wifi::wifi::{ClientConfiguration, Configuration, WifiEvent, WifiState};
use esp_wifi::{
    EspWifiController, init,
    wifi::{WifiController, WifiDevice, new},
};
use log::{info, warn};
use static_cell::StaticCell;

use crate::error::SysError;

const SSID: &str = env!("SSID");
const PASSWORD: &str = env!("PASSWORD");

const RECONNECT_DELAY: Duration = Duration::from_millis(5000);

pub async fn wifi_hw_init(
    timer: HalTimer<'static>,
    rng: Rng,
    wifi_peripheral: WIFI<'static>,
    spawner: &Spawner,
) -> Result<WifiDevice<'static>, SysError> {
    // Initialize ESP WiFi hardware
    let esp_wifi_ctrl = {
        static ESP_WIFI_CTRL: StaticCell<EspWifiController> = StaticCell::new();
        ESP_WIFI_CTRL.init(init(timer, rng)?)
    };

    let (controller, interfaces) = new(esp_wifi_ctrl, wifi_peripheral)?;

    spawner.spawn(maintain_connection(controller))?;

    Ok(interfaces.sta)
}

// We have to run this function in the background to keep the wifi on
#[embassy_executor::task]
async fn maintain_connection(mut controller: WifiController<'static>) {
    loop {
        if esp_wifi::wifi::wifi_state() == WifiState::StaConnected {
            // wait until we're no longer connected
            controller.wait_for_event(WifiEvent::StaDisconnected).await;
            warn!("wifi: disconnected");
            Timer::after(RECONNECT_DELAY).await
        }

        if !matches!(controller.is_started(), Ok(true)) {
            let client_config = Configuration::Client(ClientConfiguration {
                ssid: SSID.into(),
                password: PASSWORD.into(),
                ..Default::default()
            });
            if let Err(e) = controller.set_configuration(&client_config) {
                warn!("wifi: bad configuration: {:?}", e);
                Timer::after(RECONNECT_DELAY).await;
                continue;
            }
            info!("wifi: starting");
            if let Err(e) = controller.start_async().await {
                warn!("wifi: start failed: {:?}", e);
                Timer::after(RECONNECT_DELAY).await;
                continue;
            }
        }

        info!("wifi: connecting to {}", SSID);

        match controller.connect_async().await {
            Ok(_) => info!("wifi: connected"),
            Err(e) => {
                warn!("wifi: connect failed: {:?}", e);
                Timer::after(RECONNECT_DELAY).await
            }
        }
    }
}

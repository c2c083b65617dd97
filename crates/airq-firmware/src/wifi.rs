//! WiFi station platform over `esp-radio`
//!
//! Credentials come from the build (see `wifi_secrets`). ESP-Touch smart
//! config is not available through `esp-radio`, so a build without
//! credentials keeps blinking until it is reflashed with some.

use core::fmt::Write;

use airq_core::config::InternetConfig;
use airq_core::provisioning::{NetworkError, NetworkPlatform};
use embassy_net::Stack;
use embassy_time::{Duration, Timer};
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController, WifiDevice, WifiEvent};
use log::{error, info, warn};

/// Delay before re-associating after the access point dropped us
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Debug text of a platform error, sized for `NetworkError`.
pub fn describe<E: core::fmt::Debug>(error: E) -> heapless::String<64> {
    let mut text = heapless::String::new();
    // Truncated on overflow, which is fine for a log line
    let _ = write!(text, "{:?}", error);
    text
}

pub struct EspWifi<'d> {
    controller: WifiController<'d>,
    stack: Stack<'d>,
    credentials: InternetConfig<'static>,
    started: bool,
}

impl<'d> EspWifi<'d> {
    pub fn new(
        controller: WifiController<'d>,
        stack: Stack<'d>,
        credentials: InternetConfig<'static>,
    ) -> Self {
        Self {
            controller,
            stack,
            credentials,
            started: false,
        }
    }

    pub fn into_controller(self) -> WifiController<'d> {
        self.controller
    }
}

impl NetworkPlatform for EspWifi<'_> {
    fn has_stored_credentials(&self) -> bool {
        self.credentials.has_credentials()
    }

    async fn begin_smart_config(&mut self) -> Result<(), NetworkError> {
        Err(NetworkError::Unsupported("smart config"))
    }

    fn smart_config_done(&mut self) -> bool {
        false
    }

    async fn begin(&mut self, hostname: &str) -> Result<(), NetworkError> {
        if !self.started {
            let client = ClientConfig::default()
                .with_ssid(self.credentials.ssid.into())
                .with_password(self.credentials.password.into());
            self.controller
                .set_config(&ModeConfig::Client(client))
                .map_err(|e| NetworkError::Config(describe(e)))?;
            self.controller
                .start_async()
                .await
                .map_err(|e| NetworkError::Config(describe(e)))?;
            self.started = true;
        }

        info!("Joining {} as {}", self.credentials.ssid, hostname);
        self.controller
            .connect_async()
            .await
            .map_err(|e| NetworkError::Join(describe(e)))
    }

    /// Associated and holding a DHCP lease.
    fn is_connected(&mut self) -> bool {
        self.controller.is_connected().unwrap_or(false) && self.stack.config_v4().is_some()
    }

    fn stop_smart_config(&mut self) {}
}

/// Re-associate whenever the access point drops the station.
#[embassy_executor::task]
pub async fn connection_task(mut controller: WifiController<'static>) {
    loop {
        controller.wait_for_event(WifiEvent::StaDisconnected).await;
        warn!("WiFi disconnected, reconnecting");
        loop {
            Timer::after(RECONNECT_DELAY).await;
            match controller.connect_async().await {
                Ok(()) => {
                    info!("WiFi reconnected");
                    break;
                }
                Err(e) => error!("WiFi reconnect failed: {:?}", e),
            }
        }
    }
}

#[embassy_executor::task]
pub async fn net_task(mut runner: embassy_net::Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}

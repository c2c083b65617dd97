//! Build-time network credentials and identity, see `build.rs`.

use airq_core::config::{DEFAULT_BASE_NAME, InternetConfig};

const WIFI_SSID: &str = env!("AIRQ_WIFI_SSID");
const WIFI_PASSWORD: &str = env!("AIRQ_WIFI_PASSWORD");
const DEVICE_NAME: &str = env!("AIRQ_DEVICE_NAME");

/// Credentials baked into this build. An empty SSID means none.
pub const fn internet_config() -> InternetConfig<'static> {
    InternetConfig {
        ssid: WIFI_SSID,
        password: WIFI_PASSWORD,
    }
}

pub const fn device_base_name() -> &'static str {
    if DEVICE_NAME.is_empty() {
        DEFAULT_BASE_NAME
    } else {
        DEVICE_NAME
    }
}

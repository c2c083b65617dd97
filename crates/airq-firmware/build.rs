//! Bakes WiFi credentials and the device name from `.env` into the binary.

const KEYS: [&str; 3] = ["AIRQ_WIFI_SSID", "AIRQ_WIFI_PASSWORD", "AIRQ_DEVICE_NAME"];

fn main() {
    // A missing .env is fine: the device falls back to smart config pairing
    if let Ok(path) = dotenvy::dotenv() {
        println!("cargo:rerun-if-changed={}", path.display());
    }

    for key in KEYS {
        println!("cargo:rerun-if-env-changed={key}");
        let value = std::env::var(key).unwrap_or_default();
        println!("cargo:rustc-env={key}={value}");
    }

    println!("cargo:rustc-link-arg=-Tlinkall.x");
}

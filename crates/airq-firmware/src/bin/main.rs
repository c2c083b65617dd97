#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use embassy_executor::Spawner;
use embassy_net::{DhcpConfig, StackResources};
use embassy_time::Timer;
use esp_hal::clock::CpuClock;
use esp_hal::timer::timg::TimerGroup;
use log::{error, info};
use picoserve::AppWithStateBuilder;
use static_cell::StaticCell;

use airq_core::app_state::{AppError, AppRunState};
use airq_core::config::{DeviceConfig, TelemetryProfile};
use airq_core::identity::DeviceName;
use airq_core::properties::{PropertyChannel, SharedProperties, ThingProperties};
use airq_core::provisioning::{NetworkError, Provisioner};
use airq_core::telemetry::TelemetryCycle;
use airq_core::thing::ThingDescription;
use airq_firmware::hardware::{chip_id, create_i2c_bus, create_status_led};
use airq_firmware::scd4x::Scd4xSensor;
use airq_firmware::status_led::StatusLed;
use airq_firmware::web::{self, AppProps, AppState, WEB_TASK_POOL_SIZE, WebApp};
use airq_firmware::wifi::{self, EspWifi};
use airq_firmware::wifi_secrets;

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

#[cfg(not(feature = "profile-relaxed"))]
const PROFILE: TelemetryProfile = TelemetryProfile::Responsive;
#[cfg(feature = "profile-relaxed")]
const PROFILE: TelemetryProfile = TelemetryProfile::Relaxed;

static PROPERTY_EVENTS: PropertyChannel = PropertyChannel::new();

fn log_state(state: AppRunState) {
    info!("Device {}", state.label());
}

/// Park the device forever. Used when it cannot do anything useful and an
/// operator has to intervene.
async fn halt() -> ! {
    log_state(AppRunState::Halted);
    loop {
        Timer::after_secs(3600).await;
    }
}

/// Log a boot error and halt.
async fn fail(error: impl Into<AppError>) -> ! {
    error!("{}", error.into());
    halt().await
}

/// Log every property change the transport is notified about.
#[embassy_executor::task]
async fn property_log_task() {
    let Ok(mut events) = PROPERTY_EVENTS.subscriber() else {
        error!("No subscriber slot for property events");
        return;
    };
    loop {
        let event = events.next_message_pure().await;
        info!("{} -> {}", event.id.name(), event.value.number);
    }
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!();
    log_state(AppRunState::Uninitialized);

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    let led = StatusLed::new(create_status_led(peripherals.GPIO21));

    let device = DeviceConfig::new(wifi_secrets::device_base_name(), PROFILE);
    let name = match DeviceName::derive(
        device.base_name,
        chip_id(),
        device.telemetry.name_casing,
    ) {
        Ok(name) => name,
        Err(e) => fail(e).await,
    };
    info!("Device name: {}", name);

    // Radio and network stack
    static RADIO: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();
    let radio = match esp_radio::init() {
        Ok(radio) => RADIO.init(radio),
        Err(e) => fail(NetworkError::Config(wifi::describe(e))).await,
    };
    let wifi_parts = esp_radio::wifi::new(radio, peripherals.WIFI, Default::default());
    let (controller, interfaces) = match wifi_parts {
        Ok(parts) => parts,
        Err(e) => fail(NetworkError::Config(wifi::describe(e))).await,
    };

    let mut dhcp = DhcpConfig::default();
    dhcp.hostname = name.as_str().parse().ok();

    let rng = esp_hal::rng::Rng::new();
    let seed = (u64::from(rng.random()) << 32) | u64::from(rng.random());

    static RESOURCES: StaticCell<StackResources<{ WEB_TASK_POOL_SIZE + 2 }>> = StaticCell::new();
    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(dhcp),
        RESOURCES.init(StackResources::new()),
        seed,
    );
    spawner.must_spawn(wifi::net_task(runner));

    // Provisioning blocks until the station has an address
    log_state(AppRunState::Provisioning);
    let network = EspWifi::new(controller, stack, wifi_secrets::internet_config());
    let mut provisioner = Provisioner::new(network, led, name.as_str());
    provisioner.run().await;
    let (network, _led) = provisioner.into_parts();
    spawner.must_spawn(wifi::connection_task(network.into_controller()));

    if let Some(v4) = stack.config_v4() {
        info!("IP address: {}", v4.address.address());
    }
    log_state(AppRunState::Connected);

    // Property store and transport
    static PROPERTIES: StaticCell<SharedProperties<'static>> = StaticCell::new();
    let store = SharedProperties::new(ThingProperties::with_channel(&PROPERTY_EVENTS));
    let properties: &'static SharedProperties<'static> = PROPERTIES.init(store);

    static DESCRIPTION: StaticCell<ThingDescription> = StaticCell::new();
    let description: &'static ThingDescription = DESCRIPTION.init(ThingDescription::new(&name));

    static APP: StaticCell<WebApp> = StaticCell::new();
    let app = APP.init(AppProps.build_app());

    static WEB_CONFIG: StaticCell<picoserve::Config<embassy_time::Duration>> = StaticCell::new();
    let web_config = WEB_CONFIG.init(web::config());

    for id in 0..WEB_TASK_POOL_SIZE {
        let state = AppState {
            properties,
            description,
        };
        spawner.must_spawn(web::web_task(id, stack, app, web_config, state));
    }
    spawner.must_spawn(property_log_task());

    // Sensor and telemetry
    log_state(AppRunState::SensorStarting);
    let i2c = create_i2c_bus(peripherals.I2C0, peripherals.GPIO2, peripherals.GPIO1)
        .expect("Failed to configure sensor I2C bus");
    let mut cycle = TelemetryCycle::new(Scd4xSensor::new(i2c), properties, (), device.telemetry);

    if let Err(e) = cycle.start().await {
        fail(e).await
    }

    log_state(AppRunState::Running);
    cycle.run().await
}

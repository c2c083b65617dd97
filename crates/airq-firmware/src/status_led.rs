use airq_core::provisioning::{ProvisioningState, StatusIndicator};
use esp_hal::gpio::{Level, Output};
use log::debug;

/// Blinks while provisioning, off once connected.
pub struct StatusLed<'d> {
    pin: Output<'d>,
}

impl<'d> StatusLed<'d> {
    pub fn new(pin: Output<'d>) -> Self {
        Self { pin }
    }
}

impl StatusIndicator for StatusLed<'_> {
    fn set(&mut self, lit: bool) {
        self.pin.set_level(Level::from(lit));
    }

    fn on_state(&mut self, state: ProvisioningState) {
        debug!("Provisioning state: {:?}", state);
    }
}

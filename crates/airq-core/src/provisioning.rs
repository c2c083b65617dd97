//! WiFi provisioning state machine
//!
//! Brings the network up before anything else runs. There is no timeout: a
//! device without network has nothing to offer, so it keeps trying and
//! blinks its status LED while it waits.
//!
//! ```text
//! Unprovisioned ──(stored credentials)──────────────▶ Joining ──▶ Connected
//!       │                                                ▲
//!       └──(none)──▶ AwaitingSmartConfig ──(received)────┘
//! ```

use embassy_time::{Duration, Timer};
use log::{info, warn};
use thiserror_no_std::Error;

/// Poll interval while waiting for smart-config credentials
pub const SMART_CONFIG_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Poll interval while waiting for the access point association
pub const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("operation not supported by this platform: {0}")]
    Unsupported(&'static str),
    #[error("failed to join network: {0}")]
    Join(heapless::String<64>),
    #[error("invalid network configuration: {0}")]
    Config(heapless::String<64>),
}

/// Network platform consumed by the provisioner.
pub trait NetworkPlatform {
    /// Whether credentials from an earlier provisioning are available.
    fn has_stored_credentials(&self) -> bool;

    /// Start listening for smart-config credentials.
    fn begin_smart_config(&mut self) -> impl Future<Output = Result<(), NetworkError>>;

    fn smart_config_done(&mut self) -> bool;

    /// Start associating with the stored (or just received) network.
    fn begin(&mut self, hostname: &str) -> impl Future<Output = Result<(), NetworkError>>;

    fn is_connected(&mut self) -> bool;

    fn stop_smart_config(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningState {
    Unprovisioned,
    AwaitingSmartConfig,
    Joining,
    Connected,
}

/// Liveness indicator shown while provisioning.
pub trait StatusIndicator {
    fn set(&mut self, lit: bool);

    /// Called on every state change.
    fn on_state(&mut self, _state: ProvisioningState) {}
}

/// Result of one provisioning step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Not connected yet, poll again after the given delay
    Wait(Duration),
    Connected,
}

pub struct Provisioner<'a, N, L> {
    network: N,
    indicator: L,
    hostname: &'a str,
    state: ProvisioningState,
    lit: bool,
}

impl<'a, N, L> Provisioner<'a, N, L>
where
    N: NetworkPlatform,
    L: StatusIndicator,
{
    pub fn new(network: N, indicator: L, hostname: &'a str) -> Self {
        Self {
            network,
            indicator,
            hostname,
            state: ProvisioningState::Unprovisioned,
            lit: true,
        }
    }

    pub fn state(&self) -> ProvisioningState {
        self.state
    }

    pub fn into_parts(self) -> (N, L) {
        (self.network, self.indicator)
    }

    /// Block until the network is connected.
    pub async fn run(&mut self) {
        info!("Provisioning network as {}", self.hostname);
        while let Step::Wait(delay) = self.poll().await {
            Timer::after(delay).await;
        }
        info!("Network connected");
    }

    /// Advance the state machine as far as possible without waiting.
    pub async fn poll(&mut self) -> Step {
        loop {
            match self.state {
                ProvisioningState::Unprovisioned => {
                    if self.network.has_stored_credentials() {
                        if !self.begin_join().await {
                            return self.blink(JOIN_POLL_INTERVAL);
                        }
                    } else {
                        match self.network.begin_smart_config().await {
                            Ok(()) => {
                                info!("No stored credentials, waiting for smart config");
                                self.transition(ProvisioningState::AwaitingSmartConfig);
                            }
                            Err(e) => {
                                warn!("Smart config could not start: {}", e);
                                return self.blink(SMART_CONFIG_POLL_INTERVAL);
                            }
                        }
                    }
                }
                ProvisioningState::AwaitingSmartConfig => {
                    if !self.network.smart_config_done() || !self.begin_join().await {
                        return self.blink(SMART_CONFIG_POLL_INTERVAL);
                    }
                }
                ProvisioningState::Joining => {
                    if !self.network.is_connected() {
                        return self.blink(JOIN_POLL_INTERVAL);
                    }
                    self.network.stop_smart_config();
                    self.lit = false;
                    self.indicator.set(false);
                    self.transition(ProvisioningState::Connected);
                }
                ProvisioningState::Connected => return Step::Connected,
            }
        }
    }

    async fn begin_join(&mut self) -> bool {
        match self.network.begin(self.hostname).await {
            Ok(()) => {
                self.transition(ProvisioningState::Joining);
                true
            }
            Err(e) => {
                warn!("Network join could not start: {}", e);
                false
            }
        }
    }

    fn blink(&mut self, delay: Duration) -> Step {
        self.indicator.set(self.lit);
        self.lit = !self.lit;
        Step::Wait(delay)
    }

    fn transition(&mut self, state: ProvisioningState) {
        self.state = state;
        self.indicator.on_state(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;

    #[derive(Default)]
    struct FakeNetwork {
        credentials: bool,
        smart_config_started: bool,
        smart_config_failures: u32,
        smart_config_polls_left: u32,
        smart_config_stopped: bool,
        begin_failures: u32,
        begin_calls: u32,
        hostname: std::string::String,
        connect_polls_left: u32,
    }

    impl NetworkPlatform for FakeNetwork {
        fn has_stored_credentials(&self) -> bool {
            self.credentials
        }

        async fn begin_smart_config(&mut self) -> Result<(), NetworkError> {
            if self.smart_config_failures > 0 {
                self.smart_config_failures -= 1;
                return Err(NetworkError::Unsupported("smart config"));
            }
            self.smart_config_started = true;
            Ok(())
        }

        fn smart_config_done(&mut self) -> bool {
            if self.smart_config_polls_left == 0 {
                return true;
            }
            self.smart_config_polls_left -= 1;
            false
        }

        async fn begin(&mut self, hostname: &str) -> Result<(), NetworkError> {
            self.begin_calls += 1;
            if self.begin_failures > 0 {
                self.begin_failures -= 1;
                return Err(NetworkError::Join(heapless::String::new()));
            }
            self.hostname = hostname.into();
            Ok(())
        }

        fn is_connected(&mut self) -> bool {
            if self.connect_polls_left == 0 {
                return true;
            }
            self.connect_polls_left -= 1;
            false
        }

        fn stop_smart_config(&mut self) {
            self.smart_config_stopped = true;
        }
    }

    #[derive(Default)]
    struct RecordingIndicator {
        levels: std::vec::Vec<bool>,
        states: std::vec::Vec<ProvisioningState>,
    }

    impl StatusIndicator for RecordingIndicator {
        fn set(&mut self, lit: bool) {
            self.levels.push(lit);
        }

        fn on_state(&mut self, state: ProvisioningState) {
            self.states.push(state);
        }
    }

    #[test]
    fn test_stored_credentials_join_directly() {
        let network = FakeNetwork {
            credentials: true,
            connect_polls_left: 2,
            ..Default::default()
        };
        let mut provisioner = Provisioner::new(network, RecordingIndicator::default(), "airq-1234");

        assert_eq!(block_on(provisioner.poll()), Step::Wait(JOIN_POLL_INTERVAL));
        assert_eq!(provisioner.state(), ProvisioningState::Joining);
        assert_eq!(block_on(provisioner.poll()), Step::Wait(JOIN_POLL_INTERVAL));
        assert_eq!(block_on(provisioner.poll()), Step::Connected);

        let (network, indicator) = provisioner.into_parts();
        assert!(!network.smart_config_started);
        assert!(network.smart_config_stopped);
        assert_eq!(network.hostname, "airq-1234");
        // Two blinks, then off once connected
        assert_eq!(indicator.levels, [true, false, false]);
        assert_eq!(
            indicator.states,
            [ProvisioningState::Joining, ProvisioningState::Connected]
        );
    }

    #[test]
    fn test_smart_config_path() {
        let network = FakeNetwork {
            smart_config_polls_left: 3,
            connect_polls_left: 1,
            ..Default::default()
        };
        let mut provisioner = Provisioner::new(network, RecordingIndicator::default(), "airq");

        for _ in 0..3 {
            assert_eq!(
                block_on(provisioner.poll()),
                Step::Wait(SMART_CONFIG_POLL_INTERVAL)
            );
            assert_eq!(provisioner.state(), ProvisioningState::AwaitingSmartConfig);
        }
        assert_eq!(block_on(provisioner.poll()), Step::Wait(JOIN_POLL_INTERVAL));
        assert_eq!(block_on(provisioner.poll()), Step::Connected);

        let (network, indicator) = provisioner.into_parts();
        assert!(network.smart_config_started);
        assert!(network.smart_config_stopped);
        assert_eq!(indicator.levels, [true, false, true, false, false]);
        assert_eq!(
            indicator.states,
            [
                ProvisioningState::AwaitingSmartConfig,
                ProvisioningState::Joining,
                ProvisioningState::Connected,
            ]
        );
    }

    #[test]
    fn test_join_errors_are_retried() {
        let network = FakeNetwork {
            credentials: true,
            begin_failures: 2,
            ..Default::default()
        };
        let mut provisioner = Provisioner::new(network, RecordingIndicator::default(), "airq");

        assert_eq!(block_on(provisioner.poll()), Step::Wait(JOIN_POLL_INTERVAL));
        assert_eq!(provisioner.state(), ProvisioningState::Unprovisioned);
        assert_eq!(block_on(provisioner.poll()), Step::Wait(JOIN_POLL_INTERVAL));
        assert_eq!(block_on(provisioner.poll()), Step::Connected);

        let (network, _) = provisioner.into_parts();
        assert_eq!(network.begin_calls, 3);
    }

    #[test]
    fn test_smart_config_start_errors_are_retried() {
        let network = FakeNetwork {
            smart_config_failures: 2,
            ..Default::default()
        };
        let mut provisioner = Provisioner::new(network, RecordingIndicator::default(), "airq");

        for _ in 0..2 {
            assert_eq!(
                block_on(provisioner.poll()),
                Step::Wait(SMART_CONFIG_POLL_INTERVAL)
            );
            assert_eq!(provisioner.state(), ProvisioningState::Unprovisioned);
        }
        assert_eq!(block_on(provisioner.poll()), Step::Connected);

        let (network, indicator) = provisioner.into_parts();
        assert!(network.smart_config_started);
        assert_eq!(network.begin_calls, 1);
        assert_eq!(indicator.levels, [true, false, false]);
        assert_eq!(
            indicator.states,
            [
                ProvisioningState::AwaitingSmartConfig,
                ProvisioningState::Joining,
                ProvisioningState::Connected,
            ]
        );
    }

    #[test]
    fn test_join_after_smart_config_is_retried() {
        let network = FakeNetwork {
            begin_failures: 1,
            ..Default::default()
        };
        let mut provisioner = Provisioner::new(network, RecordingIndicator::default(), "airq");

        assert_eq!(
            block_on(provisioner.poll()),
            Step::Wait(SMART_CONFIG_POLL_INTERVAL)
        );
        assert_eq!(provisioner.state(), ProvisioningState::AwaitingSmartConfig);
        assert_eq!(block_on(provisioner.poll()), Step::Connected);

        let (network, indicator) = provisioner.into_parts();
        assert_eq!(network.begin_calls, 2);
        assert!(network.smart_config_stopped);
        assert_eq!(indicator.levels, [true, false]);
    }

    #[test]
    fn test_connected_is_terminal() {
        let network = FakeNetwork {
            credentials: true,
            ..Default::default()
        };
        let mut provisioner = Provisioner::new(network, RecordingIndicator::default(), "airq");
        block_on(provisioner.run());
        assert_eq!(provisioner.state(), ProvisioningState::Connected);
        assert_eq!(block_on(provisioner.poll()), Step::Connected);
    }
}

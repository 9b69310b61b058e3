use fleetwatch_core::LogLevel;
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(5_000);
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;
pub const DEFAULT_SIMULATOR_GRACE: Duration = Duration::from_millis(2_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Offline,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Offline => "offline",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which event source may currently mutate dashboard state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Authority {
    None,
    Live,
    Simulator,
}

impl Authority {
    pub fn as_str(self) -> &'static str {
        match self {
            Authority::None => "none",
            Authority::Live => "live",
            Authority::Simulator => "simulator",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionInput {
    Start,
    ReconnectRequested,
    TransportOpened,
    TransportClosed,
    TransportFailed(String),
    RetryElapsed,
    GraceElapsed,
}

impl ConnectionInput {
    fn name(&self) -> &'static str {
        match self {
            ConnectionInput::Start => "start",
            ConnectionInput::ReconnectRequested => "reconnect_requested",
            ConnectionInput::TransportOpened => "transport_opened",
            ConnectionInput::TransportClosed => "transport_closed",
            ConnectionInput::TransportFailed(_) => "transport_failed",
            ConnectionInput::RetryElapsed => "retry_elapsed",
            ConnectionInput::GraceElapsed => "grace_elapsed",
        }
    }
}

/// Side effects the runtime must carry out, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEffect {
    OpenTransport,
    ScheduleRetry(Duration),
    CancelRetry,
    ScheduleGrace(Duration),
    ActivateSimulator,
    DeactivateSimulator,
    ConnectivityChanged(bool),
    Log { level: LogLevel, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionPolicy {
    pub reconnect_delay: Duration,
    pub max_reconnect_attempts: u32,
    pub simulator_grace: Duration,
    pub simulator_enabled: bool,
}

impl Default for ConnectionPolicy {
    fn default() -> Self {
        Self {
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            simulator_grace: DEFAULT_SIMULATOR_GRACE,
            simulator_enabled: true,
        }
    }
}

/// Live transport lifecycle as an explicit transition table.
///
/// | from                     | input               | to            |
/// |--------------------------|---------------------|---------------|
/// | Disconnected             | Start               | Connecting    |
/// | Disconnected/Reconnecting/Offline | ReconnectRequested | Connecting |
/// | Connecting               | TransportOpened     | Connected     |
/// | Connecting/Connected     | Closed/Failed       | Reconnecting, or Offline at the attempt ceiling |
/// | Reconnecting             | RetryElapsed        | Connecting    |
/// | any                      | GraceElapsed        | unchanged     |
///
/// Anything else is rejected and leaves the machine untouched.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    policy: ConnectionPolicy,
    state: ConnectionState,
    attempts: u32,
    ever_connected: bool,
    simulator_active: bool,
}

impl ConnectionManager {
    pub fn new(policy: ConnectionPolicy) -> Self {
        Self {
            policy,
            state: ConnectionState::Disconnected,
            attempts: 0,
            ever_connected: false,
            simulator_active: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn simulator_active(&self) -> bool {
        self.simulator_active
    }

    pub fn authority(&self) -> Authority {
        if self.state == ConnectionState::Connected {
            Authority::Live
        } else if self.simulator_active {
            Authority::Simulator
        } else {
            Authority::None
        }
    }

    pub fn handle(&mut self, input: ConnectionInput) -> Vec<ConnectionEffect> {
        use ConnectionState::*;

        let from = self.state;
        let effects = match (from, &input) {
            (Disconnected, ConnectionInput::Start) => {
                self.state = Connecting;
                let mut effects = vec![ConnectionEffect::OpenTransport];
                if self.policy.simulator_enabled {
                    effects.push(ConnectionEffect::ScheduleGrace(self.policy.simulator_grace));
                }
                effects
            }
            (Disconnected | Reconnecting | Offline, ConnectionInput::ReconnectRequested) => {
                let mut effects = Vec::new();
                if from == Reconnecting {
                    effects.push(ConnectionEffect::CancelRetry);
                }
                if from == Offline {
                    self.attempts = 0;
                }
                self.state = Connecting;
                effects.push(ConnectionEffect::Log {
                    level: LogLevel::Info,
                    message: "Reconnect requested".to_string(),
                });
                effects.push(ConnectionEffect::OpenTransport);
                effects
            }
            (Connecting, ConnectionInput::TransportOpened) => self.on_opened(),
            (Connecting | Connected, ConnectionInput::TransportClosed) => self.on_lost(None),
            (Connecting | Connected, ConnectionInput::TransportFailed(reason)) => {
                self.on_lost(Some(reason.clone()))
            }
            (Reconnecting, ConnectionInput::RetryElapsed) => {
                self.state = Connecting;
                vec![ConnectionEffect::OpenTransport]
            }
            (_, ConnectionInput::GraceElapsed) => {
                if self.state != Connected && !self.ever_connected {
                    self.activate_simulator()
                } else {
                    Vec::new()
                }
            }
            _ => {
                warn!(
                    state = %from,
                    input = input.name(),
                    "connection_invalid_transition"
                );
                return Vec::new();
            }
        };

        if self.state != from {
            info!(
                from = %from,
                to = %self.state,
                attempts = self.attempts,
                "connection_transition"
            );
        }
        effects
    }

    fn on_opened(&mut self) -> Vec<ConnectionEffect> {
        self.state = ConnectionState::Connected;
        self.attempts = 0;
        self.ever_connected = true;
        let mut effects = vec![
            ConnectionEffect::ConnectivityChanged(true),
            ConnectionEffect::Log {
                level: LogLevel::Success,
                message: "Connected to live server".to_string(),
            },
        ];
        if self.simulator_active {
            self.simulator_active = false;
            effects.push(ConnectionEffect::DeactivateSimulator);
        }
        effects
    }

    fn on_lost(&mut self, failure: Option<String>) -> Vec<ConnectionEffect> {
        let was_connected = self.state == ConnectionState::Connected;
        let mut effects = Vec::new();
        if was_connected {
            effects.push(ConnectionEffect::ConnectivityChanged(false));
        }
        if let Some(reason) = failure.as_deref() {
            warn!(reason, "live_transport_failed");
            if self.attempts == 0 && !self.ever_connected {
                effects.push(ConnectionEffect::Log {
                    level: LogLevel::Warning,
                    message: "No live server detected; running demonstration mode".to_string(),
                });
            }
        }

        self.attempts += 1;
        if self.attempts >= self.policy.max_reconnect_attempts {
            self.state = ConnectionState::Offline;
            effects.push(ConnectionEffect::Log {
                level: LogLevel::Error,
                message: "Max reconnect attempts reached; offline mode".to_string(),
            });
            effects.extend(self.activate_simulator());
        } else {
            self.state = ConnectionState::Reconnecting;
            effects.push(ConnectionEffect::Log {
                level: LogLevel::Error,
                message: format!(
                    "Lost connection; retrying in {}s (attempt {}/{})",
                    self.policy.reconnect_delay.as_secs(),
                    self.attempts,
                    self.policy.max_reconnect_attempts
                ),
            });
            effects.push(ConnectionEffect::ScheduleRetry(self.policy.reconnect_delay));
        }
        effects
    }

    fn activate_simulator(&mut self) -> Vec<ConnectionEffect> {
        if self.simulator_active || !self.policy.simulator_enabled {
            return Vec::new();
        }
        self.simulator_active = true;
        vec![ConnectionEffect::ActivateSimulator]
    }
}

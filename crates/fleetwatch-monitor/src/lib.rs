pub mod config;
pub mod connection;
pub mod feed;
pub mod logging;
pub mod monitor;
pub mod simulator;
pub mod sink;
pub mod store;
pub mod timers;
pub mod transport;
pub mod ui;

pub use connection::{Authority, ConnectionManager, ConnectionPolicy, ConnectionState};
pub use feed::{LevelFilter, LogFeed, LogFilter, LogWindow, Viewport};
pub use monitor::{
    DashboardSnapshot, Monitor, MonitorCommand, MonitorError, MonitorHandle, MonitorSettings,
    SourceKind,
};
pub use simulator::{Simulator, SimulatorConfig};
pub use sink::{ChannelSink, DashboardEvent, DashboardSink, TracingSink};
pub use store::{AgentStore, StoreError};
pub use transport::{LiveTransport, SignalKind, TransportSignal, WebSocketTransport};

pub mod model;
pub mod protocol;

pub use model::{
    clamp_progress, default_roster, AgentState, AgentStatus, FleetStats, LogEntry, LogLevel,
    RosterEntry, DEFAULT_MAX_LOGS,
};
pub use protocol::{
    AgentUpdate, LogDraft, NdjsonDecoder, ProtocolError, StatsPatch, StatsUpdate, TaskComplete,
    UpdateMessage,
};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const PROGRESS_MIN: u8 = 0;
pub const PROGRESS_MAX: u8 = 100;
pub const DEFAULT_MAX_LOGS: usize = 100;
pub const UNASSIGNED_TASK_LABEL: &str = "Waiting for assignment...";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Idle,
    Active,
    Error,
}

impl AgentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Active => "active",
            AgentStatus::Error => "error",
        }
    }

    pub fn is_active(self) -> bool {
        matches!(self, AgentStatus::Active)
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentStatus {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "idle" => Ok(AgentStatus::Idle),
            "active" => Ok(AgentStatus::Active),
            "error" => Ok(AgentStatus::Error),
            other => Err(format!("Unknown agent status: {other}")),
        }
    }
}

/// Live view of one roster member.
///
/// `task == None` means no task is assigned; `Some("")` is a legitimate
/// (empty) assignment and is kept distinct.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentState {
    pub id: String,
    pub name: String,
    pub status: AgentStatus,
    #[serde(default)]
    pub task: Option<String>,
    pub progress: u8,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default, rename = "linesChanged")]
    pub lines_changed: Option<u64>,
    #[serde(default, rename = "timeActive")]
    pub time_active: Option<String>,
}

impl AgentState {
    pub fn idle(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: AgentStatus::Idle,
            task: None,
            progress: PROGRESS_MIN,
            files: Vec::new(),
            lines_changed: None,
            time_active: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn task_label(&self) -> &str {
        self.task.as_deref().unwrap_or(UNASSIGNED_TASK_LABEL)
    }
}

pub fn clamp_progress(value: i64) -> u8 {
    value.clamp(i64::from(PROGRESS_MIN), i64::from(PROGRESS_MAX)) as u8
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct FleetStats {
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub active_agents: u32,
    pub files_modified: u64,
}

impl FleetStats {
    /// Completed over started tasks; 0.0 before any task has started.
    pub fn success_rate(&self) -> f64 {
        if self.total_tasks == 0 {
            return 0.0;
        }
        self.completed_tasks as f64 / self.total_tasks as f64
    }

    pub fn success_percent(&self) -> u8 {
        (self.success_rate() * 100.0).round().clamp(0.0, 100.0) as u8
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Success,
    Warning,
    Error,
    #[default]
    Info,
}

impl LogLevel {
    pub const ALL: [LogLevel; 4] = [
        LogLevel::Success,
        LogLevel::Warning,
        LogLevel::Error,
        LogLevel::Info,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Success => "success",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Info => "info",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "success" => Ok(LogLevel::Success),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            "info" => Ok(LogLevel::Info),
            other => Err(format!("Unknown log level: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogEntry {
    pub id: String,
    pub timestamp: String,
    pub message: String,
    #[serde(rename = "type")]
    pub level: LogLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub id: String,
    pub name: String,
}

impl RosterEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl FromStr for RosterEntry {
    type Err = String;

    /// Accepts `id` or `id:Display Name`.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (id, name) = match input.split_once(':') {
            Some((id, name)) => (id.trim(), name.trim()),
            None => (input.trim(), ""),
        };
        if id.is_empty() {
            return Err(format!("invalid roster entry: '{input}'"));
        }
        let name = if name.is_empty() {
            capitalize(id)
        } else {
            name.to_string()
        };
        Ok(RosterEntry::new(id, name))
    }
}

pub fn default_roster() -> Vec<RosterEntry> {
    [
        ("alfred", "Alfred"),
        ("robin", "Robin"),
        ("oracle", "Oracle"),
        ("batgirl", "Batgirl"),
        ("lucius", "Lucius"),
    ]
    .into_iter()
    .map(|(id, name)| RosterEntry::new(id, name))
    .collect()
}

fn capitalize(input: &str) -> String {
    let mut chars = input.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

use crate::model::{AgentStatus, LogLevel};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_MAX_FRAME_BYTES: usize = 256 * 1024;

/// Discriminated update message shared by the live transport, the simulator
/// and the external injector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpdateMessage {
    AgentUpdate(AgentUpdate),
    StatsUpdate(StatsUpdate),
    LogEntry(LogDraft),
    TaskComplete(TaskComplete),
}

impl UpdateMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            UpdateMessage::AgentUpdate(_) => "agent_update",
            UpdateMessage::StatsUpdate(_) => "stats_update",
            UpdateMessage::LogEntry(_) => "log_entry",
            UpdateMessage::TaskComplete(_) => "task_complete",
        }
    }

    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        decode_message(text.as_bytes(), DEFAULT_MAX_FRAME_BYTES)
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|err| ProtocolError::Encode(err.to_string()))
    }
}

/// Partial agent update. Every `None` means "leave unchanged"; JSON `null`
/// and a missing key are treated the same.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AgentUpdate {
    pub agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AgentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
    #[serde(
        default,
        rename = "linesChanged",
        alias = "lines_changed",
        skip_serializing_if = "Option::is_none"
    )]
    pub lines_changed: Option<u64>,
    #[serde(
        default,
        rename = "timeActive",
        alias = "time_active",
        skip_serializing_if = "Option::is_none"
    )]
    pub time_active: Option<String>,
}

impl AgentUpdate {
    pub fn new(agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            ..Self::default()
        }
    }

    pub fn status(mut self, status: AgentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }

    pub fn progress(mut self, progress: i64) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.files = Some(files.into_iter().map(Into::into).collect());
        self
    }
}

impl From<AgentUpdate> for UpdateMessage {
    fn from(update: AgentUpdate) -> Self {
        UpdateMessage::AgentUpdate(update)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StatsUpdate {
    #[serde(default)]
    pub stats: StatsPatch,
}

/// Server-pushed counter overrides. `active_agents` is carried for wire
/// compatibility only; the store always derives it from agent statuses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct StatsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tasks: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_tasks: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files_modified: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_agents: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LogDraft {
    pub message: String,
    #[serde(default)]
    pub level: LogLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl LogDraft {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level,
            ..Self::default()
        }
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }
}

impl From<LogDraft> for UpdateMessage {
    fn from(draft: LogDraft) -> Self {
        UpdateMessage::LogEntry(draft)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskComplete {
    pub agent: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("frame exceeds max size: {size} > {max}")]
    OversizedFrame { size: usize, max: usize },
    #[error("message encode failed: {0}")]
    Encode(String),
    #[error("message decode failed: {0}")]
    Decode(String),
}

pub fn decode_message(bytes: &[u8], max_frame_bytes: usize) -> Result<UpdateMessage, ProtocolError> {
    let raw = trim_line_ending(bytes);
    if raw.len() > max_frame_bytes {
        return Err(ProtocolError::OversizedFrame {
            size: raw.len(),
            max: max_frame_bytes,
        });
    }
    serde_json::from_slice(raw).map_err(|err| ProtocolError::Decode(err.to_string()))
}

fn trim_line_ending(bytes: &[u8]) -> &[u8] {
    let mut raw = bytes;
    if raw.ends_with(b"\n") {
        raw = &raw[..raw.len() - 1];
    }
    if raw.ends_with(b"\r") {
        raw = &raw[..raw.len() - 1];
    }
    raw
}

/// Outcome of each complete line in a chunk, in input order.
#[derive(Debug, Clone, Default)]
pub struct DecodeReport {
    pub frames: Vec<Result<UpdateMessage, ProtocolError>>,
}

/// Incremental newline-delimited decoder used by the stdin injector.
/// A bad line is reported and skipped; decoding resumes at the next line.
pub struct NdjsonDecoder {
    max_frame_bytes: usize,
    pending: Vec<u8>,
}

impl Default for NdjsonDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl NdjsonDecoder {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            max_frame_bytes,
            pending: Vec::new(),
        }
    }

    pub fn push_chunk(&mut self, chunk: &[u8]) -> DecodeReport {
        let mut report = DecodeReport::default();
        self.pending.extend_from_slice(chunk);

        while let Some(newline_idx) = self.pending.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline_idx).collect();
            self.decode_line(&line, &mut report);
        }

        if self.pending.len() > self.max_frame_bytes {
            report.frames.push(Err(ProtocolError::OversizedFrame {
                size: self.pending.len(),
                max: self.max_frame_bytes,
            }));
            self.pending.clear();
        }
        report
    }

    pub fn finish(&mut self) -> DecodeReport {
        let mut report = DecodeReport::default();
        let rest = std::mem::take(&mut self.pending);
        self.decode_line(&rest, &mut report);
        report
    }

    fn decode_line(&self, line: &[u8], report: &mut DecodeReport) {
        if trim_line_ending(line).iter().all(u8::is_ascii_whitespace) {
            return;
        }
        report.frames.push(decode_message(line, self.max_frame_bytes));
    }
}

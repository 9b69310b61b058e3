use crate::feed::LogWindow;
use fleetwatch_core::{AgentState, FleetStats, LogEntry};
use tokio::sync::mpsc;
use tracing::debug;

/// Render-side observer of monitor changes. Every hook defaults to a no-op
/// so a sink only implements what it draws.
pub trait DashboardSink: Send {
    fn on_agent_changed(&mut self, _agent: &AgentState) {}
    fn on_stats_changed(&mut self, _stats: &FleetStats) {}
    fn on_log_appended(&mut self, _entry: &LogEntry) {}
    fn on_log_window_changed(&mut self, _window: &LogWindow) {}
    fn on_connectivity_changed(&mut self, _connected: bool) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardEvent {
    AgentChanged(AgentState),
    StatsChanged(FleetStats),
    LogAppended(LogEntry),
    LogWindowChanged(LogWindow),
    ConnectivityChanged(bool),
}

/// Forwards every change onto a channel, for UIs that run on their own task.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<DashboardEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<DashboardEvent>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DashboardEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    fn send(&self, event: DashboardEvent) {
        let _ = self.tx.send(event);
    }
}

impl DashboardSink for ChannelSink {
    fn on_agent_changed(&mut self, agent: &AgentState) {
        self.send(DashboardEvent::AgentChanged(agent.clone()));
    }

    fn on_stats_changed(&mut self, stats: &FleetStats) {
        self.send(DashboardEvent::StatsChanged(*stats));
    }

    fn on_log_appended(&mut self, entry: &LogEntry) {
        self.send(DashboardEvent::LogAppended(entry.clone()));
    }

    fn on_log_window_changed(&mut self, window: &LogWindow) {
        self.send(DashboardEvent::LogWindowChanged(window.clone()));
    }

    fn on_connectivity_changed(&mut self, connected: bool) {
        self.send(DashboardEvent::ConnectivityChanged(connected));
    }
}

/// Mirrors changes into the tracing log; used by headless mode.
#[derive(Debug, Default)]
pub struct TracingSink;

impl DashboardSink for TracingSink {
    fn on_agent_changed(&mut self, agent: &AgentState) {
        debug!(
            agent = %agent.id,
            status = %agent.status,
            progress = agent.progress,
            "dashboard_agent"
        );
    }

    fn on_stats_changed(&mut self, stats: &FleetStats) {
        debug!(
            total = stats.total_tasks,
            completed = stats.completed_tasks,
            active = stats.active_agents,
            files = stats.files_modified,
            "dashboard_stats"
        );
    }

    fn on_log_appended(&mut self, entry: &LogEntry) {
        tracing::info!(
            level = entry.level.as_str(),
            agent = entry.agent.as_deref().unwrap_or("-"),
            "{}",
            entry.message
        );
    }

    fn on_connectivity_changed(&mut self, connected: bool) {
        tracing::info!(connected, "dashboard_connectivity");
    }
}

use crate::connection::{
    Authority, ConnectionEffect, ConnectionInput, ConnectionManager, ConnectionPolicy,
    ConnectionState,
};
use crate::feed::{LogFeed, LogFilter, LogWindow, Viewport};
use crate::simulator::{SimAction, SimTimer, Simulator, SimulatorConfig};
use crate::sink::DashboardSink;
use crate::store::AgentStore;
use crate::timers::TimerSet;
use crate::transport::{LiveTransport, SignalKind, TransportSignal};
use fleetwatch_core::protocol::{decode_message, DEFAULT_MAX_FRAME_BYTES};
use fleetwatch_core::{
    default_roster, AgentState, FleetStats, LogDraft, LogEntry, LogLevel, RosterEntry,
    UpdateMessage, DEFAULT_MAX_LOGS,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

const COMMAND_QUEUE: usize = 256;

/// Where an update came from. Live and simulator updates are only applied
/// while that source is authoritative; external injections always apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Live,
    Simulator,
    External,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Live => "live",
            SourceKind::Simulator => "simulator",
            SourceKind::External => "external",
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub policy: ConnectionPolicy,
    pub simulator: SimulatorConfig,
    pub roster: Vec<RosterEntry>,
    pub max_logs: usize,
    pub max_frame_bytes: usize,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            policy: ConnectionPolicy::default(),
            simulator: SimulatorConfig::default(),
            roster: default_roster(),
            max_logs: DEFAULT_MAX_LOGS,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub connection: String,
    pub authority: String,
    pub connected: bool,
    pub reconnect_attempts: u32,
    pub agents: Vec<AgentState>,
    pub stats: FleetStats,
    pub success_rate: f64,
    pub filter: LogFilter,
    pub window: LogWindow,
    pub log_count: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MonitorError {
    #[error("monitor has shut down")]
    Closed,
}

#[derive(Debug)]
pub enum MonitorCommand {
    Inject(UpdateMessage),
    InjectRaw(String),
    Reconnect,
    SetFilter(LogFilter),
    SetViewport(Viewport),
    ClearLogs,
    LogDetails {
        id: String,
        reply: oneshot::Sender<Option<LogEntry>>,
    },
    Snapshot(oneshot::Sender<DashboardSnapshot>),
    Shutdown,
}

/// Cloneable front door to a running [`Monitor`].
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    tx: mpsc::Sender<MonitorCommand>,
}

impl MonitorHandle {
    async fn send(&self, command: MonitorCommand) -> Result<(), MonitorError> {
        self.tx.send(command).await.map_err(|_| MonitorError::Closed)
    }

    pub async fn inject(&self, message: UpdateMessage) -> Result<(), MonitorError> {
        self.send(MonitorCommand::Inject(message)).await
    }

    pub async fn inject_raw(&self, raw: impl Into<String>) -> Result<(), MonitorError> {
        self.send(MonitorCommand::InjectRaw(raw.into())).await
    }

    pub async fn reconnect(&self) -> Result<(), MonitorError> {
        self.send(MonitorCommand::Reconnect).await
    }

    pub async fn set_filter(&self, filter: LogFilter) -> Result<(), MonitorError> {
        self.send(MonitorCommand::SetFilter(filter)).await
    }

    pub async fn set_viewport(&self, viewport: Viewport) -> Result<(), MonitorError> {
        self.send(MonitorCommand::SetViewport(viewport)).await
    }

    pub async fn clear_logs(&self) -> Result<(), MonitorError> {
        self.send(MonitorCommand::ClearLogs).await
    }

    pub async fn log_details(&self, id: impl Into<String>) -> Result<Option<LogEntry>, MonitorError> {
        let (reply, rx) = oneshot::channel();
        self.send(MonitorCommand::LogDetails {
            id: id.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| MonitorError::Closed)
    }

    pub async fn snapshot(&self) -> Result<DashboardSnapshot, MonitorError> {
        let (reply, rx) = oneshot::channel();
        self.send(MonitorCommand::Snapshot(reply)).await?;
        rx.await.map_err(|_| MonitorError::Closed)
    }

    /// Stops the monitor. Calling it on an already stopped monitor is fine.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(MonitorCommand::Shutdown).await;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TimerKey {
    Retry,
    Grace,
    Sim(SimTimer),
}

/// Single owner of connection state, agent store, log feed and simulator.
/// All mutation happens on the task running [`Monitor::run`]; the rest of
/// the program talks to it through a [`MonitorHandle`].
pub struct Monitor<T: LiveTransport> {
    settings: MonitorSettings,
    connection: ConnectionManager,
    store: AgentStore,
    feed: LogFeed,
    viewport: Viewport,
    simulator: Simulator,
    transport: T,
    attempt: u64,
    timers: TimerSet<TimerKey>,
    signals_tx: mpsc::UnboundedSender<TransportSignal>,
    signals_rx: mpsc::UnboundedReceiver<TransportSignal>,
    commands: mpsc::Receiver<MonitorCommand>,
    sinks: Vec<Box<dyn DashboardSink>>,
    started: bool,
    disposed: bool,
}

impl<T: LiveTransport> Monitor<T> {
    pub fn new(settings: MonitorSettings, transport: T) -> (Self, MonitorHandle) {
        let (tx, commands) = mpsc::channel(COMMAND_QUEUE);
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        let monitor = Self {
            connection: ConnectionManager::new(settings.policy),
            store: AgentStore::new(&settings.roster),
            feed: LogFeed::new(settings.max_logs),
            viewport: Viewport::default(),
            simulator: Simulator::new(settings.simulator.clone()),
            settings,
            transport,
            attempt: 0,
            timers: TimerSet::new(),
            signals_tx,
            signals_rx,
            commands,
            sinks: Vec::new(),
            started: false,
            disposed: false,
        };
        (monitor, MonitorHandle { tx })
    }

    pub fn add_sink(&mut self, sink: Box<dyn DashboardSink>) {
        self.sinks.push(sink);
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn authority(&self) -> Authority {
        self.connection.authority()
    }

    pub fn store(&self) -> &AgentStore {
        &self.store
    }

    pub fn feed(&self) -> &LogFeed {
        &self.feed
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Kicks off the first connection attempt. Must be called from within a
    /// tokio runtime because timers and the transport spawn tasks.
    pub fn start(&mut self) {
        if self.started || self.disposed {
            return;
        }
        self.started = true;
        info!(
            max_attempts = self.settings.policy.max_reconnect_attempts,
            simulator = self.settings.policy.simulator_enabled,
            "monitor_start"
        );
        self.drive(ConnectionInput::Start);
    }

    pub async fn run(mut self) {
        self.start();
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(MonitorCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(signal) = self.signals_rx.recv() => self.handle_signal(signal),
                Some(key) = self.timers.next_due() => self.handle_timer(key),
            }
        }
        self.dispose();
    }

    /// Cancels every timer, stops the simulator, closes the transport and
    /// detaches sinks. After this every entry point is a no-op.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.timers.cancel_all();
        self.simulator.stop();
        self.transport.close();
        self.sinks.clear();
        info!(state = %self.connection.state(), "monitor_disposed");
    }

    pub fn handle_command(&mut self, command: MonitorCommand) {
        if self.disposed {
            return;
        }
        match command {
            MonitorCommand::Inject(message) => self.apply(SourceKind::External, message),
            MonitorCommand::InjectRaw(raw) => self.apply_raw(SourceKind::External, &raw),
            MonitorCommand::Reconnect => self.drive(ConnectionInput::ReconnectRequested),
            MonitorCommand::SetFilter(filter) => {
                self.feed.set_filter(filter);
                self.viewport.scroll_offset = 0;
                self.publish_window();
            }
            MonitorCommand::SetViewport(viewport) => {
                self.viewport = viewport;
                self.publish_window();
            }
            MonitorCommand::ClearLogs => {
                let entry = self.feed.clear();
                self.viewport.scroll_offset = 0;
                self.notify(|sink| sink.on_log_appended(&entry));
                self.publish_window();
            }
            MonitorCommand::LogDetails { id, reply } => {
                let _ = reply.send(self.feed.find(&id).cloned());
            }
            MonitorCommand::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            MonitorCommand::Shutdown => self.dispose(),
        }
    }

    pub fn handle_signal(&mut self, signal: TransportSignal) {
        if self.disposed {
            return;
        }
        if signal.attempt != self.attempt {
            debug!(
                attempt = signal.attempt,
                current = self.attempt,
                "stale_transport_signal"
            );
            return;
        }
        match signal.kind {
            SignalKind::Opened => self.drive(ConnectionInput::TransportOpened),
            SignalKind::Message(text) => self.apply_raw(SourceKind::Live, &text),
            SignalKind::Closed => {
                self.transport.close();
                self.drive(ConnectionInput::TransportClosed);
            }
            SignalKind::Error(reason) => {
                self.transport.close();
                self.drive(ConnectionInput::TransportFailed(reason));
            }
        }
    }

    fn handle_timer(&mut self, key: TimerKey) {
        if self.disposed {
            return;
        }
        match key {
            TimerKey::Retry => self.drive(ConnectionInput::RetryElapsed),
            TimerKey::Grace => self.drive(ConnectionInput::GraceElapsed),
            TimerKey::Sim(timer) => {
                let actions = self.simulator.on_timer(timer, &self.store);
                self.run_sim_actions(actions);
            }
        }
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        let state = self.connection.state();
        DashboardSnapshot {
            connection: state.as_str().to_string(),
            authority: self.connection.authority().as_str().to_string(),
            connected: state == ConnectionState::Connected,
            reconnect_attempts: self.connection.attempts(),
            agents: self.store.agents(),
            stats: self.store.stats(),
            success_rate: self.store.success_rate(),
            filter: self.feed.filter().clone(),
            window: self.feed.windowed_read(self.viewport),
            log_count: self.feed.len(),
        }
    }

    fn drive(&mut self, input: ConnectionInput) {
        let effects = self.connection.handle(input);
        for effect in effects {
            self.execute(effect);
        }
    }

    fn execute(&mut self, effect: ConnectionEffect) {
        match effect {
            ConnectionEffect::OpenTransport => {
                self.attempt += 1;
                self.transport.open(self.attempt, self.signals_tx.clone());
            }
            ConnectionEffect::ScheduleRetry(delay) => {
                self.timers.cancel_where(|key| *key == TimerKey::Retry);
                self.timers.schedule(TimerKey::Retry, delay);
            }
            ConnectionEffect::CancelRetry => {
                self.timers.cancel_where(|key| *key == TimerKey::Retry);
            }
            ConnectionEffect::ScheduleGrace(delay) => {
                self.timers.schedule(TimerKey::Grace, delay);
            }
            ConnectionEffect::ActivateSimulator => {
                info!("simulator_activated");
                let actions = self.simulator.start(&self.store);
                self.run_sim_actions(actions);
            }
            ConnectionEffect::DeactivateSimulator => {
                info!("simulator_deactivated");
                self.simulator.stop();
                self.timers
                    .cancel_where(|key| matches!(key, TimerKey::Sim(_)));
            }
            ConnectionEffect::ConnectivityChanged(connected) => {
                self.notify(|sink| sink.on_connectivity_changed(connected));
            }
            ConnectionEffect::Log { level, message } => {
                self.append_log(LogDraft::new(level, message));
            }
        }
    }

    fn run_sim_actions(&mut self, actions: Vec<SimAction>) {
        for action in actions {
            match action {
                SimAction::Emit(message) => self.apply(SourceKind::Simulator, message),
                SimAction::Schedule { timer, after } => {
                    self.schedule_sim(timer, after);
                }
            }
        }
    }

    fn schedule_sim(&mut self, timer: SimTimer, after: Duration) {
        self.timers.schedule(TimerKey::Sim(timer), after);
    }

    fn accepts(&self, source: SourceKind) -> bool {
        match source {
            SourceKind::External => true,
            SourceKind::Live => self.connection.authority() == Authority::Live,
            SourceKind::Simulator => self.connection.authority() == Authority::Simulator,
        }
    }

    fn apply_raw(&mut self, source: SourceKind, raw: &str) {
        if !self.accepts(source) {
            debug!(source = source.as_str(), "update_dropped_not_authoritative");
            return;
        }
        match decode_message(raw.as_bytes(), self.settings.max_frame_bytes) {
            Ok(message) => self.apply(source, message),
            Err(err) => {
                warn!(source = source.as_str(), "update_parse_error: {err}");
                self.append_log(LogDraft::new(
                    LogLevel::Error,
                    format!("Failed to parse update: {err}"),
                ));
            }
        }
    }

    /// Applies one update from `source` if that source may currently write.
    pub fn apply(&mut self, source: SourceKind, message: UpdateMessage) {
        if self.disposed {
            return;
        }
        if !self.accepts(source) {
            debug!(
                source = source.as_str(),
                kind = message.kind(),
                "update_dropped_not_authoritative"
            );
            return;
        }
        match message {
            UpdateMessage::AgentUpdate(update) => match self.store.apply_update(&update) {
                Ok(change) => {
                    self.notify(|sink| {
                        sink.on_agent_changed(&change.agent);
                        sink.on_stats_changed(&change.stats);
                    });
                }
                Err(err) => warn!(source = source.as_str(), "agent_update_ignored: {err}"),
            },
            UpdateMessage::StatsUpdate(update) => {
                let stats = self.store.apply_stats(&update.stats);
                self.notify(|sink| sink.on_stats_changed(&stats));
            }
            UpdateMessage::LogEntry(draft) => self.append_log(draft),
            UpdateMessage::TaskComplete(done) => self.complete(&done.agent),
        }
    }

    fn complete(&mut self, agent_id: &str) {
        let completed = match self.store.complete_task(agent_id) {
            Ok(completed) => completed,
            Err(err) => {
                warn!("task_complete_ignored: {err}");
                return;
            }
        };
        let agent = &completed.change.agent;
        let message = match completed.task.as_deref() {
            Some(task) => format!("{} completed: {task}", agent.name),
            None => format!("{} completed a task", agent.name),
        };
        let draft = LogDraft::new(LogLevel::Success, message).with_agent(agent.id.clone());
        self.notify(|sink| {
            sink.on_agent_changed(&completed.change.agent);
            sink.on_stats_changed(&completed.change.stats);
        });
        self.append_log(draft);
    }

    fn append_log(&mut self, draft: LogDraft) {
        let entry = self.feed.append(draft);
        self.notify(|sink| sink.on_log_appended(&entry));
        self.publish_window();
    }

    fn publish_window(&mut self) {
        if self.sinks.is_empty() {
            return;
        }
        let window = self.feed.windowed_read(self.viewport);
        self.notify(|sink| sink.on_log_window_changed(&window));
    }

    fn notify(&mut self, mut hook: impl FnMut(&mut dyn DashboardSink)) {
        for sink in &mut self.sinks {
            hook(sink.as_mut());
        }
    }
}

impl<T: LiveTransport> Drop for Monitor<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{ChannelSink, DashboardEvent};
    use fleetwatch_core::{AgentStatus, AgentUpdate, StatsPatch, StatsUpdate, TaskComplete};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingTransport {
        opened: Arc<Mutex<Vec<u64>>>,
    }

    impl LiveTransport for RecordingTransport {
        fn open(&mut self, attempt: u64, _signals: mpsc::UnboundedSender<TransportSignal>) {
            self.opened.lock().expect("lock").push(attempt);
        }

        fn close(&mut self) {}
    }

    fn monitor() -> (Monitor<RecordingTransport>, RecordingTransport) {
        let transport = RecordingTransport::default();
        let settings = MonitorSettings {
            simulator: SimulatorConfig {
                seed: Some(11),
                ..SimulatorConfig::default()
            },
            ..MonitorSettings::default()
        };
        let (monitor, _handle) = Monitor::new(settings, transport.clone());
        (monitor, transport)
    }

    fn signal(attempt: u64, kind: SignalKind) -> TransportSignal {
        TransportSignal { attempt, kind }
    }

    #[tokio::test]
    async fn start_opens_first_attempt() {
        let (mut monitor, transport) = monitor();
        monitor.start();
        monitor.start();
        assert_eq!(*transport.opened.lock().expect("lock"), vec![1]);
        assert_eq!(monitor.connection_state(), ConnectionState::Connecting);
    }

    #[tokio::test]
    async fn live_messages_apply_only_while_connected() {
        let (mut monitor, _transport) = monitor();
        monitor.start();
        let update = r#"{"type":"agent_update","agent":"robin","status":"active"}"#;
        monitor.handle_signal(signal(1, SignalKind::Message(update.to_string())));
        assert_eq!(monitor.store().stats().active_agents, 0);

        monitor.handle_signal(signal(1, SignalKind::Opened));
        monitor.handle_signal(signal(1, SignalKind::Message(update.to_string())));
        assert_eq!(monitor.store().stats().active_agents, 1);
        assert_eq!(monitor.authority(), Authority::Live);
    }

    #[tokio::test]
    async fn stale_attempt_signals_are_ignored() {
        let (mut monitor, _transport) = monitor();
        monitor.start();
        monitor.handle_signal(signal(7, SignalKind::Opened));
        assert_eq!(monitor.connection_state(), ConnectionState::Connecting);
    }

    #[tokio::test]
    async fn malformed_live_frame_becomes_error_entry() {
        let (mut monitor, _transport) = monitor();
        monitor.start();
        monitor.handle_signal(signal(1, SignalKind::Opened));
        monitor.handle_signal(signal(1, SignalKind::Message("{not json".to_string())));
        let newest = monitor.feed().entries().next().cloned().expect("entry");
        assert_eq!(newest.level, LogLevel::Error);
        assert!(newest.message.starts_with("Failed to parse update"));
        assert_eq!(monitor.connection_state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn external_updates_bypass_authority() {
        let (mut monitor, _transport) = monitor();
        let (sink, mut events) = ChannelSink::channel();
        monitor.add_sink(Box::new(sink));
        monitor.apply(
            SourceKind::External,
            AgentUpdate::new("oracle")
                .status(AgentStatus::Active)
                .task("triage")
                .into(),
        );
        assert!(matches!(
            events.try_recv(),
            Ok(DashboardEvent::AgentChanged(agent)) if agent.id == "oracle"
        ));
        assert!(matches!(events.try_recv(), Ok(DashboardEvent::StatsChanged(_))));

        monitor.apply(
            SourceKind::Simulator,
            AgentUpdate::new("robin").status(AgentStatus::Active).into(),
        );
        assert_eq!(monitor.store().stats().active_agents, 1);
    }

    #[tokio::test]
    async fn task_complete_logs_agent_name_and_task() {
        let (mut monitor, _transport) = monitor();
        monitor.apply(
            SourceKind::External,
            AgentUpdate::new("lucius")
                .status(AgentStatus::Active)
                .task("socket research")
                .into(),
        );
        monitor.apply(
            SourceKind::External,
            UpdateMessage::TaskComplete(TaskComplete {
                agent: "lucius".to_string(),
            }),
        );
        let newest = monitor.feed().entries().next().cloned().expect("entry");
        assert_eq!(newest.message, "Lucius completed: socket research");
        assert_eq!(newest.level, LogLevel::Success);
        assert_eq!(monitor.store().stats().completed_tasks, 1);
    }

    #[tokio::test]
    async fn stats_update_and_commands() {
        let (mut monitor, _transport) = monitor();
        monitor.apply(
            SourceKind::External,
            UpdateMessage::StatsUpdate(StatsUpdate {
                stats: StatsPatch {
                    total_tasks: Some(4),
                    completed_tasks: Some(1),
                    files_modified: Some(9),
                    active_agents: Some(3),
                },
            }),
        );
        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.stats.total_tasks, 4);
        assert_eq!(snapshot.stats.active_agents, 0);
        assert!((snapshot.success_rate - 0.25).abs() < f64::EPSILON);

        monitor.handle_command(MonitorCommand::InjectRaw(
            r#"{"type":"log_entry","message":"hello","level":"warning"}"#.to_string(),
        ));
        let newest = monitor.feed().entries().next().cloned().expect("entry");
        assert_eq!(newest.level, LogLevel::Warning);
        monitor.handle_command(MonitorCommand::ClearLogs);
        assert_eq!(monitor.feed().len(), 1);

        let (reply, mut rx) = oneshot::channel();
        let id = monitor.feed().entries().next().map(|entry| entry.id.clone());
        monitor.handle_command(MonitorCommand::LogDetails {
            id: id.clone().unwrap_or_default(),
            reply,
        });
        let found = rx.try_recv().expect("reply").expect("entry");
        assert_eq!(Some(found.id), id);
    }

    #[tokio::test]
    async fn filter_and_clear_rewind_the_log_window() {
        let (mut monitor, _transport) = monitor();
        for idx in 0..60 {
            let level = if idx % 2 == 0 { LogLevel::Error } else { LogLevel::Info };
            monitor.handle_command(MonitorCommand::Inject(
                LogDraft::new(level, format!("entry {idx}")).into(),
            ));
        }
        monitor.handle_command(MonitorCommand::SetViewport(Viewport {
            scroll_offset: 40,
            viewport_count: 10,
            item_extent: 1,
        }));
        assert_eq!(monitor.snapshot().window.range, 40..52);

        monitor.handle_command(MonitorCommand::SetFilter(LogFilter::level(LogLevel::Error)));
        let filtered = monitor.snapshot().window;
        assert_eq!(filtered.total, 30);
        assert_eq!(filtered.range, 0..12);
        assert_eq!(filtered.entries[0].message, "entry 58");

        monitor.handle_command(MonitorCommand::SetViewport(Viewport {
            scroll_offset: 20,
            viewport_count: 10,
            item_extent: 1,
        }));
        monitor.handle_command(MonitorCommand::SetFilter(LogFilter::default()));
        monitor.handle_command(MonitorCommand::ClearLogs);
        let cleared = monitor.snapshot().window;
        assert_eq!(cleared.range, 0..1);
        assert_eq!(cleared.entries.len(), 1);
    }

    #[tokio::test]
    async fn serialized_snapshot_carries_log_window() {
        let (mut monitor, _transport) = monitor();
        monitor.handle_command(MonitorCommand::Inject(
            LogDraft::new(LogLevel::Success, "hello").with_agent("robin").into(),
        ));
        let value = serde_json::to_value(monitor.snapshot()).expect("encode");
        let window = &value["window"];
        assert_eq!(window["total"], 1);
        assert_eq!(window["range"], serde_json::json!({"start": 0, "end": 1}));
        assert_eq!(window["entries"][0]["message"], "hello");
        assert_eq!(value["filter"], serde_json::json!({"type": "all", "search": ""}));
        assert_eq!(value["logCount"], 1);
    }

    #[tokio::test]
    async fn dispose_turns_entry_points_into_noops() {
        let (mut monitor, transport) = monitor();
        monitor.start();
        monitor.dispose();
        monitor.handle_command(MonitorCommand::Reconnect);
        monitor.handle_signal(signal(1, SignalKind::Opened));
        monitor.apply(
            SourceKind::External,
            AgentUpdate::new("robin").status(AgentStatus::Active).into(),
        );
        assert!(monitor.is_disposed());
        assert_eq!(monitor.connection_state(), ConnectionState::Connecting);
        assert_eq!(monitor.store().stats().active_agents, 0);
        assert_eq!(*transport.opened.lock().expect("lock"), vec![1]);
    }
}

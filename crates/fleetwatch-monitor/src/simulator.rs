use crate::store::AgentStore;
use fleetwatch_core::{AgentStatus, AgentUpdate, LogDraft, LogLevel, UpdateMessage};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::ops::Range;
use std::time::Duration;
use tracing::debug;

pub const SCRIPT_START_PROGRESS: i64 = 10;
pub const PROGRESS_STEP: Range<i64> = 10..30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedTask {
    pub agent: String,
    pub task: String,
    pub files: Vec<String>,
}

impl ScriptedTask {
    pub fn new(agent: &str, task: &str, files: &[&str]) -> Self {
        Self {
            agent: agent.to_string(),
            task: task.to_string(),
            files: files.iter().map(|file| file.to_string()).collect(),
        }
    }
}

pub fn default_script() -> Vec<ScriptedTask> {
    vec![
        ScriptedTask::new(
            "alfred",
            "Implementing API endpoints for user authentication",
            &["src/api/auth.py", "src/api/users.py"],
        ),
        ScriptedTask::new(
            "robin",
            "Setting up CI/CD pipeline with GitHub Actions",
            &[".github/workflows/ci.yml", "scripts/deploy.sh"],
        ),
        ScriptedTask::new(
            "oracle",
            "Writing unit tests for core modules",
            &["tests/test_core.py", "tests/test_api.py"],
        ),
        ScriptedTask::new(
            "batgirl",
            "Creating responsive dashboard components",
            &["components/Dashboard.jsx", "styles/dashboard.css"],
        ),
        ScriptedTask::new(
            "lucius",
            "Researching WebSocket optimization techniques",
            &["docs/websocket-research.md", "src/realtime/socket.js"],
        ),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatorConfig {
    pub phase_interval: Duration,
    pub progress_interval: Duration,
    pub completion_delay: Duration,
    pub seed: Option<u64>,
    pub script: Vec<ScriptedTask>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            phase_interval: Duration::from_millis(3_000),
            progress_interval: Duration::from_millis(2_000),
            completion_delay: Duration::from_millis(1_000),
            seed: None,
            script: default_script(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SimTimer {
    /// Scripted phase, then random phase once the script is exhausted.
    Phase,
    Progress(String),
    Complete(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimAction {
    Emit(UpdateMessage),
    Schedule { timer: SimTimer, after: Duration },
}

/// Synthetic event source used while no live connection is authoritative.
///
/// The simulator never mutates the store itself; it reads it to decide what
/// to emit and leaves application to the monitor.
pub struct Simulator {
    config: SimulatorConfig,
    rng: StdRng,
    cursor: usize,
    running: bool,
    completing: HashSet<String>,
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            rng,
            cursor: 0,
            running: false,
            completing: HashSet::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Starts (or resumes) the phase cycle; the first phase step runs
    /// immediately.
    pub fn start(&mut self, store: &AgentStore) -> Vec<SimAction> {
        if self.running {
            return Vec::new();
        }
        self.running = true;
        self.phase_step(store)
    }

    /// Stops emitting. Timers owned by the caller must be cancelled as well.
    pub fn stop(&mut self) {
        self.running = false;
        self.completing.clear();
    }

    pub fn on_timer(&mut self, timer: SimTimer, store: &AgentStore) -> Vec<SimAction> {
        if !self.running {
            return Vec::new();
        }
        match timer {
            SimTimer::Phase => self.phase_step(store),
            SimTimer::Progress(agent) => self.progress_step(&agent, store),
            SimTimer::Complete(agent) => {
                if !self.completing.remove(&agent) {
                    return Vec::new();
                }
                vec![SimAction::Emit(UpdateMessage::TaskComplete(
                    fleetwatch_core::TaskComplete { agent },
                ))]
            }
        }
    }

    fn phase_step(&mut self, store: &AgentStore) -> Vec<SimAction> {
        let mut actions = Vec::new();
        if let Some(scripted) = self.next_scripted(store) {
            let name = store
                .agent(&scripted.agent)
                .map(|agent| agent.name.clone())
                .unwrap_or_else(|| scripted.agent.clone());
            debug!(agent = %scripted.agent, "simulator_scripted_task");
            actions.push(SimAction::Emit(
                AgentUpdate::new(scripted.agent.clone())
                    .status(AgentStatus::Active)
                    .task(scripted.task.clone())
                    .progress(SCRIPT_START_PROGRESS)
                    .files(scripted.files.clone())
                    .into(),
            ));
            actions.push(SimAction::Emit(
                LogDraft::new(LogLevel::Success, format!("{name} started: {}", scripted.task))
                    .with_agent(scripted.agent.clone())
                    .into(),
            ));
            actions.push(SimAction::Schedule {
                timer: SimTimer::Progress(scripted.agent),
                after: self.config.progress_interval,
            });
        } else {
            let candidates: Vec<String> = store
                .active_agent_ids()
                .into_iter()
                .filter(|id| !self.completing.contains(id))
                .collect();
            if let Some(agent) = candidates.choose(&mut self.rng).cloned() {
                actions.extend(self.advance(&agent, store));
            }
        }
        actions.push(SimAction::Schedule {
            timer: SimTimer::Phase,
            after: self.config.phase_interval,
        });
        actions
    }

    fn next_scripted(&mut self, store: &AgentStore) -> Option<ScriptedTask> {
        while self.cursor < self.config.script.len() {
            let scripted = self.config.script[self.cursor].clone();
            self.cursor += 1;
            if store.contains(&scripted.agent) {
                return Some(scripted);
            }
            debug!(agent = %scripted.agent, "simulator_skip_unknown_agent");
        }
        None
    }

    fn progress_step(&mut self, agent: &str, store: &AgentStore) -> Vec<SimAction> {
        let still_active = store.agent(agent).map(|state| state.is_active()).unwrap_or(false);
        if !still_active || self.completing.contains(agent) {
            return Vec::new();
        }
        let mut actions = self.advance(agent, store);
        if !self.completing.contains(agent) {
            actions.push(SimAction::Schedule {
                timer: SimTimer::Progress(agent.to_string()),
                after: self.config.progress_interval,
            });
        }
        actions
    }

    fn advance(&mut self, agent: &str, store: &AgentStore) -> Vec<SimAction> {
        let current = store
            .agent(agent)
            .map(|state| i64::from(state.progress))
            .unwrap_or_default();
        let next = (current + self.rng.gen_range(PROGRESS_STEP)).min(100);
        let mut actions = vec![SimAction::Emit(
            AgentUpdate::new(agent)
                .status(AgentStatus::Active)
                .progress(next)
                .into(),
        )];
        if next >= 100 {
            self.completing.insert(agent.to_string());
            actions.push(SimAction::Schedule {
                timer: SimTimer::Complete(agent.to_string()),
                after: self.config.completion_delay,
            });
        }
        actions
    }
}

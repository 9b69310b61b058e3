use fleetwatch_core::{
    clamp_progress, AgentState, AgentStatus, AgentUpdate, FleetStats, RosterEntry, StatsPatch,
};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("unknown agent: {0}")]
    UnknownAgent(String),
}

/// Result of a store mutation, handed to render sinks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentChange {
    pub agent: AgentState,
    pub stats: FleetStats,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedTask {
    pub change: AgentChange,
    pub task: Option<String>,
}

/// Owns every `AgentState` plus the fleet counters.
///
/// `stats.active_agents` is maintained incrementally on status transitions
/// and always equals the number of agents whose status is `active`.
#[derive(Debug, Clone)]
pub struct AgentStore {
    order: Vec<String>,
    agents: BTreeMap<String, AgentState>,
    stats: FleetStats,
}

impl AgentStore {
    pub fn new(roster: &[RosterEntry]) -> Self {
        let mut order = Vec::with_capacity(roster.len());
        let mut agents = BTreeMap::new();
        for entry in roster {
            if agents.contains_key(&entry.id) {
                continue;
            }
            order.push(entry.id.clone());
            agents.insert(
                entry.id.clone(),
                AgentState::idle(entry.id.clone(), entry.name.clone()),
            );
        }
        Self {
            order,
            agents,
            stats: FleetStats::default(),
        }
    }

    pub fn agent(&self, id: &str) -> Option<&AgentState> {
        self.agents.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.agents.contains_key(id)
    }

    /// Agents in roster order.
    pub fn agents(&self) -> Vec<AgentState> {
        self.order
            .iter()
            .filter_map(|id| self.agents.get(id).cloned())
            .collect()
    }

    pub fn active_agent_ids(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|id| self.agents.get(*id).map(AgentState::is_active).unwrap_or(false))
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> FleetStats {
        self.stats
    }

    pub fn success_rate(&self) -> f64 {
        self.stats.success_rate()
    }

    pub fn apply_update(&mut self, update: &AgentUpdate) -> Result<AgentChange, StoreError> {
        let agent = self
            .agents
            .get_mut(&update.agent)
            .ok_or_else(|| StoreError::UnknownAgent(update.agent.clone()))?;

        if let Some(status) = update.status {
            let was_active = agent.status.is_active();
            agent.status = status;
            match (was_active, status.is_active()) {
                (false, true) => {
                    self.stats.active_agents += 1;
                    self.stats.total_tasks += 1;
                }
                (true, false) => {
                    self.stats.active_agents = self.stats.active_agents.saturating_sub(1);
                }
                _ => {}
            }
        }
        if let Some(task) = update.task.as_ref() {
            agent.task = Some(task.clone());
        }
        if let Some(progress) = update.progress {
            agent.progress = clamp_progress(progress);
        }
        if let Some(files) = update.files.as_ref() {
            agent.files = files.clone();
            self.stats.files_modified += files.len() as u64;
        }
        if let Some(lines) = update.lines_changed {
            agent.lines_changed = Some(lines);
        }
        if let Some(time_active) = update.time_active.as_ref() {
            agent.time_active = Some(time_active.clone());
        }

        debug!(
            agent = %agent.id,
            status = %agent.status,
            progress = agent.progress,
            "agent_updated"
        );
        Ok(AgentChange {
            agent: agent.clone(),
            stats: self.stats,
        })
    }

    /// Resets the agent to idle with no task and counts one completion.
    pub fn complete_task(&mut self, agent_id: &str) -> Result<CompletedTask, StoreError> {
        let task = self
            .agents
            .get(agent_id)
            .ok_or_else(|| StoreError::UnknownAgent(agent_id.to_string()))?
            .task
            .clone();
        let reset = AgentUpdate::new(agent_id)
            .status(AgentStatus::Idle)
            .progress(0);
        self.apply_update(&reset)?;
        self.stats.completed_tasks += 1;

        let agent = self
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| StoreError::UnknownAgent(agent_id.to_string()))?;
        agent.task = None;
        Ok(CompletedTask {
            change: AgentChange {
                agent: agent.clone(),
                stats: self.stats,
            },
            task,
        })
    }

    /// Applies server-pushed counter overrides. `active_agents` is never taken
    /// from the patch.
    pub fn apply_stats(&mut self, patch: &StatsPatch) -> FleetStats {
        if let Some(total) = patch.total_tasks {
            self.stats.total_tasks = total;
        }
        if let Some(completed) = patch.completed_tasks {
            self.stats.completed_tasks = completed;
        }
        if let Some(files) = patch.files_modified {
            self.stats.files_modified = files;
        }
        self.stats
    }
}

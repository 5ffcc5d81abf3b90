use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::types::{ActiveAssignment, Agent, AgentId, AgentStatus, Priority, SkillSet, MAX_CONCURRENT_REQUESTS};
use crate::config::AgentConfig;
use crate::error::{DistributionError, Result};
use crate::queue::{HandlingRequest, RequestId};
use crate::store::{AgentRecord, AgentStore};

/// In-memory authoritative view of agents.
///
/// Agents live in an arena indexed by identifier. Mutators are crate-private
/// and only ever called by the engine while it holds its state lock; the
/// engine persists each change after the in-memory update.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: Vec<Agent>,
    index: HashMap<AgentId, usize>,
}

/// Agent statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct AgentStats {
    pub total: usize,
    pub available: usize,
    pub busy: usize,
    pub on_break: usize,
    pub offline: usize,
}

impl AgentRegistry {
    /// Create an empty agent registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate a registry from the agent store
    pub async fn load(store: &dyn AgentStore, config: &AgentConfig) -> Result<Self> {
        info!("👥 Loading agents from store");
        let records = store.load_active_agents().await?;
        let registry = Self::from_records(records, config);
        info!("✅ Agent registry loaded with {} agents", registry.len());
        Ok(registry)
    }

    /// Validate and coerce raw store records into agents
    pub fn from_records(records: Vec<AgentRecord>, config: &AgentConfig) -> Self {
        let mut registry = Self::new();

        for record in records {
            let agent_id = record.agent_id.trim();
            if agent_id.is_empty() {
                warn!("⚠️ Skipping agent record with empty identifier");
                continue;
            }
            let agent_id = AgentId::from(agent_id);
            if registry.contains(&agent_id) {
                warn!("⚠️ Skipping duplicate agent record {}", agent_id);
                continue;
            }

            let skills = SkillSet::decode_lossy(record.skills.as_deref(), config.max_skill_len);
            let priority = Priority::clamped(record.priority, config.min_priority, config.max_priority);

            if record.max_concurrent_calls != i64::from(MAX_CONCURRENT_REQUESTS) {
                warn!(
                    "⚠️ Agent {} advertises {} concurrent calls, only {} supported",
                    agent_id, record.max_concurrent_calls, MAX_CONCURRENT_REQUESTS
                );
            }

            let mut status = record.status.parse::<AgentStatus>().unwrap_or_else(|e| {
                warn!("⚠️ Agent {}: {}, treating as offline", agent_id, e);
                AgentStatus::Offline
            });

            let current = record.current_assignment.and_then(|stored| {
                let request_id = match stored.request_id.parse::<RequestId>() {
                    Ok(id) => id,
                    Err(e) => {
                        warn!("⚠️ Agent {} has unreadable open request {:?}: {}", agent_id, stored.request_id, e);
                        return None;
                    }
                };
                Some(ActiveAssignment {
                    request: HandlingRequest {
                        id: request_id,
                        call_id: stored.call_id,
                        campaign_id: stored.campaign_id,
                        required_skills: SkillSet::decode_lossy(stored.required_skills.as_deref(), config.max_skill_len),
                        created_at: stored.started_at,
                        retry_count: 0,
                    },
                    assigned_at: stored.started_at,
                })
            });

            match (&current, status) {
                (Some(assignment), s) if s != AgentStatus::Busy => {
                    warn!(
                        "⚠️ Agent {} stored as {} but still bound to request {}, restoring as busy",
                        agent_id, s, assignment.request.id
                    );
                    status = AgentStatus::Busy;
                }
                (None, AgentStatus::Busy) => {
                    warn!("⚠️ Agent {} stored as busy without an open request, restoring as available", agent_id);
                    status = AgentStatus::Available;
                }
                _ => {}
            }

            registry.insert(Agent {
                id: agent_id,
                display_name: record.display_name,
                status,
                skills,
                priority,
                current,
            });
        }

        registry
    }

    /// Add an agent. An existing agent with the same id is replaced.
    pub fn insert(&mut self, agent: Agent) {
        match self.index.get(&agent.id) {
            Some(&slot) => self.agents[slot] = agent,
            None => {
                self.index.insert(agent.id.clone(), self.agents.len());
                self.agents.push(agent);
            }
        }
    }

    pub fn get(&self, agent_id: &AgentId) -> Option<&Agent> {
        self.index.get(agent_id).map(|&slot| &self.agents[slot])
    }

    pub fn contains(&self, agent_id: &AgentId) -> bool {
        self.index.contains_key(agent_id)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.agents.iter()
    }

    /// Available agents holding every skill in `required_skills`
    pub fn list_available(&self, required_skills: &SkillSet) -> Vec<&Agent> {
        self.agents
            .iter()
            .filter(|agent| agent.status == AgentStatus::Available && agent.current.is_none())
            .filter(|agent| required_skills.is_empty() || agent.satisfies(required_skills))
            .collect()
    }

    /// True if some agent is bound to a request for this call
    pub fn is_call_bound(&self, call_id: &str) -> bool {
        self.agents
            .iter()
            .filter_map(|agent| agent.current.as_ref())
            .any(|assignment| assignment.request.call_id == call_id)
    }

    fn slot_mut(&mut self, agent_id: &AgentId) -> Result<&mut Agent> {
        let slot = *self
            .index
            .get(agent_id)
            .ok_or_else(|| DistributionError::agent_not_found(agent_id.to_string()))?;
        Ok(&mut self.agents[slot])
    }

    /// Change an unbound agent's status. Returns the previous status.
    pub(crate) fn set_status(&mut self, agent_id: &AgentId, status: AgentStatus) -> Result<AgentStatus> {
        let agent = self.slot_mut(agent_id)?;

        if status == AgentStatus::Busy {
            return Err(DistributionError::invalid_request(
                "busy is entered by assignment, not by a status change",
            ));
        }
        if let Some(assignment) = &agent.current {
            return Err(DistributionError::invalid_request(format!(
                "agent {} is handling request {}; complete it first",
                agent_id, assignment.request.id
            )));
        }

        let previous = agent.status;
        agent.status = status;
        Ok(previous)
    }

    /// Bind an available agent to a request: status becomes busy and the
    /// current-request reference is set in the same step.
    pub(crate) fn bind(&mut self, agent_id: &AgentId, request: HandlingRequest, at: DateTime<Utc>) -> Result<()> {
        let agent = self.slot_mut(agent_id)?;

        if agent.status != AgentStatus::Available || agent.current.is_some() {
            return Err(DistributionError::internal(format!(
                "agent {} is {} and cannot take request {}",
                agent_id, agent.status, request.id
            )));
        }

        agent.status = AgentStatus::Busy;
        agent.current = Some(ActiveAssignment { request, assigned_at: at });
        Ok(())
    }

    /// Release an agent's binding and make it available again
    pub(crate) fn unbind(&mut self, agent_id: &AgentId) -> Result<ActiveAssignment> {
        let agent = self.slot_mut(agent_id)?;

        let assignment = agent
            .current
            .take()
            .ok_or_else(|| DistributionError::not_found(format!("agent {} holds no request", agent_id)))?;
        agent.status = AgentStatus::Available;
        Ok(assignment)
    }

    pub fn stats(&self) -> AgentStats {
        let mut stats = AgentStats {
            total: self.agents.len(),
            ..Default::default()
        };
        for agent in &self.agents {
            match agent.status {
                AgentStatus::Available => stats.available += 1,
                AgentStatus::Busy => stats.busy += 1,
                AgentStatus::Break => stats.on_break += 1,
                AgentStatus::Offline => stats.offline += 1,
            }
        }
        stats
    }
}

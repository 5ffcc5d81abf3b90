//! Assignment coordination
//!
//! `assign` matches a new request against the registry and either binds an
//! agent or queues the request. `complete` ends a binding and hands the
//! agent back to the queue processor.

use std::sync::atomic::Ordering;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use super::core::{CallDistributionEngine, DistributionState};
use super::types::{AssignmentResult, NewRequest};
use crate::agent::{AgentId, AgentStatus, SkillSet};
use crate::error::{DistributionError, Result};
use crate::queue::{HandlingRequest, RequestId};
use crate::routing::select_agent;
use crate::store::{AssignmentOutcome, StoreResult};

enum Placement {
    Bound(AgentId, DateTime<Utc>),
    Queued(usize),
}

impl CallDistributionEngine {
    /// Bind the best available agent to a new request, or queue it.
    ///
    /// Store failures after the bind are logged and do not undo it.
    pub async fn assign(&self, request: NewRequest) -> Result<AssignmentResult> {
        let call_id = request.call_id.trim();
        if call_id.is_empty() {
            return Err(DistributionError::invalid_request("call id cannot be empty"));
        }
        let required_skills = SkillSet::parse(&request.required_skills, self.config.agents.max_skill_len)
            .map_err(DistributionError::invalid_request)?;

        let handling = HandlingRequest::new(call_id, request.campaign_id.trim(), required_skills);
        let request_id = handling.id;

        info!(
            "📞 Assigning request {} for call {} (campaign {}, skills {})",
            request_id, handling.call_id, handling.campaign_id, handling.required_skills
        );

        let placement = {
            let mut state = self.state.lock();
            let DistributionState { registry, queue } = &mut *state;

            if queue.contains_call(&handling.call_id) || registry.is_call_bound(&handling.call_id) {
                return Err(DistributionError::invalid_request(format!(
                    "call {} already has a pending or active request",
                    handling.call_id
                )));
            }

            let required = &handling.required_skills;
            match select_agent(registry.list_available(required), required) {
                Some(agent_id) => {
                    let assigned_at = Utc::now();
                    registry.bind(&agent_id, handling.clone(), assigned_at)?;
                    Placement::Bound(agent_id, assigned_at)
                }
                None => Placement::Queued(queue.enqueue(handling.clone())),
            }
        };

        match placement {
            Placement::Bound(agent_id, assigned_at) => {
                self.counters.assignments.fetch_add(1, Ordering::Relaxed);
                info!("✅ Request {} assigned to agent {}", request_id, agent_id);

                if let Err(e) = self.persist_binding(&agent_id, &handling, assigned_at).await {
                    error!("Failed to persist assignment of request {} to agent {}: {}", request_id, agent_id, e);
                }
                self.notify_assigned(&request_id, &agent_id).await;

                Ok(AssignmentResult::assigned(request_id, agent_id))
            }
            Placement::Queued(position) => {
                info!("⏳ No eligible agent for request {}, queued at position {}", request_id, position);

                if let Err(e) = self.notifier.notify_queued(&request_id, position).await {
                    warn!("⚠️ Queued notification for request {} failed: {}", request_id, e);
                }

                Ok(AssignmentResult::queued(request_id, position))
            }
        }
    }

    /// End an agent's binding to `request_id`, make the agent available and
    /// trigger a drain.
    pub async fn complete(
        &self,
        agent_id: &AgentId,
        request_id: &RequestId,
        notes: Option<String>,
        disposition: Option<String>,
    ) -> Result<()> {
        let assigned_at = {
            let state = self.state.lock();
            let agent = state
                .registry
                .get(agent_id)
                .ok_or_else(|| DistributionError::agent_not_found(agent_id.to_string()))?;

            match agent.current_assignment() {
                Some(current) if current.request.id == *request_id => current.assigned_at,
                _ => {
                    return Err(DistributionError::not_found(format!(
                        "agent {} is not handling request {}",
                        agent_id, request_id
                    )))
                }
            }
        };

        let ended_at = Utc::now();
        let outcome = AssignmentOutcome {
            ended_at,
            duration_seconds: (ended_at - assigned_at).num_seconds().max(0),
            disposition,
            notes,
        };
        if let Err(e) = self.store.persist_assignment_end(agent_id, request_id, &outcome).await {
            error!("Failed to persist completion of request {}: {}", request_id, e);
        }

        {
            let mut state = self.state.lock();
            let still_bound = state
                .registry
                .get(agent_id)
                .and_then(|agent| agent.current_assignment())
                .is_some_and(|current| current.request.id == *request_id);
            if !still_bound {
                return Err(DistributionError::not_found(format!(
                    "request {} was already completed",
                    request_id
                )));
            }
            state.registry.unbind(agent_id)?;
        }

        self.counters.completions.fetch_add(1, Ordering::Relaxed);
        info!(
            "🏁 Agent {} completed request {} after {}s",
            agent_id, request_id, outcome.duration_seconds
        );

        if let Err(e) = self
            .store
            .persist_status(agent_id, AgentStatus::Available, "call completed")
            .await
        {
            error!("Failed to persist status of agent {}: {}", agent_id, e);
        }

        self.trigger_drain();
        Ok(())
    }

    /// Persist a fresh binding: the busy status first, then the
    /// assignment audit record.
    pub(super) async fn persist_binding(
        &self,
        agent_id: &AgentId,
        request: &HandlingRequest,
        assigned_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let reason = format!("assigned request {}", request.id);
        self.store.persist_status(agent_id, AgentStatus::Busy, &reason).await?;
        self.store.persist_assignment_start(agent_id, request, assigned_at).await
    }

    pub(super) async fn notify_assigned(&self, request_id: &RequestId, agent_id: &AgentId) {
        if let Err(e) = self.notifier.notify_assigned(request_id, agent_id).await {
            warn!("⚠️ Assignment notification for request {} failed: {}", request_id, e);
        }
    }
}

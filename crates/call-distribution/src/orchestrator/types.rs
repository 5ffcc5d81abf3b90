//! Types exposed by the distribution engine

use serde::{Deserialize, Serialize};

use crate::agent::{AgentId, AgentStats};
use crate::queue::{QueueStats, RequestId};

/// Caller-supplied description of a call that needs an agent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewRequest {
    pub call_id: String,
    #[serde(default)]
    pub campaign_id: String,
    #[serde(default)]
    pub required_skills: Vec<String>,
}

impl NewRequest {
    pub fn new(call_id: impl Into<String>, campaign_id: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            campaign_id: campaign_id.into(),
            required_skills: Vec::new(),
        }
    }

    pub fn with_skills<I, S>(mut self, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_skills = skills.into_iter().map(Into::into).collect();
        self
    }
}

/// Outcome of [`assign`](super::CallDistributionEngine::assign)
///
/// `success` with an agent id when bound immediately; otherwise the request
/// was queued and `queue_position` holds its 1-based place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentResult {
    pub success: bool,
    pub request_id: RequestId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<usize>,
}

impl AssignmentResult {
    pub(crate) fn assigned(request_id: RequestId, agent_id: AgentId) -> Self {
        Self {
            success: true,
            request_id,
            agent_id: Some(agent_id),
            queue_position: None,
        }
    }

    pub(crate) fn queued(request_id: RequestId, queue_position: usize) -> Self {
        Self {
            success: false,
            request_id,
            agent_id: None,
            queue_position: Some(queue_position),
        }
    }
}

/// Result of one drain pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Another pass was already running
    Skipped,
    /// The engine is shut down
    Stopped,
    /// The pass ran until the queue emptied or its head found no agent
    Completed { assigned: usize, remaining: usize },
    /// A store failure aborted the pass; the head entry was put back
    Failed { assigned: usize },
}

/// Engine statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineStats {
    pub agents: AgentStats,
    pub queue: QueueStats,
    pub assignments: u64,
    pub completions: u64,
    pub drain_passes: u64,
    pub drain_failures: u64,
}

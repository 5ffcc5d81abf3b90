use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::SkillSet;

/// Identifier of a handling request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        RequestId(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RequestId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(RequestId)
    }
}

/// A call that needs a human agent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandlingRequest {
    pub id: RequestId,
    pub call_id: String,
    pub campaign_id: String,
    pub required_skills: SkillSet,
    pub created_at: DateTime<Utc>,
    /// Failed drain attempts on this request
    pub retry_count: u32,
}

impl HandlingRequest {
    pub fn new(call_id: impl Into<String>, campaign_id: impl Into<String>, required_skills: SkillSet) -> Self {
        Self {
            id: RequestId::new(),
            call_id: call_id.into(),
            campaign_id: campaign_id.into(),
            required_skills,
            created_at: Utc::now(),
            retry_count: 0,
        }
    }
}

/// Wait queue membership of a request
#[derive(Debug, Clone, Serialize)]
pub struct QueueEntry {
    pub request: HandlingRequest,
    /// Monotonic arrival order; never reassigned
    pub sequence: u64,
    pub enqueued_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) enqueued_instant: tokio::time::Instant,
}

impl QueueEntry {
    /// Time spent waiting so far
    pub fn waited(&self) -> std::time::Duration {
        self.enqueued_instant.elapsed()
    }
}

/// Queue statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueStats {
    pub depth: usize,
    pub oldest_wait_seconds: u64,
    pub total_enqueued: u64,
}

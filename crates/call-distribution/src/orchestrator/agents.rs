//! Agent status handling

use tracing::{error, info};

use super::core::CallDistributionEngine;
use crate::agent::{AgentId, AgentStatus};
use crate::error::Result;

impl CallDistributionEngine {
    /// Change an agent's status (available, break, offline).
    ///
    /// The registry is updated first, then the change is persisted with its
    /// reason. Becoming available triggers a drain without waiting for it.
    /// Busy cannot be set directly, and a bound agent's status only changes
    /// through [`complete`](Self::complete).
    pub async fn set_agent_status(&self, agent_id: &AgentId, status: AgentStatus, reason: &str) -> Result<()> {
        info!("🔄 Updating agent {} status to {} ({})", agent_id, status, reason);

        let previous = self.state.lock().registry.set_status(agent_id, status)?;

        if let Err(e) = self.store.persist_status(agent_id, status, reason).await {
            error!("Failed to persist status of agent {}: {}", agent_id, e);
        }

        info!("✅ Agent {} status updated from {} to {}", agent_id, previous, status);

        if status == AgentStatus::Available {
            self.trigger_drain();
        }
        Ok(())
    }
}

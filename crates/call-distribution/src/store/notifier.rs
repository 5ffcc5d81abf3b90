//! Broadcast-channel notifier
//!
//! Every notification becomes a [`DistributionEvent`] on a
//! `tokio::sync::broadcast` channel. UI bridges (websocket, SSE, message
//! bus) subscribe and forward; a send with no subscribers is not a failure.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use super::Notifier;
use crate::agent::AgentId;
use crate::error::NotifyError;
use crate::queue::RequestId;

/// Notification emitted by the engine
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DistributionEvent {
    RequestQueued {
        request_id: RequestId,
        queue_position: usize,
        at: DateTime<Utc>,
    },
    AgentAssigned {
        request_id: RequestId,
        agent_id: AgentId,
        at: DateTime<Utc>,
    },
}

/// [`Notifier`] publishing onto a broadcast channel
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<DistributionEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<DistributionEvent> {
        self.sender.subscribe()
    }

    fn publish(&self, event: DistributionEvent) {
        // Err only means nobody is listening right now.
        if self.sender.send(event).is_err() {
            debug!("No notification subscribers");
        }
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Notifier for BroadcastNotifier {
    async fn notify_queued(&self, request_id: &RequestId, queue_position: usize) -> Result<(), NotifyError> {
        self.publish(DistributionEvent::RequestQueued {
            request_id: *request_id,
            queue_position,
            at: Utc::now(),
        });
        Ok(())
    }

    async fn notify_assigned(&self, request_id: &RequestId, agent_id: &AgentId) -> Result<(), NotifyError> {
        self.publish(DistributionEvent::AgentAssigned {
            request_id: *request_id,
            agent_id: agent_id.clone(),
            at: Utc::now(),
        });
        Ok(())
    }
}

//! Queue processor
//!
//! Drains the wait queue head first. Only one pass runs at a time; a pass
//! stops at the first head entry with no eligible agent and never looks
//! past it.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::core::{CallDistributionEngine, DistributionState};
use super::types::DrainOutcome;
use crate::agent::{AgentId, AgentStatus};
use crate::queue::QueueEntry;
use crate::routing::select_agent;

/// Holds the single-flight flag for the lifetime of a pass
struct DrainGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> DrainGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl CallDistributionEngine {
    /// Run one drain pass.
    ///
    /// A call made while another pass is running returns
    /// [`DrainOutcome::Skipped`] immediately and leaves a request behind;
    /// the running pass sees it after releasing the guard and goes again.
    /// A pass that leaves requests queued schedules a follow-up after the
    /// retry interval; a pass aborted by a store failure schedules one
    /// after the error backoff.
    pub async fn drain(&self) -> DrainOutcome {
        self.drain_requested.store(true, Ordering::SeqCst);
        let mut last = None;

        loop {
            if self.is_shut_down() {
                return DrainOutcome::Stopped;
            }

            let Some(guard) = DrainGuard::acquire(&self.draining) else {
                debug!("Drain already in progress, skipping");
                return last.unwrap_or(DrainOutcome::Skipped);
            };
            self.drain_requested.store(false, Ordering::SeqCst);

            let outcome = self.drain_pass().await;
            drop(guard);

            // A failed pass already has its backoff retry scheduled
            if !matches!(outcome, DrainOutcome::Completed { .. }) {
                return outcome;
            }
            if !self.drain_requested.swap(false, Ordering::SeqCst) {
                return outcome;
            }
            debug!("Drain requested during pass, running again");
            last = Some(outcome);
        }
    }

    async fn drain_pass(&self) -> DrainOutcome {
        self.counters.drain_passes.fetch_add(1, Ordering::Relaxed);
        let mut assigned = 0;

        loop {
            if self.is_shut_down() {
                info!("🛑 Drain stopped by shutdown after {} assignments", assigned);
                return DrainOutcome::Stopped;
            }

            // Claim the head entry and its agent in one step
            let (agent_id, mut entry, assigned_at) = {
                let mut state = self.state.lock();
                let DistributionState { registry, queue } = &mut *state;

                let Some(head) = queue.peek_front() else {
                    break;
                };
                let required = &head.request.required_skills;
                let Some(agent_id) = select_agent(registry.list_available(required), required) else {
                    debug!(
                        "Head request {} (skills {}) has no eligible agent, {} waiting",
                        head.request.id,
                        required,
                        queue.len()
                    );
                    break;
                };

                let Some(entry) = queue.remove_front() else {
                    break;
                };
                let assigned_at = Utc::now();
                if let Err(e) = registry.bind(&agent_id, entry.request.clone(), assigned_at) {
                    error!("Failed to bind agent {} to request {}: {}", agent_id, entry.request.id, e);
                    queue.return_to_front(entry);
                    break;
                }
                (agent_id, entry, assigned_at)
            };

            match self.persist_binding(&agent_id, &entry.request, assigned_at).await {
                Ok(()) => {
                    self.counters.assignments.fetch_add(1, Ordering::Relaxed);
                    info!(
                        "✅ Assigned queued request {} (call {}) to agent {} after waiting {:?}",
                        entry.request.id,
                        entry.request.call_id,
                        agent_id,
                        entry.waited()
                    );
                    self.notify_assigned(&entry.request.id, &agent_id).await;
                    assigned += 1;
                }
                Err(e) => {
                    error!(
                        "❌ Failed to persist assignment of request {} to agent {}: {}",
                        entry.request.id, agent_id, e
                    );
                    entry.request.retry_count += 1;
                    self.release_failed_claim(&agent_id, entry).await;
                    self.counters.drain_failures.fetch_add(1, Ordering::Relaxed);
                    self.schedule_drain(self.config.queue.error_backoff());
                    return DrainOutcome::Failed { assigned };
                }
            }
        }

        let remaining = self.state.lock().queue.len();
        if remaining > 0 {
            self.schedule_drain(self.config.queue.retry_interval());
        }

        if assigned > 0 || remaining > 0 {
            info!("📊 Drain pass assigned {} requests, {} still queued", assigned, remaining);
        }
        DrainOutcome::Completed { assigned, remaining }
    }

    /// Undo an unpublished claim: free the agent and put the entry back at
    /// the head of the queue.
    async fn release_failed_claim(&self, agent_id: &AgentId, entry: QueueEntry) {
        let request_id = entry.request.id;
        let retry_count = entry.request.retry_count;

        let released = {
            let mut state = self.state.lock();
            let still_bound = state
                .registry
                .get(agent_id)
                .and_then(|agent| agent.current_assignment())
                .is_some_and(|current| current.request.id == request_id);
            let released = still_bound && state.registry.unbind(agent_id).is_ok();
            state.queue.return_to_front(entry);
            released
        };

        warn!(
            "↩️ Request {} returned to queue head (retry {}), agent {} released",
            request_id, retry_count, agent_id
        );

        if released {
            if let Err(e) = self
                .store
                .persist_status(agent_id, AgentStatus::Available, "assignment not persisted")
                .await
            {
                error!("Failed to persist release of agent {}: {}", agent_id, e);
            }
        }
    }
}

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::types::EngineStats;
use crate::agent::{Agent, AgentId, AgentRegistry};
use crate::config::DistributionConfig;
use crate::error::Result;
use crate::queue::{QueueEntry, RequestId, WaitQueue};
use crate::store::{AgentStore, Notifier};

/// Registry and queue, mutated together under one lock.
///
/// The lock is never held across an await.
#[derive(Debug, Default)]
pub(super) struct DistributionState {
    pub(super) registry: AgentRegistry,
    pub(super) queue: WaitQueue,
}

/// Follow-up drain waiting on its timer
#[derive(Debug)]
pub(super) struct PendingRetry {
    generation: u64,
    deadline: Instant,
    handle: JoinHandle<()>,
}

#[derive(Debug, Default)]
pub(super) struct EngineCounters {
    pub(super) assignments: AtomicU64,
    pub(super) completions: AtomicU64,
    pub(super) drain_passes: AtomicU64,
    pub(super) drain_failures: AtomicU64,
}

/// Call distribution engine
///
/// Matches handling requests to agents, holds unmatched requests in a FIFO
/// wait queue and drains that queue whenever an agent frees up. Cloning is
/// cheap; every clone drives the same engine instance.
#[derive(Clone)]
pub struct CallDistributionEngine {
    pub(super) config: Arc<DistributionConfig>,
    pub(super) store: Arc<dyn AgentStore>,
    pub(super) notifier: Arc<dyn Notifier>,
    pub(super) state: Arc<Mutex<DistributionState>>,
    pub(super) counters: Arc<EngineCounters>,

    /// Single-flight flag for drain passes
    pub(super) draining: Arc<AtomicBool>,
    /// Set by every drain call; the running pass rechecks it on exit
    pub(super) drain_requested: Arc<AtomicBool>,

    /// Pending follow-up drain
    pub(super) retry_timer: Arc<Mutex<Option<PendingRetry>>>,
    retry_generation: Arc<AtomicU64>,
    pub(super) shut_down: Arc<AtomicBool>,
}

impl CallDistributionEngine {
    /// Create an engine with an empty registry. Call [`start`](Self::start)
    /// to load agents from the store.
    pub fn new(config: DistributionConfig, store: Arc<dyn AgentStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            config: Arc::new(config),
            store,
            notifier,
            state: Arc::new(Mutex::new(DistributionState::default())),
            counters: Arc::new(EngineCounters::default()),
            draining: Arc::new(AtomicBool::new(false)),
            drain_requested: Arc::new(AtomicBool::new(false)),
            retry_timer: Arc::new(Mutex::new(None)),
            retry_generation: Arc::new(AtomicU64::new(0)),
            shut_down: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Load the agent registry and run an initial drain
    pub async fn start(&self) -> Result<()> {
        info!("🚀 Starting call distribution engine");

        let registry = AgentRegistry::load(self.store.as_ref(), &self.config.agents).await?;
        let (agents, queued) = {
            let mut state = self.state.lock();
            state.registry = registry;
            (state.registry.len(), state.queue.len())
        };

        self.shut_down.store(false, Ordering::SeqCst);
        info!("✅ Call distribution engine started ({} agents, {} queued requests)", agents, queued);

        self.trigger_drain();
        Ok(())
    }

    /// Stop background work. Queued requests stay where they are.
    pub fn shutdown(&self) {
        info!("🛑 Shutting down call distribution engine");
        self.shut_down.store(true, Ordering::SeqCst);

        if let Some(pending) = self.retry_timer.lock().take() {
            pending.handle.abort();
            debug!("Cancelled pending drain retry");
        }

        let queued = self.state.lock().queue.len();
        if queued > 0 {
            warn!("⚠️ Shutting down with {} requests still queued", queued);
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &DistributionConfig {
        &self.config
    }

    /// Snapshot of one agent
    pub fn agent(&self, agent_id: &AgentId) -> Option<Agent> {
        self.state.lock().registry.get(agent_id).cloned()
    }

    /// Snapshot of every agent, ordered by id
    pub fn list_agents(&self) -> Vec<Agent> {
        let mut agents: Vec<Agent> = self.state.lock().registry.iter().cloned().collect();
        agents.sort_by(|a, b| a.id().cmp(b.id()));
        agents
    }

    /// Queued requests, head first
    pub fn queue_snapshot(&self) -> Vec<QueueEntry> {
        self.state.lock().queue.snapshot()
    }

    /// 1-based position of a queued request
    pub fn queue_position(&self, request_id: &RequestId) -> Option<usize> {
        self.state.lock().queue.position_of(request_id)
    }

    pub fn stats(&self) -> EngineStats {
        let (agents, queue) = {
            let state = self.state.lock();
            (state.registry.stats(), state.queue.stats())
        };

        EngineStats {
            agents,
            queue,
            assignments: self.counters.assignments.load(Ordering::Relaxed),
            completions: self.counters.completions.load(Ordering::Relaxed),
            drain_passes: self.counters.drain_passes.load(Ordering::Relaxed),
            drain_failures: self.counters.drain_failures.load(Ordering::Relaxed),
        }
    }

    /// Run a drain pass in the background without waiting for it
    pub(super) fn trigger_drain(&self) {
        if self.is_shut_down() {
            return;
        }
        let engine = self.clone();
        tokio::spawn(async move {
            engine.drain().await;
        });
    }

    /// Schedule a drain pass after `delay`.
    ///
    /// At most one retry is pending at a time and it keeps the later of the
    /// two deadlines: a retry interval request never shortens a pending
    /// error backoff, and an error backoff replaces a sooner retry.
    pub(super) fn schedule_drain(&self, delay: Duration) {
        if self.is_shut_down() {
            return;
        }

        let deadline = Instant::now() + delay;
        let mut timer = self.retry_timer.lock();
        if let Some(pending) = timer.as_ref().filter(|pending| !pending.handle.is_finished()) {
            if pending.deadline >= deadline {
                debug!("Drain retry already pending");
                return;
            }
            pending.handle.abort();
            debug!("Pushing pending drain retry back to {:?} from now", delay);
        }

        debug!("⏰ Scheduling drain retry in {:?}", delay);
        let generation = self.retry_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let engine = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            // Free the slot so this pass can schedule its own follow-up
            {
                let mut timer = engine.retry_timer.lock();
                if timer.as_ref().is_some_and(|pending| pending.generation == generation) {
                    timer.take();
                }
            }
            engine.drain().await;
        });
        *timer = Some(PendingRetry {
            generation,
            deadline,
            handle,
        });
    }

    /// True if a follow-up drain is waiting on its timer
    pub fn has_pending_retry(&self) -> bool {
        self.retry_timer
            .lock()
            .as_ref()
            .is_some_and(|pending| !pending.handle.is_finished())
    }
}

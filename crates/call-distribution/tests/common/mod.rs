//! Shared fixtures for integration tests: an in-memory agent store with
//! failure injection and a notifier that records what it was told.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use rvoip_call_distribution::error::{NotifyError, StoreError};
use rvoip_call_distribution::prelude::*;
use rvoip_call_distribution::store::StoreResult;

/// Store double keeping everything in memory
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<AgentRecord>>,
    pub statuses: Mutex<Vec<(AgentId, AgentStatus, String)>>,
    pub starts: Mutex<Vec<(AgentId, RequestId)>>,
    pub ends: Mutex<HashMap<RequestId, AssignmentOutcome>>,

    fail_load: AtomicBool,
    fail_status: AtomicUsize,
    fail_start: AtomicUsize,
    status_delay_ms: AtomicUsize,
}

impl MemoryStore {
    pub fn with_agents(records: Vec<AgentRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Default::default()
        }
    }

    pub fn fail_load(&self) {
        self.fail_load.store(true, Ordering::SeqCst);
    }

    /// Fail the next `n` status writes
    pub fn fail_next_status(&self, n: usize) {
        self.fail_status.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` assignment-start writes
    pub fn fail_next_start(&self, n: usize) {
        self.fail_start.store(n, Ordering::SeqCst);
    }

    /// Delay every status write
    pub fn slow_status_writes(&self, delay: Duration) {
        self.status_delay_ms.store(delay.as_millis() as usize, Ordering::SeqCst);
    }

    pub fn started_for(&self, agent_id: &str) -> Vec<RequestId> {
        self.starts
            .lock()
            .iter()
            .filter(|(agent, _)| agent.0 == agent_id)
            .map(|(_, request)| *request)
            .collect()
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl AgentStore for MemoryStore {
    async fn load_active_agents(&self) -> StoreResult<Vec<AgentRecord>> {
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("store offline".to_string()));
        }
        Ok(self.records.lock().clone())
    }

    async fn persist_status(&self, agent_id: &AgentId, status: AgentStatus, reason: &str) -> StoreResult<()> {
        let delay = self.status_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        if Self::take_failure(&self.fail_status) {
            return Err(StoreError::Connection("status write failed".to_string()));
        }
        self.statuses.lock().push((agent_id.clone(), status, reason.to_string()));
        Ok(())
    }

    async fn persist_assignment_start(
        &self,
        agent_id: &AgentId,
        request: &HandlingRequest,
        _started_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        if Self::take_failure(&self.fail_start) {
            return Err(StoreError::Query("assignment write failed".to_string()));
        }
        self.starts.lock().push((agent_id.clone(), request.id));
        Ok(())
    }

    async fn persist_assignment_end(
        &self,
        _agent_id: &AgentId,
        request_id: &RequestId,
        outcome: &AssignmentOutcome,
    ) -> StoreResult<()> {
        self.ends.lock().insert(*request_id, outcome.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Queued(RequestId, usize),
    Assigned(RequestId, AgentId),
}

/// Notifier double recording every call
#[derive(Default)]
pub struct RecordingNotifier {
    pub notices: Mutex<Vec<Notice>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn fail_always(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn assigned(&self) -> Vec<(RequestId, AgentId)> {
        self.notices
            .lock()
            .iter()
            .filter_map(|notice| match notice {
                Notice::Assigned(request, agent) => Some((*request, agent.clone())),
                Notice::Queued(..) => None,
            })
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_queued(&self, request_id: &RequestId, queue_position: usize) -> std::result::Result<(), NotifyError> {
        self.notices.lock().push(Notice::Queued(*request_id, queue_position));
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError("ui bridge down".to_string()));
        }
        Ok(())
    }

    async fn notify_assigned(&self, request_id: &RequestId, agent_id: &AgentId) -> std::result::Result<(), NotifyError> {
        self.notices.lock().push(Notice::Assigned(*request_id, agent_id.clone()));
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError("ui bridge down".to_string()));
        }
        Ok(())
    }
}

pub fn agent(id: &str, status: AgentStatus, skills: &[&str], priority: i64) -> AgentRecord {
    AgentRecord {
        agent_id: id.to_string(),
        display_name: id.to_string(),
        status: status.to_string(),
        skills: Some(serde_json::to_string(skills).expect("encode skills")),
        priority,
        max_concurrent_calls: 1,
        current_assignment: None,
    }
}

/// Short timers so retries happen within a test's patience
pub fn test_config() -> DistributionConfig {
    let mut config = DistributionConfig::default();
    config.queue.retry_interval_ms = 50;
    config.queue.error_backoff_ms = 150;
    config
}

pub struct Harness {
    pub engine: CallDistributionEngine,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
}

static STALL: Mutex<Option<(&'static str, Duration)>> = parking_lot::const_mutex(None);
static STALLED: AtomicBool = AtomicBool::new(false);

/// Block the thread that next logs a message containing `pattern`, once.
///
/// Lets a test act while the logging task sits at a known point. Needs a
/// multi-threaded runtime.
pub fn stall_next_log(pattern: &'static str, delay: Duration) {
    STALLED.store(false, Ordering::SeqCst);
    *STALL.lock() = Some((pattern, delay));
}

pub fn stalled() -> bool {
    STALLED.load(Ordering::SeqCst)
}

#[derive(Default)]
struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{:?}", value);
        }
    }
}

struct StallLayer;

impl<S: Subscriber> Layer<S> for StallLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let Some((pattern, delay)) = *STALL.lock() else {
            return;
        };
        let mut message = MessageVisitor::default();
        event.record(&mut message);
        if !message.0.contains(pattern) || STALL.lock().take().is_none() {
            return;
        }
        STALLED.store(true, Ordering::SeqCst);
        std::thread::sleep(delay);
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new("rvoip_call_distribution=debug"))
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .with(StallLayer)
        .try_init();
}

/// Build an engine over fresh doubles without starting it
pub fn build_engine(config: DistributionConfig, records: Vec<AgentRecord>) -> Harness {
    init_tracing();

    let store = Arc::new(MemoryStore::with_agents(records));
    let notifier = Arc::new(RecordingNotifier::default());
    let engine = CallDistributionEngine::new(config, store.clone(), notifier.clone());
    Harness { engine, store, notifier }
}

pub async fn start_engine_with(config: DistributionConfig, records: Vec<AgentRecord>) -> Harness {
    let h = build_engine(config, records);
    h.engine.start().await.expect("engine start");
    wait_for_pass(&h.engine).await;
    h
}

pub async fn start_engine(records: Vec<AgentRecord>) -> Harness {
    start_engine_with(test_config(), records).await
}

pub fn request(call_id: &str, skills: &[&str]) -> NewRequest {
    NewRequest::new(call_id, "campaign-1").with_skills(skills.iter().copied())
}

/// Run a drain pass, waiting out any pass already in flight
pub async fn wait_for_pass(engine: &CallDistributionEngine) -> DrainOutcome {
    for _ in 0..200 {
        match engine.drain().await {
            DrainOutcome::Skipped => tokio::time::sleep(Duration::from_millis(5)).await,
            outcome => return outcome,
        }
    }
    panic!("drain never became free");
}

/// Poll `condition` until it holds or two seconds pass
pub async fn wait_until<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

pub fn status_of(engine: &CallDistributionEngine, agent_id: &str) -> AgentStatus {
    engine.agent(&AgentId::from(agent_id)).expect("agent exists").status()
}

pub fn bound_request(engine: &CallDistributionEngine, agent_id: &str) -> Option<RequestId> {
    engine
        .agent(&AgentId::from(agent_id))
        .and_then(|agent| agent.current_assignment().map(|current| current.request.id))
}

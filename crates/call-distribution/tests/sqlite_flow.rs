//! End-to-end tests of the engine on the SQLite agent store

mod common;

use std::sync::Arc;

use serial_test::serial;

use common::{init_tracing, test_config, wait_until};
use rvoip_call_distribution::prelude::*;
use rvoip_call_distribution::store::sqlite::AgentProfile;

async fn seeded_store() -> SqliteAgentStore {
    let store = SqliteAgentStore::new_in_memory().await.expect("in-memory store");
    for (id, skills, priority) in [("agent-a", vec!["sales"], 5), ("agent-b", vec!["sales", "vip"], 8)] {
        store
            .upsert_agent(&AgentProfile {
                agent_id: AgentId::from(id),
                display_name: id.to_uppercase(),
                skills: SkillSet::parse(skills, 64).unwrap(),
                priority: Priority::new(priority),
                status: AgentStatus::Offline,
            })
            .await
            .expect("seed agent");
    }
    store
}

async fn engine_on(store: &SqliteAgentStore) -> (CallDistributionEngine, BroadcastNotifier) {
    init_tracing();
    let notifier = BroadcastNotifier::default();
    let engine = CallDistributionEngine::new(test_config(), Arc::new(store.clone()), Arc::new(notifier.clone()));
    engine.start().await.expect("engine start");
    (engine, notifier)
}

#[tokio::test]
#[serial]
async fn test_full_lifecycle_is_audited() {
    let store = seeded_store().await;
    let (engine, notifier) = engine_on(&store).await;
    let mut events = notifier.subscribe();

    let queued = engine
        .assign(NewRequest::new("call-1", "spring").with_skills(["sales"]))
        .await
        .unwrap();
    assert_eq!(queued.queue_position, Some(1));
    match events.recv().await.unwrap() {
        DistributionEvent::RequestQueued { request_id, queue_position, .. } => {
            assert_eq!(request_id, queued.request_id);
            assert_eq!(queue_position, 1);
        }
        other => panic!("unexpected event {:?}", other),
    }

    let agent_b = AgentId::from("agent-b");
    engine
        .set_agent_status(&agent_b, AgentStatus::Available, "logged in")
        .await
        .unwrap();

    match events.recv().await.unwrap() {
        DistributionEvent::AgentAssigned { request_id, agent_id, .. } => {
            assert_eq!(request_id, queued.request_id);
            assert_eq!(agent_id, agent_b);
        }
        other => panic!("unexpected event {:?}", other),
    }

    let audit = store.assignment(&queued.request_id).await.unwrap().expect("assignment row");
    assert_eq!(audit.agent_id, "agent-b");
    assert_eq!(audit.call_id, "call-1");
    assert!(audit.ended_at.is_none());

    engine
        .complete(&agent_b, &queued.request_id, Some("upsold".into()), Some("sale".into()))
        .await
        .unwrap();

    let audit = store.assignment(&queued.request_id).await.unwrap().unwrap();
    assert!(audit.ended_at.is_some());
    assert_eq!(audit.disposition.as_deref(), Some("sale"));
    assert_eq!(audit.notes.as_deref(), Some("upsold"));

    let history: Vec<(String, String)> = store
        .status_history(&agent_b)
        .await
        .unwrap()
        .into_iter()
        .map(|change| (change.status, change.reason))
        .collect();
    assert_eq!(
        history,
        vec![
            ("available".to_string(), "logged in".to_string()),
            ("busy".to_string(), format!("assigned request {}", queued.request_id)),
            ("available".to_string(), "call completed".to_string()),
        ]
    );
}

#[tokio::test]
#[serial]
async fn test_restart_picks_up_persisted_state() {
    let store = seeded_store().await;
    let (engine, _notifier) = engine_on(&store).await;

    engine
        .set_agent_status(&AgentId::from("agent-a"), AgentStatus::Available, "ready")
        .await
        .unwrap();
    let result = engine
        .assign(NewRequest::new("call-7", "spring").with_skills(["sales"]))
        .await
        .unwrap();
    assert_eq!(result.agent_id, Some(AgentId::from("agent-a")));
    engine.shutdown();

    // A fresh engine on the same database sees the binding
    let (restarted, _notifier) = engine_on(&store).await;
    let agent = restarted.agent(&AgentId::from("agent-a")).unwrap();
    assert_eq!(agent.status(), AgentStatus::Busy);
    assert_eq!(
        agent.current_assignment().map(|current| current.request.id),
        Some(result.request_id)
    );
    assert_eq!(agent.current_assignment().unwrap().request.call_id, "call-7");
    assert_eq!(restarted.agent(&AgentId::from("agent-b")).unwrap().status(), AgentStatus::Offline);

    restarted
        .complete(&AgentId::from("agent-a"), &result.request_id, None, None)
        .await
        .unwrap();
    assert!(wait_until(|| restarted.agent(&AgentId::from("agent-a")).unwrap().status() == AgentStatus::Available).await);
}

//! Performance benchmarks for agent matching and the assignment cycle

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rvoip_call_distribution::prelude::*;
use rvoip_call_distribution::store::sqlite::AgentProfile;
use tokio::runtime::Runtime;

const SKILLS: [&str; 4] = ["sales", "billing", "support", "vip"];

fn agents(count: usize) -> Vec<Agent> {
    (0..count)
        .map(|i| {
            let skills = SkillSet::parse(SKILLS.iter().copied().skip(i % 3), 64).unwrap();
            Agent::new(
                AgentId::from(format!("agent-{:05}", i)),
                format!("Agent {}", i),
                skills,
                Priority::new((i % 10) as i64),
            )
        })
        .collect()
}

/// Benchmark agent selection over growing candidate sets
fn benchmark_select_agent(c: &mut Criterion) {
    let required = SkillSet::parse(["support", "vip"], 64).unwrap();
    let mut group = c.benchmark_group("select_agent");

    for count in [10, 100, 1_000] {
        let candidates = agents(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &candidates, |b, candidates| {
            b.iter(|| black_box(select_agent(candidates, black_box(&required))));
        });
    }
    group.finish();
}

/// Benchmark a full assign/complete round trip on the SQLite store
fn benchmark_assign_complete(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let engine = rt.block_on(async {
        let store = SqliteAgentStore::new_in_memory().await.unwrap();
        store
            .upsert_agent(&AgentProfile {
                agent_id: AgentId::from("agent-1"),
                display_name: "Agent 1".to_string(),
                skills: SkillSet::parse(["sales"], 64).unwrap(),
                priority: Priority::new(1),
                status: AgentStatus::Available,
            })
            .await
            .unwrap();

        let engine = CallDistributionEngine::new(
            DistributionConfig::default(),
            Arc::new(store),
            Arc::new(BroadcastNotifier::default()),
        );
        engine.start().await.unwrap();
        engine
    });
    let agent_id = AgentId::from("agent-1");

    c.bench_function("assign_complete_cycle", |b| {
        b.to_async(&rt).iter(|| async {
            let result = engine
                .assign(NewRequest::new(uuid_call_id(), "bench").with_skills(["sales"]))
                .await
                .unwrap();
            engine.complete(&agent_id, &result.request_id, None, None).await.unwrap();
            black_box(result);
        });
    });

    engine.shutdown();
}

fn uuid_call_id() -> String {
    format!("call-{}", RequestId::new())
}

criterion_group!(benches, benchmark_select_agent, benchmark_assign_complete);
criterion_main!(benches);

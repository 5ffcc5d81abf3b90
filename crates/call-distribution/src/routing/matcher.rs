use std::cmp::Ordering;

use tracing::debug;

use crate::agent::{Agent, AgentId, SkillSet};

/// Pick the best agent for a request, or `None` if nobody qualifies.
///
/// Candidates lacking any required skill are discarded. The rest are ordered
/// by priority weight (higher first), ties broken by agent id ascending, and
/// the first one wins. Agent status is not inspected here; callers pass the
/// registry's available set.
pub fn select_agent<'a, I>(candidates: I, required_skills: &SkillSet) -> Option<AgentId>
where
    I: IntoIterator<Item = &'a Agent>,
{
    let mut suitable: Vec<&Agent> = candidates
        .into_iter()
        .filter(|agent| agent.satisfies(required_skills))
        .collect();

    if suitable.is_empty() {
        debug!("❌ No suitable agents found for skills {}", required_skills);
        return None;
    }

    suitable.sort_by(|a, b| rank(a, b));

    let best = suitable[0];
    debug!(
        "🎯 Selected agent {} (priority {}) for skills {} out of {} candidates",
        best.id(),
        best.priority(),
        required_skills,
        suitable.len()
    );
    Some(best.id().clone())
}

fn rank(a: &Agent, b: &Agent) -> Ordering {
    b.priority()
        .cmp(&a.priority())
        .then_with(|| a.id().cmp(b.id()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Priority;

    fn agent(id: &str, priority: i64, skills: &[&str]) -> Agent {
        Agent::new(
            AgentId::from(id),
            id,
            SkillSet::parse(skills.iter().copied(), 64).unwrap(),
            Priority::new(priority),
        )
    }

    fn skills(tags: &[&str]) -> SkillSet {
        SkillSet::parse(tags.iter().copied(), 64).unwrap()
    }

    #[test]
    fn test_higher_priority_wins() {
        let agents = vec![agent("a", 5, &["sales"]), agent("b", 8, &["sales", "vip"])];
        assert_eq!(select_agent(&agents, &skills(&["sales"])), Some(AgentId::from("b")));
    }

    #[test]
    fn test_equal_priority_breaks_tie_on_id() {
        let agents = vec![agent("carol", 3, &[]), agent("alice", 3, &[]), agent("bob", 3, &[])];
        assert_eq!(select_agent(&agents, &SkillSet::new()), Some(AgentId::from("alice")));

        // Input order does not matter
        let reversed: Vec<_> = agents.iter().rev().collect();
        assert_eq!(select_agent(reversed, &SkillSet::new()), Some(AgentId::from("alice")));
    }

    #[test]
    fn test_missing_skill_excludes_candidate() {
        let agents = vec![agent("a", 9, &["sales"]), agent("b", 1, &["sales", "billing"])];
        assert_eq!(select_agent(&agents, &skills(&["billing"])), Some(AgentId::from("b")));
        assert_eq!(select_agent(&agents, &skills(&["vip"])), None);
    }

    #[test]
    fn test_no_candidates() {
        let agents: Vec<Agent> = Vec::new();
        assert_eq!(select_agent(&agents, &SkillSet::new()), None);
    }
}

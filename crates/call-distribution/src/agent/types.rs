//! Core types for agent management

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::queue::HandlingRequest;

/// Concurrent requests an agent may hold. Multi-capacity agents are not
/// supported; store records advertising more are coerced down to this.
pub const MAX_CONCURRENT_REQUESTS: u32 = 1;

/// Agent identifier type for strongly-typed agent references
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        AgentId(s)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        AgentId(s.to_string())
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for AgentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Agent status enumeration
///
/// `Busy` is only ever entered through a binding; an agent is busy exactly
/// when it holds an active assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Agent is available for calls
    Available,

    /// Agent is bound to a handling request
    Busy,

    /// Agent is on a break
    Break,

    /// Agent is offline
    Offline,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Available => "available",
            AgentStatus::Busy => "busy",
            AgentStatus::Break => "break",
            AgentStatus::Offline => "offline",
        }
    }
}

impl std::str::FromStr for AgentStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "available" => Ok(AgentStatus::Available),
            "busy" => Ok(AgentStatus::Busy),
            "break" => Ok(AgentStatus::Break),
            "offline" => Ok(AgentStatus::Offline),
            _ => Err(format!("Unknown agent status: {}", s)),
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated skill tag: lowercase ASCII alphanumerics, `_` and `-`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SkillTag(String);

impl SkillTag {
    /// Default maximum tag length
    pub const DEFAULT_MAX_LEN: usize = 64;

    /// Validate and normalize a raw tag
    pub fn parse(raw: &str, max_len: usize) -> std::result::Result<Self, String> {
        let tag = raw.trim().to_ascii_lowercase();
        if tag.is_empty() {
            return Err("skill tag cannot be empty".to_string());
        }
        if tag.len() > max_len {
            return Err(format!("skill tag '{}' exceeds {} characters", tag, max_len));
        }
        if !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(format!("skill tag '{}' contains invalid characters", tag));
        }
        Ok(SkillTag(tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SkillTag {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        SkillTag::parse(&value, Self::DEFAULT_MAX_LEN)
    }
}

impl From<SkillTag> for String {
    fn from(tag: SkillTag) -> Self {
        tag.0
    }
}

impl fmt::Display for SkillTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered set of skill tags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkillSet(BTreeSet<SkillTag>);

impl SkillSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from caller-supplied tags, rejecting any invalid tag
    pub fn parse<I, S>(raw: I, max_len: usize) -> std::result::Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        raw.into_iter()
            .map(|s| SkillTag::parse(s.as_ref(), max_len))
            .collect::<std::result::Result<BTreeSet<_>, _>>()
            .map(SkillSet)
    }

    /// Decode the JSON-array text field used by the agent store.
    ///
    /// Unreadable fields decode to the empty set and invalid tags are
    /// dropped; both are logged.
    pub fn decode_lossy(encoded: Option<&str>, max_len: usize) -> Self {
        let Some(encoded) = encoded.map(str::trim).filter(|s| !s.is_empty()) else {
            return Self::default();
        };

        let raw: Vec<String> = match serde_json::from_str(encoded) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("⚠️ Unreadable skills field {:?}: {}", encoded, e);
                return Self::default();
            }
        };

        let mut tags = BTreeSet::new();
        for value in raw {
            match SkillTag::parse(&value, max_len) {
                Ok(tag) => {
                    tags.insert(tag);
                }
                Err(e) => warn!("⚠️ Dropping skill: {}", e),
            }
        }
        SkillSet(tags)
    }

    /// Encode as a JSON array for storage
    pub fn encode(&self) -> String {
        let tags: Vec<&str> = self.0.iter().map(SkillTag::as_str).collect();
        serde_json::to_string(&tags).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn contains(&self, tag: &SkillTag) -> bool {
        self.0.contains(tag)
    }

    pub fn is_superset(&self, other: &SkillSet) -> bool {
        self.0.is_superset(&other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SkillTag> {
        self.0.iter()
    }
}

impl FromIterator<SkillTag> for SkillSet {
    fn from_iter<T: IntoIterator<Item = SkillTag>>(iter: T) -> Self {
        SkillSet(iter.into_iter().collect())
    }
}

impl fmt::Display for SkillSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<&str> = self.0.iter().map(SkillTag::as_str).collect();
        write!(f, "{{{}}}", tags.join(", "))
    }
}

/// Routing priority weight; higher is preferred.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(i64);

impl Priority {
    pub fn new(value: i64) -> Self {
        Priority(value)
    }

    /// Coerce a stored weight into `[min, max]`, logging when it had to move
    pub fn clamped(raw: i64, min: i64, max: i64) -> Self {
        let value = raw.clamp(min, max);
        if value != raw {
            warn!("⚠️ Priority {} outside [{}, {}], clamped to {}", raw, min, max, value);
        }
        Priority(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The request an agent is currently bound to
#[derive(Debug, Clone, Serialize)]
pub struct ActiveAssignment {
    pub request: HandlingRequest,
    pub assigned_at: DateTime<Utc>,
}

/// Agent information and profile
#[derive(Debug, Clone, Serialize)]
pub struct Agent {
    pub(crate) id: AgentId,
    pub(crate) display_name: String,
    pub(crate) status: AgentStatus,
    pub(crate) skills: SkillSet,
    pub(crate) priority: Priority,
    pub(crate) current: Option<ActiveAssignment>,
}

impl Agent {
    pub fn new(id: AgentId, display_name: impl Into<String>, skills: SkillSet, priority: Priority) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            status: AgentStatus::Offline,
            skills,
            priority,
            current: None,
        }
    }

    pub fn id(&self) -> &AgentId {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn status(&self) -> AgentStatus {
        self.status
    }

    pub fn skills(&self) -> &SkillSet {
        &self.skills
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn current_assignment(&self) -> Option<&ActiveAssignment> {
        self.current.as_ref()
    }

    pub fn max_concurrent_requests(&self) -> u32 {
        MAX_CONCURRENT_REQUESTS
    }

    /// True if the agent holds every skill in `required`
    pub fn satisfies(&self, required: &SkillSet) -> bool {
        self.skills.is_superset(required)
    }
}

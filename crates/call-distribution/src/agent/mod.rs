//! Agent management module
//!
//! This module provides agent identity, status and skill types plus the
//! in-memory agent registry that is the sole owner of agent records.

pub mod registry;
pub mod types;

pub use registry::{AgentRegistry, AgentStats};
pub use types::{
    ActiveAssignment, Agent, AgentId, AgentStatus, Priority, SkillSet, SkillTag, MAX_CONCURRENT_REQUESTS,
};

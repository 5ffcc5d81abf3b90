//! Agent matching
//!
//! Stateless selection of the best eligible agent for a handling request.

pub mod matcher;

pub use matcher::select_agent;

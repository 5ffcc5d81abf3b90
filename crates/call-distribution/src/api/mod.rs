//! External API surface
//!
//! The engine itself is transport-agnostic; [`http`] exposes it over axum.

pub mod http;

pub use http::{router, ApiError, CompletionReport, ErrorBody, StatusUpdate};

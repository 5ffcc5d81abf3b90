//! JSON over HTTP surface for the distribution engine
//!
//! | Method | Path                     | Engine call          |
//! |--------|--------------------------|----------------------|
//! | POST   | `/requests`              | `assign`             |
//! | PUT    | `/agents/:id/status`     | `set_agent_status`   |
//! | POST   | `/agents/:id/complete`   | `complete`           |
//! | GET    | `/agents`                | `list_agents`        |
//! | GET    | `/queue`                 | `queue_snapshot`     |
//! | GET    | `/stats`                 | `stats`              |

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::agent::{Agent, AgentId, AgentStatus};
use crate::error::DistributionError;
use crate::orchestrator::{AssignmentResult, CallDistributionEngine, EngineStats, NewRequest};
use crate::queue::{QueueEntry, RequestId};

/// Body of `PUT /agents/:id/status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Body of `POST /agents/:id/complete`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionReport {
    pub request_id: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub disposition: Option<String>,
}

/// Error body returned by every failing route
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// HTTP mapping of [`DistributionError`]
#[derive(Debug)]
pub struct ApiError(DistributionError);

impl From<DistributionError> for ApiError {
    fn from(err: DistributionError) -> Self {
        ApiError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(DistributionError::invalid_request(format!(
            "malformed body: {}",
            rejection.body_text()
        )))
    }
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            DistributionError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            DistributionError::AgentNotFound(_) | DistributionError::NotFound(_) => StatusCode::NOT_FOUND,
            DistributionError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            DistributionError::Config(_) | DistributionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match &self.0 {
            DistributionError::InvalidRequest(_) => "invalid_request",
            DistributionError::AgentNotFound(_) => "agent_not_found",
            DistributionError::NotFound(_) => "not_found",
            DistributionError::StoreUnavailable(_) => "store_unavailable",
            DistributionError::Config(_) => "config_error",
            DistributionError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            debug!("Request rejected: {}", self.0);
        }

        let body = ErrorBody {
            code: self.code().to_string(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Build the router for an engine
pub fn router(engine: CallDistributionEngine) -> Router {
    Router::new()
        .route("/requests", post(create_request))
        .route("/agents", get(list_agents))
        .route("/agents/:id/status", put(update_status))
        .route("/agents/:id/complete", post(complete_request))
        .route("/queue", get(queue))
        .route("/stats", get(stats))
        .with_state(engine)
}

async fn create_request(
    State(engine): State<CallDistributionEngine>,
    body: Result<Json<NewRequest>, JsonRejection>,
) -> ApiResult<Json<AssignmentResult>> {
    let Json(request) = body?;
    Ok(Json(engine.assign(request).await?))
}

async fn update_status(
    State(engine): State<CallDistributionEngine>,
    Path(agent_id): Path<String>,
    body: Result<Json<StatusUpdate>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let Json(update) = body?;
    let status = update
        .status
        .parse::<AgentStatus>()
        .map_err(DistributionError::invalid_request)?;
    let reason = update.reason.as_deref().unwrap_or("status change via api");

    engine.set_agent_status(&AgentId::from(agent_id), status, reason).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn complete_request(
    State(engine): State<CallDistributionEngine>,
    Path(agent_id): Path<String>,
    body: Result<Json<CompletionReport>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let Json(report) = body?;
    let request_id = report
        .request_id
        .parse::<RequestId>()
        .map_err(|e| DistributionError::invalid_request(format!("bad request id: {}", e)))?;

    engine
        .complete(&AgentId::from(agent_id), &request_id, report.notes, report.disposition)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_agents(State(engine): State<CallDistributionEngine>) -> Json<Vec<Agent>> {
    Json(engine.list_agents())
}

async fn queue(State(engine): State<CallDistributionEngine>) -> Json<Vec<QueueEntry>> {
    Json(engine.queue_snapshot())
}

async fn stats(State(engine): State<CallDistributionEngine>) -> Json<EngineStats> {
    Json(engine.stats())
}

//! sqlx-backed agent store on SQLite

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use sqlx::Row;
use tracing::{debug, info, warn};

use super::{AgentRecord, AgentStore, AssignmentOutcome, StoreResult, StoredAssignment};
use crate::agent::{AgentId, AgentStatus, Priority, SkillSet};
use crate::config::DatabaseConfig;
use crate::error::StoreError;
use crate::queue::{HandlingRequest, RequestId};

/// Agent store using a sqlx SQLite pool
#[derive(Clone)]
pub struct SqliteAgentStore {
    pool: SqlitePool,
}

/// Agent provisioning data for [`SqliteAgentStore::upsert_agent`]
#[derive(Debug, Clone)]
pub struct AgentProfile {
    pub agent_id: AgentId,
    pub display_name: String,
    pub skills: SkillSet,
    pub priority: Priority,
    pub status: AgentStatus,
}

/// One row of the status audit trail
#[derive(Debug, Clone, Serialize)]
pub struct StatusChange {
    pub agent_id: String,
    pub status: String,
    pub reason: String,
    pub changed_at: DateTime<Utc>,
}

/// One row of the assignment audit trail
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentAudit {
    pub request_id: String,
    pub agent_id: String,
    pub call_id: String,
    pub campaign_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub disposition: Option<String>,
    pub notes: Option<String>,
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

impl SqliteAgentStore {
    /// Connect and run migrations
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        info!("🗄️ Initializing sqlx agent store: {}", config.url);

        let mut options = SqliteConnectOptions::from_str(&config.url)?
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);

        // Every connection to `:memory:` is its own database, so the pool
        // must hold exactly one connection for its whole lifetime.
        let pool_options = if is_in_memory(&config.url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            options = options
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal);
            SqlitePoolOptions::new().max_connections(config.max_connections)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to connect to {}: {}", config.url, e)))?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("✅ Agent store initialized");
        Ok(Self { pool })
    }

    /// Create an in-memory store for testing
    pub async fn new_in_memory() -> StoreResult<Self> {
        Self::connect(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        })
        .await
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Register or update an agent
    pub async fn upsert_agent(&self, profile: &AgentProfile) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO agents (agent_id, display_name, status, skills, priority, max_calls, is_active, updated_at)
             VALUES (?, ?, ?, ?, ?, 1, 1, ?)
             ON CONFLICT(agent_id) DO UPDATE SET
                display_name = excluded.display_name,
                status = excluded.status,
                skills = excluded.skills,
                priority = excluded.priority,
                is_active = 1,
                updated_at = excluded.updated_at",
        )
        .bind(profile.agent_id.as_ref())
        .bind(&profile.display_name)
        .bind(profile.status.as_str())
        .bind(profile.skills.encode())
        .bind(profile.priority.value())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        info!("✅ Agent {} upserted", profile.agent_id);
        Ok(())
    }

    /// Hide an agent from future loads without deleting its history
    pub async fn deactivate_agent(&self, agent_id: &AgentId) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE agents SET is_active = 0, updated_at = ? WHERE agent_id = ?")
            .bind(Utc::now())
            .bind(agent_id.as_ref())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Status audit trail for one agent, oldest first
    pub async fn status_history(&self, agent_id: &AgentId) -> StoreResult<Vec<StatusChange>> {
        let rows = sqlx::query(
            "SELECT agent_id, status, reason, changed_at
             FROM agent_status_history WHERE agent_id = ? ORDER BY id ASC",
        )
        .bind(agent_id.as_ref())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(StatusChange {
                    agent_id: row.try_get("agent_id")?,
                    status: row.try_get("status")?,
                    reason: row.try_get("reason")?,
                    changed_at: row.try_get("changed_at")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(StoreError::from)
    }

    /// Assignment audit row for a request
    pub async fn assignment(&self, request_id: &RequestId) -> StoreResult<Option<AssignmentAudit>> {
        let row = sqlx::query(
            "SELECT request_id, agent_id, call_id, campaign_id, started_at, ended_at,
                    duration_seconds, disposition, notes
             FROM assignments WHERE request_id = ?",
        )
        .bind(request_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(AssignmentAudit {
            request_id: row.try_get("request_id")?,
            agent_id: row.try_get("agent_id")?,
            call_id: row.try_get("call_id")?,
            campaign_id: row.try_get("campaign_id")?,
            started_at: row.try_get("started_at")?,
            ended_at: row.try_get("ended_at")?,
            duration_seconds: row.try_get("duration_seconds")?,
            disposition: row.try_get("disposition")?,
            notes: row.try_get("notes")?,
        }))
    }
}

#[async_trait]
impl AgentStore for SqliteAgentStore {
    async fn load_active_agents(&self) -> StoreResult<Vec<AgentRecord>> {
        let rows = sqlx::query(
            "SELECT a.agent_id, a.display_name, a.status, a.skills, a.priority, a.max_calls,
                    s.request_id, s.call_id, s.campaign_id, s.required_skills, s.started_at
             FROM agents a
             LEFT JOIN assignments s ON s.agent_id = a.agent_id AND s.ended_at IS NULL
             WHERE a.is_active = 1
             ORDER BY a.agent_id ASC, s.started_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut records: Vec<AgentRecord> = Vec::with_capacity(rows.len());
        for row in rows {
            let agent_id: String = row.try_get("agent_id")?;

            let request_id: Option<String> = row.try_get("request_id")?;
            let current_assignment = match request_id {
                Some(request_id) => Some(StoredAssignment {
                    request_id,
                    call_id: row.try_get("call_id")?,
                    campaign_id: row.try_get("campaign_id")?,
                    required_skills: row.try_get("required_skills")?,
                    started_at: row.try_get("started_at")?,
                }),
                None => None,
            };

            // Newest open assignment wins; older ones are stale audit rows.
            if records.last().map_or(false, |r| r.agent_id == agent_id) {
                warn!("⚠️ Agent {} has more than one open assignment, keeping the newest", agent_id);
                continue;
            }

            records.push(AgentRecord {
                agent_id,
                display_name: row.try_get("display_name")?,
                status: row.try_get("status")?,
                skills: row.try_get("skills")?,
                priority: row.try_get("priority")?,
                max_concurrent_calls: row.try_get("max_calls")?,
                current_assignment,
            });
        }

        info!("Loaded {} active agents", records.len());
        Ok(records)
    }

    async fn persist_status(&self, agent_id: &AgentId, status: AgentStatus, reason: &str) -> StoreResult<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE agents SET status = ?, updated_at = ? WHERE agent_id = ?")
            .bind(status.as_str())
            .bind(now)
            .bind(agent_id.as_ref())
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(StoreError::Validation(format!("Agent {} has no stored record", agent_id)));
        }

        sqlx::query("INSERT INTO agent_status_history (agent_id, status, reason, changed_at) VALUES (?, ?, ?, ?)")
            .bind(agent_id.as_ref())
            .bind(status.as_str())
            .bind(reason)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!("Agent {} status persisted as {} ({})", agent_id, status, reason);
        Ok(())
    }

    async fn persist_assignment_start(
        &self,
        agent_id: &AgentId,
        request: &HandlingRequest,
        started_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        // A retried drain may persist the same request again, possibly
        // against a different agent.
        sqlx::query(
            "INSERT INTO assignments (request_id, agent_id, call_id, campaign_id, required_skills, started_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(request_id) DO UPDATE SET
                agent_id = excluded.agent_id,
                started_at = excluded.started_at",
        )
        .bind(request.id.to_string())
        .bind(agent_id.as_ref())
        .bind(&request.call_id)
        .bind(&request.campaign_id)
        .bind(request.required_skills.encode())
        .bind(started_at)
        .execute(&self.pool)
        .await?;

        info!("Assignment of request {} to agent {} recorded", request.id, agent_id);
        Ok(())
    }

    async fn persist_assignment_end(
        &self,
        agent_id: &AgentId,
        request_id: &RequestId,
        outcome: &AssignmentOutcome,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE assignments
             SET ended_at = ?, duration_seconds = ?, disposition = ?, notes = ?
             WHERE request_id = ? AND agent_id = ? AND ended_at IS NULL",
        )
        .bind(outcome.ended_at)
        .bind(outcome.duration_seconds)
        .bind(&outcome.disposition)
        .bind(&outcome.notes)
        .bind(request_id.to_string())
        .bind(agent_id.as_ref())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Validation(format!(
                "No open assignment of request {} to agent {}",
                request_id, agent_id
            )));
        }

        info!("Assignment of request {} to agent {} closed", request_id, agent_id);
        Ok(())
    }
}

//! # Terminal Repository
//!
//! Database operations for registered POS terminals.
//!
//! Registration uses an existence-gated insert (`INSERT OR IGNORE`) so two
//! concurrent registrations of the same terminal_id cannot both succeed -
//! there is no read-then-write window.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use fairgate_core::{Terminal, TerminalStatus};

const SELECT_COLUMNS: &str = r#"
    terminal_id,
    public_key,
    device_name,
    os_type,
    status,
    registered_by,
    registered_at,
    revoked_at,
    last_seen_at
"#;

/// Repository for terminal database operations.
#[derive(Debug, Clone)]
pub struct TerminalRepository {
    pool: SqlitePool,
}

impl TerminalRepository {
    /// Creates a new TerminalRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TerminalRepository { pool }
    }

    /// Inserts a new terminal.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - terminal_id already registered
    ///   (detected by the conditional insert, not a pre-read)
    pub async fn insert(&self, terminal: &Terminal) -> DbResult<()> {
        debug!(terminal_id = %terminal.terminal_id, "Inserting terminal");

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO terminals (
                terminal_id, public_key, device_name, os_type, status,
                registered_by, registered_at, revoked_at, last_seen_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&terminal.terminal_id)
        .bind(&terminal.public_key)
        .bind(&terminal.device_name)
        .bind(&terminal.os_type)
        .bind(terminal.status)
        .bind(&terminal.registered_by)
        .bind(terminal.registered_at)
        .bind(terminal.revoked_at)
        .bind(terminal.last_seen_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::duplicate("terminal_id", &terminal.terminal_id));
        }

        Ok(())
    }

    /// Gets a terminal by its ID.
    pub async fn get(&self, terminal_id: &str) -> DbResult<Option<Terminal>> {
        let terminal = sqlx::query_as::<_, Terminal>(&format!(
            "SELECT {SELECT_COLUMNS} FROM terminals WHERE terminal_id = ?1"
        ))
        .bind(terminal_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(terminal)
    }

    /// Lists terminals, optionally filtered by status, newest first.
    pub async fn list(&self, status: Option<TerminalStatus>) -> DbResult<Vec<Terminal>> {
        let terminals = match status {
            Some(status) => {
                sqlx::query_as::<_, Terminal>(&format!(
                    "SELECT {SELECT_COLUMNS} FROM terminals WHERE status = ?1 \
                     ORDER BY registered_at DESC"
                ))
                .bind(status)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Terminal>(&format!(
                    "SELECT {SELECT_COLUMNS} FROM terminals ORDER BY registered_at DESC"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(terminals)
    }

    /// Transitions a terminal to revoked.
    ///
    /// Idempotent for an existing record (re-revoking just refreshes
    /// revoked_at); fails with NotFound otherwise.
    pub async fn revoke(&self, terminal_id: &str, revoked_at: DateTime<Utc>) -> DbResult<()> {
        debug!(terminal_id = %terminal_id, "Revoking terminal");

        let result = sqlx::query(
            r#"
            UPDATE terminals
            SET status = ?2, revoked_at = ?3
            WHERE terminal_id = ?1
            "#,
        )
        .bind(terminal_id)
        .bind(TerminalStatus::Revoked)
        .bind(revoked_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Terminal", terminal_id));
        }

        Ok(())
    }

    /// Hard-deletes a terminal record.
    ///
    /// Orthogonal to revoke: removal, not a lifecycle transition.
    pub async fn delete(&self, terminal_id: &str) -> DbResult<()> {
        debug!(terminal_id = %terminal_id, "Deleting terminal");

        let result = sqlx::query("DELETE FROM terminals WHERE terminal_id = ?1")
            .bind(terminal_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Terminal", terminal_id));
        }

        Ok(())
    }

    /// Updates last_seen_at. The caller treats this as advisory telemetry
    /// and may drop the result.
    pub async fn touch(&self, terminal_id: &str, seen_at: DateTime<Utc>) -> DbResult<()> {
        sqlx::query("UPDATE terminals SET last_seen_at = ?2 WHERE terminal_id = ?1")
            .bind(terminal_id)
            .bind(seen_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

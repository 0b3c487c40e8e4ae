//! # Session Repository
//!
//! Database operations for employee sessions.
//!
//! Expiry is enforced lazily by the service layer at verification time;
//! this repository stores and returns rows as-is. Logout and terminal
//! eviction delete rows outright.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use fairgate_core::EmployeeSession;

const SELECT_COLUMNS: &str = r#"
    session_id,
    employee_number,
    terminal_id,
    display_name,
    publisher_id,
    event_id,
    issued_at,
    expires_at
"#;

/// Repository for session database operations.
#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    /// Creates a new SessionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SessionRepository { pool }
    }

    /// Inserts a new session.
    pub async fn insert(&self, session: &EmployeeSession) -> DbResult<()> {
        debug!(
            session_id = %session.session_id,
            terminal_id = %session.terminal_id,
            "Inserting session"
        );

        sqlx::query(
            r#"
            INSERT INTO pos_sessions (
                session_id, employee_number, terminal_id, display_name,
                publisher_id, event_id, issued_at, expires_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&session.session_id)
        .bind(&session.employee_number)
        .bind(&session.terminal_id)
        .bind(&session.display_name)
        .bind(&session.publisher_id)
        .bind(&session.event_id)
        .bind(session.issued_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a session by id (expired or not).
    pub async fn get(&self, session_id: &str) -> DbResult<Option<EmployeeSession>> {
        let session = sqlx::query_as::<_, EmployeeSession>(&format!(
            "SELECT {SELECT_COLUMNS} FROM pos_sessions WHERE session_id = ?1"
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    /// Extends a session's expiry.
    pub async fn update_expiry(&self, session_id: &str, expires_at: i64) -> DbResult<()> {
        let result = sqlx::query("UPDATE pos_sessions SET expires_at = ?2 WHERE session_id = ?1")
            .bind(session_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Session", session_id));
        }

        Ok(())
    }

    /// Binds a session to an event.
    pub async fn set_event(&self, session_id: &str, event_id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE pos_sessions SET event_id = ?2 WHERE session_id = ?1")
            .bind(session_id)
            .bind(event_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Session", session_id));
        }

        Ok(())
    }

    /// Deletes a session (logout). Returns whether a row was removed.
    pub async fn delete(&self, session_id: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM pos_sessions WHERE session_id = ?1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes all sessions bound to a terminal.
    ///
    /// Called before issuing a new session so one terminal carries at most
    /// one live operator. Returns the number of evicted sessions.
    pub async fn delete_for_terminal(&self, terminal_id: &str) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM pos_sessions WHERE terminal_id = ?1")
            .bind(terminal_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn session(id: &str, terminal_id: &str) -> EmployeeSession {
        EmployeeSession {
            session_id: id.to_string(),
            employee_number: "1000001".to_string(),
            terminal_id: terminal_id.to_string(),
            display_name: "Cashier".to_string(),
            publisher_id: None,
            event_id: None,
            issued_at: 1_700_000_000,
            expires_at: 1_700_043_200,
        }
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.sessions();

        repo.insert(&session("s-1", "term-1")).await.unwrap();

        let loaded = repo.get("s-1").await.unwrap().unwrap();
        assert_eq!(loaded.expires_at, 1_700_043_200);

        repo.update_expiry("s-1", 1_700_050_000).await.unwrap();
        repo.set_event("s-1", "ev-1").await.unwrap();

        let loaded = repo.get("s-1").await.unwrap().unwrap();
        assert_eq!(loaded.expires_at, 1_700_050_000);
        assert_eq!(loaded.event_id.as_deref(), Some("ev-1"));

        assert!(repo.delete("s-1").await.unwrap());
        assert!(!repo.delete("s-1").await.unwrap());
        assert!(repo.get("s-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_terminal_eviction() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.sessions();

        repo.insert(&session("s-1", "term-1")).await.unwrap();
        repo.insert(&session("s-2", "term-1")).await.unwrap();
        repo.insert(&session("s-3", "term-2")).await.unwrap();

        assert_eq!(repo.delete_for_terminal("term-1").await.unwrap(), 2);
        assert!(repo.get("s-1").await.unwrap().is_none());
        assert!(repo.get("s-3").await.unwrap().is_some());
    }
}

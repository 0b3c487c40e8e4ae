//! # Terminal Registry
//!
//! Registration and lifecycle of trusted terminals.
//!
//! A terminal generates its Ed25519 keypair on-device, keeps the private
//! half in the OS keychain, and presents the public half (base64, 32 bytes)
//! at enrollment. The registry validates key shape and curve membership
//! before anything is stored, and registration itself is a conditional
//! insert - no pre-read, so two racing enrollments of one id cannot both
//! win.

use chrono::Utc;
use tracing::{debug, info};

use crate::error::{PosError, PosResult};
use fairgate_core::{crypto, Terminal, TerminalStatus};
use fairgate_db::{Database, DbError, TerminalRepository};

/// Enrollment request for a new terminal.
#[derive(Debug, Clone)]
pub struct TerminalEnrollment {
    pub terminal_id: String,
    /// Base64-encoded 32-byte Ed25519 public key.
    pub public_key: String,
    pub device_name: String,
    pub os_type: String,
    /// user_id of the approving administrator.
    pub registered_by: String,
}

/// Stores and validates terminal public keys and lifecycle state.
#[derive(Debug, Clone)]
pub struct TerminalRegistry {
    terminals: TerminalRepository,
}

impl TerminalRegistry {
    /// Creates a registry backed by the given database.
    pub fn new(db: &Database) -> Self {
        TerminalRegistry {
            terminals: db.terminals(),
        }
    }

    /// Registers a terminal.
    ///
    /// ## Errors
    /// * [`PosError::InvalidKey`] - key is not base64, not 32 bytes, or not
    ///   a valid Ed25519 point
    /// * [`PosError::DuplicateTerminal`] - id already registered (enforced
    ///   by the conditional write)
    pub async fn register(&self, enrollment: TerminalEnrollment) -> PosResult<Terminal> {
        // Reject undecodable keys before anything is stored.
        crypto::decode_public_key(&enrollment.public_key)
            .map_err(|e| PosError::InvalidKey(e.to_string()))?;

        let terminal = Terminal {
            terminal_id: enrollment.terminal_id,
            public_key: enrollment.public_key,
            device_name: enrollment.device_name,
            os_type: enrollment.os_type,
            status: TerminalStatus::Active,
            registered_by: enrollment.registered_by,
            registered_at: Utc::now(),
            revoked_at: None,
            last_seen_at: None,
        };

        self.terminals
            .insert(&terminal)
            .await
            .map_err(|e| match e {
                DbError::UniqueViolation { .. } => PosError::DuplicateTerminal,
                other => other.into(),
            })?;

        info!(
            terminal_id = %terminal.terminal_id,
            device_name = %terminal.device_name,
            "Terminal registered"
        );

        Ok(terminal)
    }

    /// Gets a terminal by id.
    pub async fn get(&self, terminal_id: &str) -> PosResult<Option<Terminal>> {
        Ok(self.terminals.get(terminal_id).await?)
    }

    /// Lists terminals for administrative views, optionally by status.
    pub async fn list(&self, status: Option<TerminalStatus>) -> PosResult<Vec<Terminal>> {
        Ok(self.terminals.list(status).await?)
    }

    /// Revokes a terminal (`active → revoked`).
    ///
    /// Idempotent for an existing record; NotFound otherwise.
    pub async fn revoke(&self, terminal_id: &str) -> PosResult<()> {
        self.terminals
            .revoke(terminal_id, Utc::now())
            .await
            .map_err(|e| match e {
                DbError::NotFound { .. } => PosError::TerminalNotFound,
                other => other.into(),
            })?;

        info!(terminal_id = %terminal_id, "Terminal revoked");
        Ok(())
    }

    /// Hard-deletes a terminal record. Orthogonal to revoke.
    pub async fn delete(&self, terminal_id: &str) -> PosResult<()> {
        self.terminals
            .delete(terminal_id)
            .await
            .map_err(|e| match e {
                DbError::NotFound { .. } => PosError::TerminalNotFound,
                other => other.into(),
            })?;

        info!(terminal_id = %terminal_id, "Terminal deleted");
        Ok(())
    }

    /// Advisory `last_seen_at` update.
    ///
    /// Returns the result for callers that care; most drop it with a debug
    /// log line. Never feeds back into request outcomes.
    pub async fn touch(&self, terminal_id: &str) -> PosResult<()> {
        if let Err(err) = self.terminals.touch(terminal_id, Utc::now()).await {
            debug!(terminal_id = %terminal_id, error = %err, "last_seen update failed");
            return Err(err.into());
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

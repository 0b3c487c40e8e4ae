//! # Session Manager
//!
//! PIN-based employee authentication and session lifecycle.
//!
//! ## Session Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  login(employee_number, pin, terminal_id)                              │
//! │       │                                                                 │
//! │       ├── PIN check: HMAC-SHA256, constant-time compare                │
//! │       ├── evict the terminal's existing sessions                       │
//! │       ├── insert session (expires_at = now + 12 h)                     │
//! │       └── SessionGrant { session, offline_verification_hash }          │
//! │                                                                         │
//! │  verify(session_id)      lazy expiry check, no background sweep        │
//! │  refresh(session_id)     extends expires_at, recomputes the hash       │
//! │  invalidate(session_id)  deletes the row; later verifies fail          │
//! │  set_session_event(...)  binds one event for the shift                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The offline verification hash is what makes a terminal useful during an
//! outage: it re-derives the HMAC from its cached `(session_id,
//! employee_number, expires_at)` triple and compares locally, trusting its
//! own clock for expiry until connectivity returns.

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::PosConfig;
use crate::error::{PosError, PosResult};
use fairgate_core::{
    crypto, validation, Employee, EmployeeSession, OfflineSessionToken, SessionGrant,
};
use fairgate_db::{Database, DbError, EmployeeRepository, SessionRepository};

/// Employee provisioning request.
#[derive(Debug, Clone)]
pub struct NewEmployee {
    /// 7-digit business identifier.
    pub employee_number: String,
    pub display_name: String,
    /// 3-8 digit numeric PIN; hashed before it leaves this layer.
    pub pin: String,
    pub publisher_id: Option<String>,
    pub event_id: Option<String>,
}

/// Issues, refreshes and invalidates employee sessions.
#[derive(Debug, Clone)]
pub struct SessionManager {
    config: PosConfig,
    employees: EmployeeRepository,
    sessions: SessionRepository,
}

impl SessionManager {
    /// Creates a session manager with the injected configuration.
    pub fn new(db: &Database, config: PosConfig) -> Self {
        SessionManager {
            config,
            employees: db.employees(),
            sessions: db.sessions(),
        }
    }

    // -------------------------------------------------------------------------
    // Employee provisioning
    // -------------------------------------------------------------------------

    /// Creates an employee with a hashed PIN.
    pub async fn create_employee(&self, new_employee: NewEmployee) -> PosResult<Employee> {
        validation::validate_employee_number(&new_employee.employee_number)?;
        validation::validate_pin(&new_employee.pin)?;

        let employee = Employee {
            pin_hash: crypto::hash_pin(
                &self.config.hmac_secret,
                &new_employee.employee_number,
                &new_employee.pin,
            ),
            employee_number: new_employee.employee_number,
            display_name: new_employee.display_name,
            publisher_id: new_employee.publisher_id,
            event_id: new_employee.event_id,
            active: true,
            created_at: Utc::now(),
        };

        self.employees
            .insert(&employee)
            .await
            .map_err(|e| match e {
                DbError::UniqueViolation { .. } => PosError::DuplicateEmployee,
                other => other.into(),
            })?;

        info!(employee_number = %employee.employee_number, "Employee created");
        Ok(employee)
    }

    /// Deactivates an employee; existing sessions keep working until they
    /// expire or are invalidated, new logins fail.
    pub async fn deactivate_employee(&self, employee_number: &str) -> PosResult<()> {
        Ok(self.employees.set_active(employee_number, false).await?)
    }

    // -------------------------------------------------------------------------
    // Login & verification
    // -------------------------------------------------------------------------

    /// Authenticates a PIN and issues a session bound to the terminal.
    ///
    /// Unknown employee, deactivated employee and wrong PIN all return the
    /// same [`PosError::PinMismatch`].
    pub async fn login(
        &self,
        employee_number: &str,
        pin: &str,
        terminal_id: &str,
    ) -> PosResult<SessionGrant> {
        validation::validate_employee_number(employee_number)?;
        validation::validate_pin(pin)?;

        let employee = self
            .employees
            .get(employee_number)
            .await?
            .ok_or(PosError::PinMismatch)?;

        if !employee.active {
            return Err(PosError::PinMismatch);
        }

        if !crypto::verify_pin(
            &self.config.hmac_secret,
            employee_number,
            pin,
            &employee.pin_hash,
        ) {
            return Err(PosError::PinMismatch);
        }

        // One live operator per terminal.
        let evicted = self.sessions.delete_for_terminal(terminal_id).await?;
        if evicted > 0 {
            debug!(terminal_id = %terminal_id, evicted = %evicted, "Evicted prior sessions");
        }

        let now = Utc::now().timestamp();
        let session = EmployeeSession {
            session_id: Uuid::new_v4().to_string(),
            employee_number: employee.employee_number,
            terminal_id: terminal_id.to_string(),
            display_name: employee.display_name,
            publisher_id: employee.publisher_id,
            event_id: employee.event_id,
            issued_at: now,
            expires_at: now + self.config.session_lifetime_secs,
        };

        self.sessions.insert(&session).await?;

        info!(
            session_id = %session.session_id,
            employee_number = %session.employee_number,
            terminal_id = %terminal_id,
            "Session issued"
        );

        Ok(self.grant(session))
    }

    /// Verifies a session id: exists and not expired (lazy check).
    pub async fn verify(&self, session_id: &str) -> PosResult<EmployeeSession> {
        let session = self
            .sessions
            .get(session_id)
            .await?
            .ok_or(PosError::SessionNotFound)?;

        if session.is_expired(Utc::now().timestamp()) {
            return Err(PosError::SessionExpired);
        }

        Ok(session)
    }

    /// Verifies the `X-POS-Session` header value.
    ///
    /// Absence maps to [`PosError::MissingSessionHeader`]; the dead-session
    /// errors collapse to one response string via
    /// [`PosError::response_message`].
    pub async fn verify_header(&self, header: Option<&str>) -> PosResult<EmployeeSession> {
        let session_id = header
            .filter(|v| !v.is_empty())
            .ok_or(PosError::MissingSessionHeader)?;
        self.verify(session_id).await
    }

    /// Validates a cached offline token: HMAC first, then expiry against
    /// the provided clock (server clock on the server, device clock on a
    /// disconnected terminal).
    pub fn verify_offline_token(&self, token: &OfflineSessionToken, now: i64) -> PosResult<()> {
        if !crypto::verify_offline_hash(
            &self.config.hmac_secret,
            &token.session_id,
            &token.employee_number,
            token.expires_at,
            &token.offline_verification_hash,
        ) {
            return Err(PosError::InvalidOfflineToken);
        }

        if token.expires_at < now {
            return Err(PosError::SessionExpired);
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Extends a live session by the configured lifetime and recomputes the
    /// offline hash. An expired session cannot be refreshed - re-login.
    pub async fn refresh(&self, session_id: &str) -> PosResult<SessionGrant> {
        let mut session = self.verify(session_id).await?;

        let new_expires_at = Utc::now().timestamp() + self.config.session_lifetime_secs;
        self.sessions
            .update_expiry(session_id, new_expires_at)
            .await?;
        session.expires_at = new_expires_at;

        debug!(session_id = %session_id, expires_at = %new_expires_at, "Session refreshed");
        Ok(self.grant(session))
    }

    /// Explicit logout. Returns whether a session was actually removed;
    /// subsequent verifications fail with SessionNotFound either way.
    pub async fn invalidate(&self, session_id: &str) -> PosResult<bool> {
        let removed = self.sessions.delete(session_id).await?;
        if removed {
            info!(session_id = %session_id, "Session invalidated");
        }
        Ok(removed)
    }

    /// Binds a live session to one event for the duration of a shift.
    /// Sales recorded under the session inherit the event id.
    pub async fn set_session_event(
        &self,
        session_id: &str,
        event_id: &str,
    ) -> PosResult<EmployeeSession> {
        let mut session = self.verify(session_id).await?;
        self.sessions.set_event(session_id, event_id).await?;
        session.event_id = Some(event_id.to_string());
        Ok(session)
    }

    fn grant(&self, session: EmployeeSession) -> SessionGrant {
        let offline_verification_hash = crypto::offline_verification_hash(
            &self.config.hmac_secret,
            &session.session_id,
            &session.employee_number,
            session.expires_at,
        );
        SessionGrant {
            session,
            offline_verification_hash,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

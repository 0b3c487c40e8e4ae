//! # Handshake Verification
//!
//! State-free per-request terminal authentication.
//!
//! ## Verification Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. |now - timestamp| ≤ replay window (300 s)?  → TimestampOutOfRange  │
//! │  2. terminal exists?                            → TerminalNotFound     │
//! │  3. status == active?                           → TerminalRevoked      │
//! │  4. Ed25519 verify "{terminal_id}:{timestamp}"  → MalformedKey /       │
//! │                                                   MalformedSignature / │
//! │                                                   InvalidSignature     │
//! │  5. fire-and-forget last_seen_at update, return the terminal record    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! There is no persisted nonce store: a captured signature replays freely
//! within the window. The window is the accepted bound, chosen over the
//! operational cost of distributed nonce state.

use chrono::Utc;
use tracing::debug;

use crate::config::PosConfig;
use crate::error::{PosError, PosResult};
use fairgate_core::{crypto, Terminal};
use fairgate_db::{Database, TerminalRepository};

/// The header-carried handshake presented on every privileged request.
#[derive(Debug, Clone)]
pub struct Handshake {
    pub terminal_id: String,
    /// Unix seconds from the terminal's clock.
    pub timestamp: i64,
    /// base64(Ed25519 sign over UTF-8 "{terminal_id}:{timestamp}").
    pub signature: String,
}

/// Validates terminal signatures and the replay window.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    config: PosConfig,
    terminals: TerminalRepository,
}

impl SignatureVerifier {
    /// Creates a verifier with the injected configuration.
    pub fn new(db: &Database, config: PosConfig) -> Self {
        SignatureVerifier {
            config,
            terminals: db.terminals(),
        }
    }

    /// Verifies a handshake and returns the authenticated terminal.
    ///
    /// Pure verification: nothing is persisted on the request path. The
    /// `last_seen_at` update runs on a spawned task and its failure is
    /// swallowed with a debug log.
    pub async fn verify(&self, handshake: &Handshake) -> PosResult<Terminal> {
        let now = Utc::now().timestamp();
        if (now - handshake.timestamp).abs() > self.config.replay_window_secs {
            return Err(PosError::TimestampOutOfRange);
        }

        let terminal = self
            .terminals
            .get(&handshake.terminal_id)
            .await?
            .ok_or(PosError::TerminalNotFound)?;

        if !terminal.is_active() {
            return Err(PosError::TerminalRevoked);
        }

        let key = crypto::decode_public_key(&terminal.public_key)?;
        crypto::verify_handshake(
            &key,
            &handshake.terminal_id,
            handshake.timestamp,
            &handshake.signature,
        )?;

        // Advisory telemetry, off the request path.
        let terminals = self.terminals.clone();
        let terminal_id = handshake.terminal_id.clone();
        tokio::spawn(async move {
            if let Err(err) = terminals.touch(&terminal_id, Utc::now()).await {
                debug!(terminal_id = %terminal_id, error = %err, "last_seen update failed");
            }
        });

        Ok(terminal)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::{TerminalEnrollment, TerminalRegistry};
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use ed25519_dalek::{Signer, SigningKey};
    use rand::rngs::OsRng;

    use fairgate_db::DbConfig;

    struct Fixture {
        verifier: SignatureVerifier,
        registry: TerminalRegistry,
        signing_key: SigningKey,
    }

    async fn fixture() -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let registry = TerminalRegistry::new(&db);

        let signing_key = SigningKey::generate(&mut OsRng);
        registry
            .register(TerminalEnrollment {
                terminal_id: "term-1".to_string(),
                public_key: BASE64.encode(signing_key.verifying_key().to_bytes()),
                device_name: "Register 1".to_string(),
                os_type: "macos".to_string(),
                registered_by: "admin-1".to_string(),
            })
            .await
            .unwrap();

        Fixture {
            verifier: SignatureVerifier::new(&db, PosConfig::new("test-secret")),
            registry,
            signing_key,
        }
    }

    fn signed(key: &SigningKey, terminal_id: &str, timestamp: i64) -> Handshake {
        let message = format!("{}:{}", terminal_id, timestamp);
        let signature = BASE64.encode(key.sign(message.as_bytes()).to_bytes());
        Handshake {
            terminal_id: terminal_id.to_string(),
            timestamp,
            signature,
        }
    }

    #[tokio::test]
    async fn test_valid_handshake() {
        let f = fixture().await;
        let handshake = signed(&f.signing_key, "term-1", Utc::now().timestamp());

        let terminal = f.verifier.verify(&handshake).await.unwrap();
        assert_eq!(terminal.terminal_id, "term-1");
    }

    #[tokio::test]
    async fn test_replay_window_boundaries() {
        let f = fixture().await;

        // 301 seconds old: outside the window even if otherwise valid.
        let stale = signed(&f.signing_key, "term-1", Utc::now().timestamp() - 301);
        assert!(matches!(
            f.verifier.verify(&stale).await,
            Err(PosError::TimestampOutOfRange)
        ));

        // 299 seconds old: accepted.
        let fresh = signed(&f.signing_key, "term-1", Utc::now().timestamp() - 299);
        assert!(f.verifier.verify(&fresh).await.is_ok());

        // The window is symmetric: a clock running ahead is bounded too.
        let future = signed(&f.signing_key, "term-1", Utc::now().timestamp() + 301);
        assert!(matches!(
            f.verifier.verify(&future).await,
            Err(PosError::TimestampOutOfRange)
        ));
    }

    #[tokio::test]
    async fn test_unknown_and_revoked_terminal() {
        let f = fixture().await;

        let unknown = signed(&f.signing_key, "term-9", Utc::now().timestamp());
        assert!(matches!(
            f.verifier.verify(&unknown).await,
            Err(PosError::TerminalNotFound)
        ));

        f.registry.revoke("term-1").await.unwrap();
        let revoked = signed(&f.signing_key, "term-1", Utc::now().timestamp());
        assert!(matches!(
            f.verifier.verify(&revoked).await,
            Err(PosError::TerminalRevoked)
        ));
    }

    #[tokio::test]
    async fn test_tampered_signature_rejected() {
        let f = fixture().await;
        let mut handshake = signed(&f.signing_key, "term-1", Utc::now().timestamp());

        let mut sig_bytes = BASE64.decode(&handshake.signature).unwrap();
        sig_bytes[10] ^= 0x01;
        handshake.signature = BASE64.encode(&sig_bytes);

        assert!(matches!(
            f.verifier.verify(&handshake).await,
            Err(PosError::InvalidSignature)
        ));
    }

    #[tokio::test]
    async fn test_wrong_key_rejected() {
        let f = fixture().await;

        // Signed by a different device key.
        let imposter = SigningKey::generate(&mut OsRng);
        let handshake = signed(&imposter, "term-1", Utc::now().timestamp());
        assert!(matches!(
            f.verifier.verify(&handshake).await,
            Err(PosError::InvalidSignature)
        ));
    }

    #[tokio::test]
    async fn test_malformed_signature_encoding() {
        let f = fixture().await;
        let mut handshake = signed(&f.signing_key, "term-1", Utc::now().timestamp());
        handshake.signature = "%%%not-base64%%%".to_string();

        assert!(matches!(
            f.verifier.verify(&handshake).await,
            Err(PosError::MalformedSignature(_))
        ));
    }
}

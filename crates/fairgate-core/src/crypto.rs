//! # Crypto Primitives
//!
//! The two cryptographic building blocks of terminal and operator trust:
//!
//! - **Ed25519** for terminal handshakes: a terminal signs the UTF-8 message
//!   `"{terminal_id}:{timestamp}"` with its device-held private key; the
//!   server verifies against the registered 32-byte public key.
//! - **HMAC-SHA256** for PIN hashes and offline session tokens, keyed by a
//!   shared secret that must be identical across every terminal and server
//!   instance. The employee number acts as a salt, not a secret.
//!
//! All comparisons of secret-derived material are constant-time.
//!
//! Everything here is pure: the same functions run on a terminal validating
//! a cached session offline and on the server issuing it.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::{Signature, Verifier, VerifyingKey, PUBLIC_KEY_LENGTH};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{CoreError, CoreResult};

type HmacSha256 = Hmac<Sha256>;

// =============================================================================
// HMAC-SHA256
// =============================================================================

/// HMAC-SHA256 over `message`, rendered as lowercase hex.
fn hmac_hex(secret: &str, message: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time string equality.
///
/// Both sides are hex digests of equal nominal length; subtle still returns
/// false (not a panic) if an attacker presents a short value.
fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Hashes an employee PIN: `HMAC-SHA256(secret, "{employee_number}:{pin}")`.
pub fn hash_pin(secret: &str, employee_number: &str, pin: &str) -> String {
    hmac_hex(secret, &format!("{}:{}", employee_number, pin))
}

/// Verifies a PIN against a stored hash in constant time.
pub fn verify_pin(secret: &str, employee_number: &str, pin: &str, stored_hash: &str) -> bool {
    constant_time_eq(&hash_pin(secret, employee_number, pin), stored_hash)
}

/// Computes the offline verification hash for a session:
/// `HMAC-SHA256(secret, "{session_id}:{employee_number}:{expires_at}")`.
///
/// A terminal caches this alongside the triple and can re-validate the
/// session with no server call, trusting its local clock for expiry.
pub fn offline_verification_hash(
    secret: &str,
    session_id: &str,
    employee_number: &str,
    expires_at: i64,
) -> String {
    hmac_hex(
        secret,
        &format!("{}:{}:{}", session_id, employee_number, expires_at),
    )
}

/// Recomputes the offline hash from a cached triple and compares it to the
/// presented value in constant time. Changing any one field invalidates it.
pub fn verify_offline_hash(
    secret: &str,
    session_id: &str,
    employee_number: &str,
    expires_at: i64,
    presented: &str,
) -> bool {
    constant_time_eq(
        &offline_verification_hash(secret, session_id, employee_number, expires_at),
        presented,
    )
}

// =============================================================================
// Ed25519
// =============================================================================

/// Decodes a base64 public key and constructs the Ed25519 verifying key.
///
/// Fails if the decoded key is not exactly 32 bytes or is not a valid
/// curve point.
pub fn decode_public_key(public_key_b64: &str) -> CoreResult<VerifyingKey> {
    let bytes = BASE64
        .decode(public_key_b64)
        .map_err(|e| CoreError::MalformedKey {
            reason: e.to_string(),
        })?;

    let key_bytes: [u8; PUBLIC_KEY_LENGTH] =
        bytes
            .try_into()
            .map_err(|rejected: Vec<u8>| CoreError::InvalidKeyLength {
                actual: rejected.len(),
            })?;

    VerifyingKey::from_bytes(&key_bytes).map_err(|e| CoreError::MalformedKey {
        reason: e.to_string(),
    })
}

/// The canonical handshake message a terminal signs.
pub fn handshake_message(terminal_id: &str, timestamp: i64) -> String {
    format!("{}:{}", terminal_id, timestamp)
}

/// Verifies a base64 Ed25519 signature over the handshake message.
pub fn verify_handshake(
    key: &VerifyingKey,
    terminal_id: &str,
    timestamp: i64,
    signature_b64: &str,
) -> CoreResult<()> {
    let sig_bytes = BASE64
        .decode(signature_b64)
        .map_err(|e| CoreError::MalformedSignature {
            reason: e.to_string(),
        })?;

    let signature =
        Signature::from_slice(&sig_bytes).map_err(|e| CoreError::MalformedSignature {
            reason: e.to_string(),
        })?;

    key.verify(
        handshake_message(terminal_id, timestamp).as_bytes(),
        &signature,
    )
    .map_err(|_| CoreError::SignatureMismatch)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use rand::rngs::OsRng;

    const SECRET: &str = "test-secret";

    fn keypair() -> (SigningKey, String) {
        let signing_key = SigningKey::generate(&mut OsRng);
        let public_key_b64 = BASE64.encode(signing_key.verifying_key().to_bytes());
        (signing_key, public_key_b64)
    }

    fn sign_handshake(key: &SigningKey, terminal_id: &str, timestamp: i64) -> String {
        let sig = key.sign(handshake_message(terminal_id, timestamp).as_bytes());
        BASE64.encode(sig.to_bytes())
    }

    #[test]
    fn test_pin_hash_roundtrip() {
        let hash = hash_pin(SECRET, "1000001", "4821");
        assert!(verify_pin(SECRET, "1000001", "4821", &hash));
        assert!(!verify_pin(SECRET, "1000001", "4822", &hash));
        // Same PIN, different employee number: the salt matters.
        assert!(!verify_pin(SECRET, "1000002", "4821", &hash));
    }

    #[test]
    fn test_offline_hash_is_deterministic() {
        let a = offline_verification_hash(SECRET, "sess-1", "1000001", 1_900_000_000);
        let b = offline_verification_hash(SECRET, "sess-1", "1000001", 1_900_000_000);
        assert_eq!(a, b);
        assert!(verify_offline_hash(SECRET, "sess-1", "1000001", 1_900_000_000, &a));
    }

    #[test]
    fn test_offline_hash_invalidated_by_any_field() {
        let hash = offline_verification_hash(SECRET, "sess-1", "1000001", 1_900_000_000);
        assert!(!verify_offline_hash(SECRET, "sess-2", "1000001", 1_900_000_000, &hash));
        assert!(!verify_offline_hash(SECRET, "sess-1", "1000002", 1_900_000_000, &hash));
        assert!(!verify_offline_hash(SECRET, "sess-1", "1000001", 1_900_000_001, &hash));
    }

    #[test]
    fn test_decode_public_key_rejects_bad_length() {
        let short = BASE64.encode([0u8; 31]);
        match decode_public_key(&short) {
            Err(CoreError::InvalidKeyLength { actual }) => assert_eq!(actual, 31),
            other => panic!("expected InvalidKeyLength, got {:?}", other),
        }

        let garbage = "not-base64!!!";
        assert!(matches!(
            decode_public_key(garbage),
            Err(CoreError::MalformedKey { .. })
        ));
    }

    #[test]
    fn test_handshake_verifies() {
        let (signing_key, public_key_b64) = keypair();
        let key = decode_public_key(&public_key_b64).unwrap();

        let signature = sign_handshake(&signing_key, "term-1", 1_700_000_000);
        assert!(verify_handshake(&key, "term-1", 1_700_000_000, &signature).is_ok());
    }

    #[test]
    fn test_single_bit_flip_rejects() {
        let (signing_key, public_key_b64) = keypair();
        let key = decode_public_key(&public_key_b64).unwrap();

        let signature = sign_handshake(&signing_key, "term-1", 1_700_000_000);
        let mut sig_bytes = BASE64.decode(&signature).unwrap();
        sig_bytes[0] ^= 0x01;
        let tampered = BASE64.encode(&sig_bytes);

        assert!(matches!(
            verify_handshake(&key, "term-1", 1_700_000_000, &tampered),
            Err(CoreError::SignatureMismatch)
        ));
    }

    #[test]
    fn test_signature_bound_to_message() {
        let (signing_key, public_key_b64) = keypair();
        let key = decode_public_key(&public_key_b64).unwrap();

        let signature = sign_handshake(&signing_key, "term-1", 1_700_000_000);
        // Different terminal or timestamp: signature no longer matches.
        assert!(verify_handshake(&key, "term-2", 1_700_000_000, &signature).is_err());
        assert!(verify_handshake(&key, "term-1", 1_700_000_001, &signature).is_err());
    }

    #[test]
    fn test_malformed_signature_encoding() {
        let (_, public_key_b64) = keypair();
        let key = decode_public_key(&public_key_b64).unwrap();

        assert!(matches!(
            verify_handshake(&key, "term-1", 0, "%%%"),
            Err(CoreError::MalformedSignature { .. })
        ));
        // Valid base64 but wrong length.
        let short = BASE64.encode([0u8; 10]);
        assert!(matches!(
            verify_handshake(&key, "term-1", 0, &short),
            Err(CoreError::MalformedSignature { .. })
        ));
    }
}

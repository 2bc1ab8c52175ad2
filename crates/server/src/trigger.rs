//! Signed trigger ids.
//!
//! A trigger id correlates an asynchronous integration call with the client
//! session that fired the action. The integration receives the signed
//! *request form*; the client receives only the 26-character *client form*.
//! When the integration later asks to open a dialog it echoes the request
//! form back, which proves the user clicked something within the last few
//! seconds.
//!
//! Request form layout, before the outer base64:
//!
//! ```text
//! {client_id}:{user_id}:{issued_at_ms}:{base64(der_signature)}
//! ```
//!
//! The signature is ECDSA P-256/SHA-256 over `{client_id}:{user_id}:{issued_at_ms}:`.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey};
use p256::elliptic_curve::rand_core::OsRng;
use p256::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use postaction_core::{UserId, new_id};
use secrecy::SecretString;
use thiserror::Error;

/// Default freshness window of a trigger id.
pub const DEFAULT_TRIGGER_TTL: Duration = Duration::from_millis(3000);

/// Errors produced while minting or verifying trigger ids.
#[derive(Debug, Error)]
pub enum TriggerError {
    /// Malformed, tampered with, or signed by another key.
    #[error("invalid trigger id: {0}")]
    Invalid(String),

    /// Well-formed and authentic but older than the freshness window.
    #[error("trigger id has expired")]
    Expired,

    /// The user id cannot be embedded in a token.
    #[error("user id {0:?} cannot be embedded in a trigger id")]
    InvalidUserId(String),

    /// The signing key could not be loaded, encoded, or used.
    #[error("signing key error: {0}")]
    Key(String),
}

/// Supplies the process-wide key trigger ids are signed with.
pub trait SigningKeyProvider: Send + Sync {
    /// The private key; its public half verifies tokens.
    fn signing_key(&self) -> &SigningKey;
}

/// A signing key held in memory for the lifetime of the process.
#[derive(Clone)]
pub struct StaticSigningKey {
    key: SigningKey,
}

impl std::fmt::Debug for StaticSigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticSigningKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl StaticSigningKey {
    /// Generate a fresh random key.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            key: SigningKey::random(&mut OsRng),
        }
    }

    /// Load a PKCS#8 PEM encoded P-256 private key.
    ///
    /// # Errors
    ///
    /// Returns `TriggerError::Key` if the PEM is not a P-256 private key.
    pub fn from_pem(pem: &str) -> Result<Self, TriggerError> {
        let key = SigningKey::from_pkcs8_pem(pem.trim())
            .map_err(|e| TriggerError::Key(e.to_string()))?;
        Ok(Self { key })
    }

    /// Encode the key as PKCS#8 PEM.
    ///
    /// # Errors
    ///
    /// Returns `TriggerError::Key` if encoding fails.
    pub fn to_pem(&self) -> Result<SecretString, TriggerError> {
        let pem = self
            .key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| TriggerError::Key(e.to_string()))?;
        Ok(SecretString::from(pem.to_string()))
    }
}

impl SigningKeyProvider for StaticSigningKey {
    fn signing_key(&self) -> &SigningKey {
        &self.key
    }
}

/// A minted or verified trigger id.
///
/// One signing operation yields both serializations, so the client form and
/// the request form always describe the same token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerToken {
    client_id: String,
    user_id: UserId,
    issued_at: i64,
    signature: String,
}

impl TriggerToken {
    /// The 26-character id handed back to the client.
    #[must_use]
    pub fn to_client_form(&self) -> String {
        self.client_id.clone()
    }

    /// The signed token sent to the integration.
    #[must_use]
    pub fn to_request_form(&self) -> String {
        STANDARD.encode(format!("{}{}", self.signed_payload(), self.signature))
    }

    /// The user the token was minted for.
    #[must_use]
    pub const fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Issue time in milliseconds since the Unix epoch.
    #[must_use]
    pub const fn issued_at(&self) -> i64 {
        self.issued_at
    }

    fn signed_payload(&self) -> String {
        payload(&self.client_id, self.user_id.as_str(), self.issued_at)
    }
}

fn payload(client_id: &str, user_id: &str, issued_at: i64) -> String {
    format!("{client_id}:{user_id}:{issued_at}:")
}

/// Mints and verifies trigger ids.
#[derive(Clone)]
pub struct TriggerCodec {
    keys: Arc<dyn SigningKeyProvider>,
    ttl: Duration,
}

impl std::fmt::Debug for TriggerCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerCodec")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TriggerCodec {
    /// Create a codec signing with `keys` whose tokens live for `ttl`.
    #[must_use]
    pub fn new(keys: Arc<dyn SigningKeyProvider>, ttl: Duration) -> Self {
        Self { keys, ttl }
    }

    /// How long a token stays valid after minting.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mint a token for `user_id` stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns `TriggerError::InvalidUserId` if the id contains `:`.
    pub fn mint(&self, user_id: &UserId) -> Result<TriggerToken, TriggerError> {
        self.mint_at(user_id, now_millis())
    }

    /// Mint a token for `user_id` stamped with `issued_at` (ms).
    ///
    /// # Errors
    ///
    /// Returns `TriggerError::InvalidUserId` if the id contains `:`, or
    /// `TriggerError::Key` if signing fails.
    pub fn mint_at(
        &self,
        user_id: &UserId,
        issued_at: i64,
    ) -> Result<TriggerToken, TriggerError> {
        if user_id.as_str().contains(':') {
            return Err(TriggerError::InvalidUserId(user_id.to_string()));
        }

        let client_id = new_id();
        let message = payload(&client_id, user_id.as_str(), issued_at);
        let signature: Signature = self
            .keys
            .signing_key()
            .try_sign(message.as_bytes())
            .map_err(|e| TriggerError::Key(e.to_string()))?;

        Ok(TriggerToken {
            client_id,
            user_id: user_id.clone(),
            issued_at,
            signature: STANDARD.encode(signature.to_der().as_bytes()),
        })
    }

    /// Decode a request-form token and verify it against the current time.
    ///
    /// # Errors
    ///
    /// Returns `TriggerError::Invalid` for anything malformed or unsigned and
    /// `TriggerError::Expired` for an authentic token past the window.
    pub fn decode_and_verify(&self, signed: &str) -> Result<TriggerToken, TriggerError> {
        self.decode_and_verify_at(signed, now_millis())
    }

    /// Decode a request-form token and verify it as of `now` (ms).
    ///
    /// The signature is checked before freshness, so a tampered token is
    /// always reported as invalid, never as expired.
    ///
    /// # Errors
    ///
    /// See [`TriggerCodec::decode_and_verify`].
    pub fn decode_and_verify_at(
        &self,
        signed: &str,
        now: i64,
    ) -> Result<TriggerToken, TriggerError> {
        let token = self.decode(signed)?;

        let ttl_ms = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        if now.saturating_sub(token.issued_at) > ttl_ms {
            return Err(TriggerError::Expired);
        }

        Ok(token)
    }

    /// Decode a request-form token and check its signature only.
    ///
    /// # Errors
    ///
    /// Returns `TriggerError::Invalid` for anything malformed or unsigned.
    pub fn decode(&self, signed: &str) -> Result<TriggerToken, TriggerError> {
        let decoded = STANDARD
            .decode(signed)
            .map_err(|e| TriggerError::Invalid(format!("not base64: {e}")))?;
        let decoded = String::from_utf8(decoded)
            .map_err(|_| TriggerError::Invalid("not utf-8".to_string()))?;

        let parts: Vec<&str> = decoded.split(':').collect();
        let [client_id, user_id, issued_at, signature] = parts.as_slice() else {
            return Err(TriggerError::Invalid(format!(
                "expected 4 parts, found {}",
                parts.len()
            )));
        };

        let der = STANDARD
            .decode(signature)
            .map_err(|e| TriggerError::Invalid(format!("signature not base64: {e}")))?;
        let parsed = Signature::from_der(&der)
            .map_err(|_| TriggerError::Invalid("malformed signature".to_string()))?;

        let message = format!("{client_id}:{user_id}:{issued_at}:");
        self.keys
            .signing_key()
            .verifying_key()
            .verify(message.as_bytes(), &parsed)
            .map_err(|_| TriggerError::Invalid("signature mismatch".to_string()))?;

        let issued_at: i64 = issued_at
            .parse()
            .map_err(|_| TriggerError::Invalid("timestamp is not numeric".to_string()))?;

        Ok(TriggerToken {
            client_id: (*client_id).to_string(),
            user_id: UserId::new(*user_id),
            issued_at,
            signature: (*signature).to_string(),
        })
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

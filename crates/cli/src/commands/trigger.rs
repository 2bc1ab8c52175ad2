//! Trigger id inspection.
//!
//! Integrations receive the request form of a trigger id. This command
//! verifies one against the deployment's signing key and shows what it
//! carries, including tokens that have already expired.
//!
//! # Environment Variables
//!
//! - `POSTACTION_SIGNING_KEY` - PKCS#8 PEM key the server signs with
//! - `POSTACTION_TRIGGER_TTL_MS` - Freshness window (default: 3000)

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use postaction_core::UserId;
use postaction_server::trigger::{StaticSigningKey, TriggerCodec, TriggerError, TriggerToken};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

/// Errors that can occur while inspecting a trigger id.
#[derive(Debug, Error)]
pub enum InspectError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// The key or the trigger id was rejected.
    #[error(transparent)]
    Trigger(#[from] TriggerError),
}

/// What a verified trigger id says about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inspection {
    pub client_id: String,
    pub user_id: UserId,
    pub issued_at: i64,
    pub age_ms: i64,
    pub expired: bool,
}

impl Inspection {
    /// Describe `token` as seen at `now` (ms) with the given window.
    #[must_use]
    pub fn new(token: &TriggerToken, now: i64, ttl: Duration) -> Self {
        let age_ms = now.saturating_sub(token.issued_at());
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        Self {
            client_id: token.to_client_form(),
            user_id: token.user_id().clone(),
            issued_at: token.issued_at(),
            age_ms,
            expired: age_ms > ttl_ms,
        }
    }
}

impl fmt::Display for Inspection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let issued = DateTime::<Utc>::from_timestamp_millis(self.issued_at)
            .map_or_else(|| self.issued_at.to_string(), |t| t.to_rfc3339());

        writeln!(f, "client id: {}", self.client_id)?;
        writeln!(f, "user id:   {}", self.user_id)?;
        writeln!(f, "issued:    {issued} ({} ms ago)", self.age_ms)?;
        write!(
            f,
            "status:    {}",
            if self.expired { "expired" } else { "fresh" }
        )
    }
}

/// Verify `trigger_id` and print its contents.
///
/// # Errors
///
/// Returns an error if the signing key is missing or invalid, or if the
/// trigger id is malformed or was not signed with that key.
pub fn inspect(trigger_id: &str, ttl_ms: u64) -> Result<(), Box<dyn std::error::Error>> {
    let pem = std::env::var("POSTACTION_SIGNING_KEY")
        .map(SecretString::from)
        .map_err(|_| InspectError::MissingEnvVar("POSTACTION_SIGNING_KEY"))?;

    let inspection = decode(
        pem.expose_secret(),
        trigger_id.trim(),
        Duration::from_millis(ttl_ms),
        Utc::now().timestamp_millis(),
    )?;

    #[allow(clippy::print_stdout)]
    {
        println!("{inspection}");
    }
    Ok(())
}

/// Verify `trigger_id` against `pem` and describe it as of `now`.
///
/// # Errors
///
/// Returns `InspectError::Trigger` if the key cannot be loaded or the
/// signature does not verify.
pub fn decode(
    pem: &str,
    trigger_id: &str,
    ttl: Duration,
    now: i64,
) -> Result<Inspection, InspectError> {
    let key = StaticSigningKey::from_pem(pem)?;
    let codec = TriggerCodec::new(Arc::new(key), ttl);
    let token = codec.decode(trigger_id)?;
    Ok(Inspection::new(&token, now, ttl))
}

//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `POSTACTION_SITE_URL` - Public URL of the site; its path is the subpath
//!   plugins are served under
//!
//! ## Optional
//! - `POSTACTION_HOST` - Bind address (default: 127.0.0.1)
//! - `POSTACTION_PORT` - Listen port (default: 8065)
//! - `POSTACTION_SIGNING_KEY` - PKCS#8 PEM P-256 key trigger ids are signed
//!   with (default: a fresh key per process)
//! - `POSTACTION_TRIGGER_TTL_MS` - Trigger id lifetime (default: 3000)
//! - `POSTACTION_ALLOWED_UNTRUSTED_INTERNAL_CONNECTIONS` - Host names, IPs or
//!   CIDR ranges external integrations may resolve to despite being private
//! - `POSTACTION_OUTGOING_TIMEOUT_SECS` - Integration call timeout (default: 30)
//! - `POSTACTION_SEED_FILE` - YAML fixture loaded into the in-memory store
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`
//! - `LOG_FORMAT` - `json` for structured logs, anything else for text

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

use crate::trigger::StaticSigningKey;

const DEFAULT_TRIGGER_TTL_MS: &str = "3000";
const DEFAULT_OUTGOING_TIMEOUT_SECS: &str = "30";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public site URL
    pub site_url: Url,
    /// PEM-encoded trigger signing key
    pub signing_key: Option<SecretString>,
    /// How long a trigger id stays valid
    pub trigger_ttl: Duration,
    /// Raw allowlist of reserved destinations external integrations may use
    pub allowed_untrusted_internal_connections: String,
    /// Timeout for integration calls
    pub outgoing_timeout: Duration,
    /// Optional YAML fixture for the in-memory store
    pub seed_file: Option<PathBuf>,
    /// Emit JSON logs instead of text
    pub log_json: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("site_url", &self.site_url.as_str())
            .field(
                "signing_key",
                &self.signing_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("trigger_ttl", &self.trigger_ttl)
            .field(
                "allowed_untrusted_internal_connections",
                &self.allowed_untrusted_internal_connections,
            )
            .field("outgoing_timeout", &self.outgoing_timeout)
            .field("seed_file", &self.seed_file)
            .field("log_json", &self.log_json)
            .field("sentry_dsn", &self.sentry_dsn.as_ref().map(|_| "[REDACTED]"))
            .field("sentry_environment", &self.sentry_environment)
            .finish_non_exhaustive()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which returns the value of a
    /// variable if it is set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let host = env
            .or_default("POSTACTION_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| invalid("POSTACTION_HOST", e))?;
        let port = env
            .or_default("POSTACTION_PORT", "8065")
            .parse::<u16>()
            .map_err(|e| invalid("POSTACTION_PORT", e))?;

        let site_url = env.required("POSTACTION_SITE_URL")?;
        let site_url = Url::parse(&site_url).map_err(|e| invalid("POSTACTION_SITE_URL", e))?;
        if !matches!(site_url.scheme(), "http" | "https") || site_url.host_str().is_none() {
            return Err(invalid(
                "POSTACTION_SITE_URL",
                "must be an http(s) URL with a host",
            ));
        }

        let signing_key = env
            .optional("POSTACTION_SIGNING_KEY")
            .filter(|pem| !pem.trim().is_empty())
            .map(SecretString::from);

        let trigger_ttl = env
            .or_default("POSTACTION_TRIGGER_TTL_MS", DEFAULT_TRIGGER_TTL_MS)
            .parse::<u64>()
            .map_err(|e| invalid("POSTACTION_TRIGGER_TTL_MS", e))?;
        if trigger_ttl == 0 {
            return Err(invalid("POSTACTION_TRIGGER_TTL_MS", "must be positive"));
        }

        let outgoing_timeout = env
            .or_default("POSTACTION_OUTGOING_TIMEOUT_SECS", DEFAULT_OUTGOING_TIMEOUT_SECS)
            .parse::<u64>()
            .map_err(|e| invalid("POSTACTION_OUTGOING_TIMEOUT_SECS", e))?;

        Ok(Self {
            host,
            port,
            site_url,
            signing_key,
            trigger_ttl: Duration::from_millis(trigger_ttl),
            allowed_untrusted_internal_connections: env
                .optional("POSTACTION_ALLOWED_UNTRUSTED_INTERNAL_CONNECTIONS")
                .unwrap_or_default(),
            outgoing_timeout: Duration::from_secs(outgoing_timeout),
            seed_file: env.optional("POSTACTION_SEED_FILE").map(PathBuf::from),
            log_json: env
                .optional("LOG_FORMAT")
                .is_some_and(|format| format.eq_ignore_ascii_case("json")),
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: env
                .optional("SENTRY_SAMPLE_RATE")
                .and_then(|s| s.parse().ok())
                .unwrap_or(1.0),
            sentry_traces_sample_rate: env
                .optional("SENTRY_TRACES_SAMPLE_RATE")
                .and_then(|s| s.parse().ok())
                .unwrap_or(1.0),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Path prefix the site is served under, without a trailing slash.
    ///
    /// Empty when the site is served from the root.
    #[must_use]
    pub fn subpath(&self) -> String {
        self.site_url.path().trim_end_matches('/').to_string()
    }

    /// Load the configured signing key, or generate one for this process.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if the configured PEM is not a
    /// P-256 private key.
    pub fn load_signing_key(&self) -> Result<StaticSigningKey, ConfigError> {
        match &self.signing_key {
            Some(pem) => StaticSigningKey::from_pem(pem.expose_secret())
                .map_err(|e| invalid("POSTACTION_SIGNING_KEY", e)),
            None => {
                tracing::warn!(
                    "POSTACTION_SIGNING_KEY is not set; trigger ids will not survive a restart"
                );
                Ok(StaticSigningKey::generate())
            }
        }
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }
}

fn invalid(key: &str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::InvalidEnvVar(key.to_string(), reason.to_string())
}

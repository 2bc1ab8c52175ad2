//! Egress classification for integration URLs.
//!
//! Plugins installed on this server are reached over loopback under the
//! `{subpath}/plugins` prefix and are trusted. Every other target, including
//! loopback URLs outside that prefix, goes through the untrusted client and
//! its address checks.

use url::Url;

/// Whether an outbound call may use the trusted client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Egress {
    /// A plugin served by this site; private addresses are allowed.
    Internal,
    /// Anything else; reserved addresses are rejected.
    External,
}

/// Classifies target URLs against the site's own address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EgressPolicy {
    site_host: Option<String>,
    plugin_prefix: String,
}

impl EgressPolicy {
    /// Build a policy for a site reachable at `site_url` under `subpath`.
    ///
    /// An unparseable site URL still recognizes `localhost` and `127.0.0.1`.
    #[must_use]
    pub fn new(site_url: &str, subpath: &str) -> Self {
        let site_host = Url::parse(site_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_ascii_lowercase));

        let subpath = subpath.trim_matches('/');
        let plugin_prefix = if subpath.is_empty() {
            "/plugins".to_string()
        } else {
            format!("/{subpath}/plugins")
        };

        Self {
            site_host,
            plugin_prefix,
        }
    }

    /// The path prefix plugin endpoints live under.
    #[must_use]
    pub fn plugin_prefix(&self) -> &str {
        &self.plugin_prefix
    }

    /// Classify `target`.
    #[must_use]
    pub fn classify(&self, target: &str) -> Egress {
        let Ok(url) = Url::parse(target) else {
            return Egress::External;
        };
        if !matches!(url.scheme(), "http" | "https") {
            return Egress::External;
        }
        let Some(host) = url.host_str() else {
            return Egress::External;
        };

        let host = host.to_ascii_lowercase();
        let local_host = host == "localhost"
            || host == "127.0.0.1"
            || self.site_host.as_deref() == Some(host.as_str());

        if local_host && self.is_plugin_path(url.path()) {
            Egress::Internal
        } else {
            Egress::External
        }
    }

    fn is_plugin_path(&self, path: &str) -> bool {
        path.strip_prefix(self.plugin_prefix.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }
}

/// Classify `target` for a site at `site_url` served under `subpath`.
#[must_use]
pub fn classify(target: &str, site_url: &str, subpath: &str) -> Egress {
    EgressPolicy::new(site_url, subpath).classify(target)
}

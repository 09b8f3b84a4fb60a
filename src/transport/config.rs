//! HTTP transport configuration.

use crate::core::result::duration_serde;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Browser User-Agent strings rotated per request.
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
];

/// Configuration for the `reqwest`-backed transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpTransportConfig {
    /// Total request timeout.
    #[serde(with = "duration_serde", rename = "timeout_ms")]
    pub timeout: Duration,

    /// Connection timeout.
    #[serde(with = "duration_serde", rename = "connect_timeout_ms")]
    pub connect_timeout: Duration,

    /// Query parameter that carries a credential resource's secret.
    pub credential_param: String,

    /// User-Agent strings, one picked at random per request.
    pub user_agents: Vec<String>,

    /// Maximum redirects followed. Zero disables redirects.
    pub max_redirects: usize,

    /// Headers sent with every request, before strategy headers.
    pub default_headers: Vec<(String, String)>,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            credential_param: "api_key".to_string(),
            user_agents: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
            max_redirects: 10,
            default_headers: vec![
                (
                    "Accept".to_string(),
                    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
                ),
                ("Accept-Language".to_string(), "en-US,en;q=0.9".to_string()),
                ("DNT".to_string(), "1".to_string()),
                ("Upgrade-Insecure-Requests".to_string(), "1".to_string()),
            ],
        }
    }
}

impl HttpTransportConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the total request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the credential query parameter.
    pub fn with_credential_param(mut self, param: impl Into<String>) -> Self {
        self.credential_param = param.into();
        self
    }

    /// Replaces the User-Agent rotation list.
    pub fn with_user_agents<I, S>(mut self, agents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.user_agents = agents.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the redirect limit.
    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    /// Adds a default header.
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HttpTransportConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.credential_param, "api_key");
        assert_eq!(config.user_agents.len(), DEFAULT_USER_AGENTS.len());
    }

    #[test]
    fn test_config_deserialize_partial() {
        let config: HttpTransportConfig =
            serde_json::from_str(r#"{"timeout_ms": 5000, "credential_param": "key"}"#).unwrap();
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.credential_param, "key");
        assert_eq!(config.max_redirects, 10);
    }
}

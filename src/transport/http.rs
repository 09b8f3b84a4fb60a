//! `reqwest`-backed transport.
//!
//! Proxy resources get their own client (cached per proxy, built on first
//! use). Credential resources go through the direct client with their secret
//! appended as a query parameter.
//!
//! Every HTTP status is returned as a [`TransportResponse`]; only network,
//! DNS, TLS and timeout failures become [`FetchError::Transport`].

use crate::core::{
    FetchError, FetchRequest, HttpMethod, Resource, ResourceKind, Transport, TransportResponse,
};
use crate::transport::config::HttpTransportConfig;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

/// HTTP transport over `reqwest`.
///
/// # Example
///
/// ```rust,ignore
/// use patentbridge::transport::{HttpTransport, HttpTransportConfig};
/// use std::time::Duration;
///
/// let transport = HttpTransport::new(
///     HttpTransportConfig::default().with_timeout(Duration::from_secs(20)),
/// )?;
/// ```
#[derive(Debug)]
pub struct HttpTransport {
    config: HttpTransportConfig,
    direct: reqwest::Client,
    proxied: Mutex<HashMap<Resource, reqwest::Client>>,
}

impl HttpTransport {
    /// Creates a transport with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Configuration`] if the client cannot be built.
    pub fn new(config: HttpTransportConfig) -> Result<Self, FetchError> {
        let direct = build_client(&config, None)?;
        Ok(Self {
            config,
            direct,
            proxied: Mutex::new(HashMap::new()),
        })
    }

    /// Creates a transport with default configuration.
    pub fn with_defaults() -> Result<Self, FetchError> {
        Self::new(HttpTransportConfig::default())
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }

    /// Returns the number of cached proxy clients.
    pub fn cached_clients(&self) -> usize {
        self.proxied
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    fn client_for(&self, resource: &Resource) -> Result<reqwest::Client, FetchError> {
        let mut cache = self
            .proxied
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(client) = cache.get(resource) {
            return Ok(client.clone());
        }

        let client = build_client(&self.config, Some(resource))?;
        cache.insert(resource.clone(), client.clone());
        tracing::debug!(resource = %resource, "Built proxy client");
        Ok(client)
    }

    /// Default headers, then User-Agent, then strategy headers. A later
    /// header replaces an earlier one with the same name.
    fn merged_headers<'a>(&'a self, request: &'a FetchRequest) -> Vec<(&'a str, &'a str)> {
        let mut headers: Vec<(&str, &str)> = Vec::new();
        let agent = self.user_agent().map(|agent| ("User-Agent", agent));
        let layers = self
            .config
            .default_headers
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_str()))
            .chain(agent)
            .chain(request.headers.iter().map(|(n, v)| (n.as_str(), v.as_str())));

        for (name, value) in layers {
            headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
            headers.push((name, value));
        }
        headers
    }

    fn user_agent(&self) -> Option<&str> {
        match self.config.user_agents.len() {
            0 => None,
            n => Some(&self.config.user_agents[rand::rng().random_range(0..n)]),
        }
    }
}

fn build_client(
    config: &HttpTransportConfig,
    proxy: Option<&Resource>,
) -> Result<reqwest::Client, FetchError> {
    let redirect = match config.max_redirects {
        0 => reqwest::redirect::Policy::none(),
        n => reqwest::redirect::Policy::limited(n),
    };

    let mut builder = reqwest::Client::builder()
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .redirect(redirect);

    if let Some(resource) = proxy {
        let url = resource.proxy_url().ok_or_else(|| {
            FetchError::configuration(format!("resource '{resource}' is not a proxy"))
        })?;
        let proxy = reqwest::Proxy::all(url).map_err(|e| {
            FetchError::configuration(format!("invalid proxy '{resource}': {e}"))
        })?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| FetchError::configuration(format!("Failed to create HTTP client: {e}")))
}

/// Parses a `Retry-After` value: delay-seconds or an HTTP date.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let wait = date.with_timezone(&Utc) - Utc::now();
    Some(wait.to_std().unwrap_or(Duration::ZERO))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: &FetchRequest,
        resource: Option<&Resource>,
    ) -> Result<TransportResponse, FetchError> {
        let label = resource.map_or_else(|| "direct".to_string(), Resource::label);

        let mut url = Url::parse(&request.url)
            .map_err(|e| FetchError::transport(&label, format!("invalid URL: {e}")))?;

        let client = match resource {
            Some(r) if r.kind() == ResourceKind::Proxy => self.client_for(r)?,
            Some(r) => {
                if let Some((_, secret)) = r.credential_parts() {
                    url.query_pairs_mut()
                        .append_pair(&self.config.credential_param, secret);
                }
                self.direct.clone()
            }
            None => self.direct.clone(),
        };

        let mut builder = match request.method {
            HttpMethod::Get => client.get(url),
            HttpMethod::Post => client.post(url),
        };
        for (name, value) in self.merged_headers(request) {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| FetchError::transport(&label, e.without_url().to_string()))?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::transport(&label, e.without_url().to_string()))?;

        tracing::trace!(status, resource = %label, bytes = body.len(), "HTTP round-trip");

        Ok(TransportResponse {
            status,
            body,
            retry_after,
        })
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
        assert_eq!(parse_retry_after(" 5 "), Some(Duration::from_secs(5)));
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"),
            Some(Duration::ZERO)
        );
        assert_eq!(parse_retry_after("soon"), None);
    }

    #[tokio::test]
    async fn test_http_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/search")
            .match_query(Matcher::UrlEncoded("q".into(), "aspirin patent".into()))
            .match_header("accept-language", "en-US,en;q=0.9")
            .match_header("user-agent", Matcher::Regex("Mozilla/5.0".into()))
            .with_status(200)
            .with_body("<td>WO2016162604</td>")
            .create_async()
            .await;

        let transport = HttpTransport::with_defaults().unwrap();
        let request = FetchRequest::get(format!("{}/search?q=aspirin+patent", server.url()));
        let response = transport.send(&request, None).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, "<td>WO2016162604</td>");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_status_is_not_an_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/down")
            .with_status(503)
            .create_async()
            .await;

        let transport = HttpTransport::with_defaults().unwrap();
        let request = FetchRequest::get(format!("{}/down", server.url()));
        let response = transport.send(&request, None).await.unwrap();
        assert_eq!(response.status, 503);
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_http_rate_limit_carries_retry_after() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/limited")
            .with_status(429)
            .with_header("retry-after", "7")
            .create_async()
            .await;

        let transport = HttpTransport::with_defaults().unwrap();
        let request = FetchRequest::get(format!("{}/limited", server.url()));
        let response = transport.send(&request, None).await.unwrap();
        assert!(response.is_rate_limited());
        assert_eq!(response.retry_after, Some(Duration::from_secs(7)));
    }

    #[tokio::test]
    async fn test_http_credential_is_sent_as_query_param() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/search")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "x".into()),
                Matcher::UrlEncoded("api_key".into(), "bc20bca64032a7ac".into()),
            ]))
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await;

        let transport = HttpTransport::with_defaults().unwrap();
        let key = Resource::credential("serpapi", "bc20bca64032a7ac");
        let request = FetchRequest::get(format!("{}/search?q=x", server.url()));
        let response = transport.send(&request, Some(&key)).await.unwrap();

        assert_eq!(response.body, "ok");
        assert_eq!(transport.cached_clients(), 0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_strategy_headers_override_defaults() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/json")
            .match_header("accept", "application/json")
            .with_status(200)
            .create_async()
            .await;

        let transport = HttpTransport::new(
            HttpTransportConfig::default().with_user_agents(["patentbridge-test"]),
        )
        .unwrap();
        let request = FetchRequest::get(format!("{}/json", server.url()))
            .with_header("Accept", "application/json");
        transport.send(&request, None).await.unwrap();
        mock.assert_async().await;
    }

    #[test]
    fn test_merged_headers_replace_by_name() {
        let transport = HttpTransport::new(
            HttpTransportConfig::default().with_user_agents(["agent-a"]),
        )
        .unwrap();
        let request = FetchRequest::get("https://example.com")
            .with_header("accept", "application/json")
            .with_header("User-Agent", "agent-b");

        let headers = transport.merged_headers(&request);
        let accept: Vec<_> = headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case("accept"))
            .collect();
        assert_eq!(accept, vec![&("accept", "application/json")]);
        assert!(headers.contains(&("User-Agent", "agent-b")));
        assert!(!headers.contains(&("User-Agent", "agent-a")));
        assert!(headers.contains(&("DNT", "1")));
    }

    #[tokio::test]
    async fn test_http_connection_failure_is_transport_error() {
        let transport = HttpTransport::new(
            HttpTransportConfig::default().with_connect_timeout(Duration::from_millis(200)),
        )
        .unwrap();
        // Port 9 (discard) on localhost is closed in test environments.
        let request = FetchRequest::get("http://127.0.0.1:9/");
        let err = transport.send(&request, None).await.unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }));
        assert!(err.counts_against_resource());
    }

    #[tokio::test]
    async fn test_proxy_clients_are_cached() {
        let transport = HttpTransport::with_defaults().unwrap();
        let proxy = Resource::new("http://127.0.0.1:9");
        transport.client_for(&proxy).unwrap();
        transport.client_for(&proxy).unwrap();
        assert_eq!(transport.cached_clients(), 1);
    }
}

//! Plain-HTTP page driver
//!
//! This module handles all page loads for the crawler, including:
//! - Building HTTP clients with the configured user agent, optionally
//!   routed through a proxy
//! - Sending initial cookies with every request
//! - Classifying responses into [`PageError`]s
//!
//! Pages are not rendered: network-idle waits resolve immediately, there
//! are no cookie modals to close and no screenshots.

use crate::crawler::driver::{is_blocked_status, NavigationContext, PageDriver, PageError, PageSession};
use crate::crawler::parser::{extract_links, inner_html, is_html_content_type, parse_selector};
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, COOKIE};
use reqwest::{Client, Proxy};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The `User-Agent` header value
/// * `timeout` - Total time allowed for one request
/// * `proxy` - Proxy URL to route every request through
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client, e.g. an invalid proxy URL
///
/// # Example
///
/// ```
/// use gleaner::crawler::build_http_client;
/// use std::time::Duration;
///
/// let client = build_http_client("gleaner/1.0", Duration::from_secs(60), None).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &str,
    timeout: Duration,
    proxy: Option<&str>,
) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = proxy {
        builder = builder.proxy(Proxy::all(proxy)?);
    }

    builder.build()
}

/// Loads pages with a plain GET request
pub struct HttpPageDriver {
    user_agent: String,
    direct: Client,
    proxied: Mutex<HashMap<String, Client>>,
}

impl HttpPageDriver {
    /// Creates a driver; `navigation_timeout` bounds each request
    pub fn new(user_agent: &str, navigation_timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            user_agent: user_agent.to_string(),
            direct: build_http_client(user_agent, navigation_timeout, None)?,
            proxied: Mutex::new(HashMap::new()),
        })
    }

    /// Returns the client for the context's proxy, building it on first use
    fn client_for(&self, context: &NavigationContext) -> Result<Client, PageError> {
        let Some(proxy) = context.proxy.as_deref() else {
            return Ok(self.direct.clone());
        };

        let mut clients = self
            .proxied
            .lock()
            .map_err(|e| PageError::Failed(format!("Proxy client cache poisoned: {}", e)))?;

        if let Some(client) = clients.get(proxy) {
            return Ok(client.clone());
        }

        let client = build_http_client(&self.user_agent, context.timeout, Some(proxy))
            .map_err(|e| PageError::RunFatal(format!("Invalid proxy {}: {}", proxy, e)))?;
        clients.insert(proxy.to_string(), client.clone());
        Ok(client)
    }
}

#[async_trait]
impl PageDriver for HttpPageDriver {
    /// Fetches the page
    ///
    /// # Response Classification
    ///
    /// | Condition | Result |
    /// |-----------|--------|
    /// | HTTP 401, 403, 429, 503 | `Blocked` (retried) |
    /// | Other HTTP 4xx | `UserFacing` |
    /// | HTTP 5xx | `Transient` (retried) |
    /// | Timeout, connection error | `Transient` (retried) |
    /// | Content-Type not HTML | `UserFacing` |
    async fn open(
        &self,
        url: &str,
        context: &NavigationContext,
    ) -> Result<Box<dyn PageSession>, PageError> {
        let parsed = Url::parse(url).map_err(|e| PageError::UserFacing(format!("Invalid URL {}: {}", url, e)))?;
        let client = self.client_for(context)?;

        let mut request = client.get(parsed.clone()).timeout(context.timeout);
        if let Some(cookies) = context.cookie_header(&parsed) {
            request = request.header(COOKIE, cookies);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                PageError::Transient(format!("Navigation timed out after {} seconds", context.timeout.as_secs()))
            } else if e.is_connect() {
                PageError::Transient(format!("Connection failed: {}", e))
            } else {
                PageError::Transient(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        if is_blocked_status(status) {
            return Err(PageError::Blocked { status });
        }
        if response.status().is_client_error() {
            return Err(PageError::UserFacing(format!(
                "Page {} returned HTTP status {}",
                url, status
            )));
        }
        if response.status().is_server_error() {
            return Err(PageError::Transient(format!(
                "Page {} returned HTTP status {}",
                url, status
            )));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !is_html_content_type(&content_type) {
            return Err(PageError::UserFacing(format!(
                "Page {} is not an HTML page (Content-Type: {})",
                url,
                if content_type.is_empty() { "none" } else { &content_type }
            )));
        }

        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| PageError::Transient(format!("Failed to read body of {}: {}", url, e)))?;

        tracing::debug!(url = %final_url, status, bytes = body.len(), "Page loaded");

        Ok(Box::new(HttpPageSession {
            url: final_url,
            body,
        }))
    }
}

/// A page fetched by [`HttpPageDriver`]
///
/// Markup is parsed per query; parsed documents are not `Send`.
struct HttpPageSession {
    url: Url,
    body: String,
}

#[async_trait]
impl PageSession for HttpPageSession {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn content(&self) -> Result<String, PageError> {
        Ok(self.body.clone())
    }

    async fn query_inner_html(&self, selector: &str) -> Result<Option<String>, PageError> {
        inner_html(&self.body, selector).map_err(PageError::Failed)
    }

    async fn link_hrefs(&self, selector: &str) -> Result<Vec<String>, PageError> {
        extract_links(&self.body, &self.url, selector).map_err(PageError::Failed)
    }

    async fn validate_selector(&self, selector: &str) -> Result<(), PageError> {
        parse_selector(selector).map(|_| ()).map_err(PageError::RunFatal)
    }

    async fn wait_for_network_idle(&self, _timeout: Duration) -> Result<(), PageError> {
        Ok(())
    }

    async fn close_cookie_modals(&self) -> Result<(), PageError> {
        Ok(())
    }

    async fn screenshot(&self) -> Result<Option<Vec<u8>>, PageError> {
        Ok(None)
    }
}

//! Page driver abstraction
//!
//! A [`PageDriver`] navigates to a URL and hands back a [`PageSession`]
//! that the page pipeline queries for markup, links and snapshots. The
//! crate ships [`HttpPageDriver`](super::HttpPageDriver); a browser-backed
//! driver plugs in through the same two traits.

use crate::config::CookieEntry;
use crate::content::ContentError;
use crate::output::OutputError;
use crate::state::LimitReached;
use crate::storage::StorageError;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Response codes that mean the site refused to serve the page
pub const BLOCKED_STATUS_CODES: [u16; 4] = [401, 403, 429, 503];

/// Returns true if the status code means the request was blocked
pub fn is_blocked_status(status: u16) -> bool {
    BLOCKED_STATUS_CODES.contains(&status)
}

/// Errors raised while handling a single page
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageError {
    /// The page budget is used up; ends the task quietly
    #[error(transparent)]
    LimitReached(#[from] LimitReached),

    /// Reported to the user as the page's answer
    #[error("{0}")]
    UserFacing(String),

    /// Ends the whole crawl run
    #[error("{0}")]
    RunFatal(String),

    #[error("Request handler timed out after {0} seconds")]
    Timeout(u64),

    #[error("Blocked. Response status code: {status}")]
    Blocked { status: u16 },

    /// Network failure or server error that may go away on retry
    #[error("{0}")]
    Transient(String),

    /// Page-fatal failure; not retried
    #[error("{0}")]
    Failed(String),
}

impl PageError {
    /// Whether the driver should run the task again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Blocked { .. } | Self::Transient(_)
        )
    }

    pub fn is_limit_reached(&self) -> bool {
        matches!(self, Self::LimitReached(_))
    }
}

impl From<ContentError> for PageError {
    fn from(e: ContentError) -> Self {
        Self::Failed(e.to_string())
    }
}

impl From<StorageError> for PageError {
    fn from(e: StorageError) -> Self {
        Self::Failed(e.to_string())
    }
}

impl From<OutputError> for PageError {
    fn from(e: OutputError) -> Self {
        Self::Failed(e.to_string())
    }
}

/// Per-navigation settings filled in by the pre-navigation hooks
#[derive(Debug, Clone)]
pub struct NavigationContext {
    /// Proxy URL to route the request through
    pub proxy: Option<String>,

    /// Cookies sent with the request
    pub cookies: Vec<CookieEntry>,

    /// Upper bound for loading the page
    pub timeout: Duration,
}

impl NavigationContext {
    pub fn new(timeout: Duration) -> Self {
        Self {
            proxy: None,
            cookies: Vec::new(),
            timeout,
        }
    }

    /// Builds the `Cookie` header value for `url`
    ///
    /// Cookies scoped to another domain or path are left out. Returns `None`
    /// when no cookie applies.
    ///
    /// # Examples
    ///
    /// ```
    /// use gleaner::config::CookieEntry;
    /// use gleaner::crawler::NavigationContext;
    /// use std::time::Duration;
    /// use url::Url;
    ///
    /// let mut context = NavigationContext::new(Duration::from_secs(30));
    /// context.cookies.push(CookieEntry {
    ///     name: "consent".to_string(),
    ///     value: "yes".to_string(),
    ///     domain: Some(".example.com".to_string()),
    ///     path: None,
    /// });
    ///
    /// let url = Url::parse("https://www.example.com/").unwrap();
    /// assert_eq!(context.cookie_header(&url).as_deref(), Some("consent=yes"));
    ///
    /// let other = Url::parse("https://other.org/").unwrap();
    /// assert_eq!(context.cookie_header(&other), None);
    /// ```
    pub fn cookie_header(&self, url: &Url) -> Option<String> {
        let host = url.host_str().unwrap_or_default().to_lowercase();

        let pairs: Vec<String> = self
            .cookies
            .iter()
            .filter(|cookie| cookie_applies(cookie, &host, url.path()))
            .map(|cookie| format!("{}={}", cookie.name, cookie.value))
            .collect();

        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }
}

fn cookie_applies(cookie: &CookieEntry, host: &str, path: &str) -> bool {
    let domain_ok = match &cookie.domain {
        None => true,
        Some(domain) => {
            let domain = domain.trim_start_matches('.').to_lowercase();
            host == domain || host.ends_with(&format!(".{}", domain))
        }
    };
    let path_ok = cookie
        .path
        .as_deref()
        .map_or(true, |prefix| path.starts_with(prefix));

    domain_ok && path_ok
}

/// Opens pages
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigates to `url`
    ///
    /// # Returns
    ///
    /// * `Ok(session)` - The page loaded and can be queried
    /// * `Err(PageError::Blocked)` - The site answered with a blocked status
    /// * `Err(PageError::UserFacing)` - The URL cannot be processed (not HTML, 404, ...)
    /// * `Err(PageError::Transient)` - Network failure or server error
    async fn open(
        &self,
        url: &str,
        context: &NavigationContext,
    ) -> Result<Box<dyn PageSession>, PageError>;
}

/// A loaded page
#[async_trait]
pub trait PageSession: Send + Sync {
    /// URL the page was loaded from, after redirects
    fn url(&self) -> &str;

    /// Full page markup
    async fn content(&self) -> Result<String, PageError>;

    /// Inner HTML of the first element matching `selector`, `None` if nothing matches
    async fn query_inner_html(&self, selector: &str) -> Result<Option<String>, PageError>;

    /// Absolute URLs of the links matched by `selector`
    async fn link_hrefs(&self, selector: &str) -> Result<Vec<String>, PageError>;

    /// Fails with `PageError::RunFatal` if `selector` is not valid CSS
    async fn validate_selector(&self, selector: &str) -> Result<(), PageError>;

    /// Resolves once the page stops loading resources, or after `timeout`
    async fn wait_for_network_idle(&self, timeout: Duration) -> Result<(), PageError>;

    /// Dismisses cookie consent dialogs, if the driver can
    async fn close_cookie_modals(&self) -> Result<(), PageError>;

    /// JPEG screenshot, `None` if the driver cannot render pages
    async fn screenshot(&self) -> Result<Option<Vec<u8>>, PageError>;
}

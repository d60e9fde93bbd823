use crate::UrlError;
use url::Url;

/// Query parameters dropped when computing a unique key
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid"];

/// Computes the deduplication key for a URL
///
/// Two URLs that differ only cosmetically map to the same key, so the
/// request queue never holds both.
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject malformed input and non-HTTP(S) schemes
/// 2. Lowercase the host
/// 3. Remove the fragment
/// 4. Remove tracking query parameters (`utm_*`, `fbclid`, ...)
/// 5. Sort remaining query parameters by key
/// 6. Remove a trailing slash from non-root paths
///
/// # Examples
///
/// ```
/// use gleaner::url::unique_key;
///
/// let key = unique_key("https://Example.com/docs/?b=2&a=1&utm_source=x#intro").unwrap();
/// assert_eq!(key, "https://example.com/docs?a=1&b=2");
/// ```
pub fn unique_key(url_str: &str) -> Result<String, UrlError> {
    let mut url = normalize_url(url_str)?;

    // `Url` always renders the root path as "/", strip it only past the root
    if url.path().len() > 1 && url.path().ends_with('/') {
        let trimmed = url.path().trim_end_matches('/').to_string();
        url.set_path(&trimmed);
    }

    Ok(url.to_string())
}

/// Normalizes a URL for crawling
///
/// Unlike [`unique_key`], the result is a [`Url`] that is still safe to
/// navigate to; trailing slashes are kept because servers may treat
/// `/docs` and `/docs/` differently.
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    let host = url.host_str().ok_or(UrlError::MissingDomain)?.to_lowercase();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;

    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    Ok(url)
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    params.sort_by(|a, b| a.0.cmp(&b.0));

    params
}

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}

use crate::content::ContentError;
use kuchiki::traits::TendrilSink;
use kuchiki::NodeRef;
use once_cell::sync::Lazy;
use regex::Regex;

/// Elements that never carry readable content
const ALWAYS_REMOVED: &str = "script, style, noscript";

static MULTI_WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s{2,}").expect("Invalid whitespace regex"));
static INTER_TAG_WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r">\s+<").expect("Invalid inter-tag regex"));

/// Options controlling [`shrink_html`]
#[derive(Debug, Clone, Default)]
pub struct ShrinkOptions {
    /// CSS selector group; every matching element is removed
    pub remove_selector: Option<String>,

    /// Strip `href` from links while keeping the link text
    pub remove_link_hrefs: bool,
}

/// Shrinks page markup before it is sent to the model
///
/// # Steps
///
/// 1. Parse the markup into a mutable DOM
/// 2. Remove `script`, `style`, `noscript` and anything matching
///    `options.remove_selector`
/// 3. Optionally strip link targets
/// 4. Serialize the `<html>` element (dropping any doctype)
/// 5. Collapse whitespace runs and whitespace between tags
///
/// Shrinking already-shrunk markup returns it unchanged.
///
/// # Errors
///
/// Returns [`ContentError::InvalidSelector`] if `remove_selector` cannot be
/// parsed.
///
/// # Examples
///
/// ```
/// use gleaner::content::{shrink_html, ShrinkOptions};
///
/// let html = "<!DOCTYPE html><html><body>  <p>Hi   there</p><script>x()</script></body></html>";
/// let shrunk = shrink_html(html, &ShrinkOptions::default()).unwrap();
/// assert_eq!(shrunk, "<html><head></head><body><p>Hi there</p></body></html>");
/// ```
pub fn shrink_html(html: &str, options: &ShrinkOptions) -> Result<String, ContentError> {
    let document = kuchiki::parse_html().one(html);

    remove_matching(&document, ALWAYS_REMOVED)?;
    if let Some(selector) = options
        .remove_selector
        .as_deref()
        .filter(|s| !s.trim().is_empty())
    {
        remove_matching(&document, selector)?;
    }

    if options.remove_link_hrefs {
        let links = document
            .select("a[href]")
            .map_err(|()| ContentError::InvalidSelector("a[href]".to_string()))?;
        for link in links {
            link.attributes.borrow_mut().remove("href");
        }
    }

    let root = document
        .select_first("html")
        .map_err(|()| ContentError::Serialize("document has no <html> element".to_string()))?;

    let mut output = Vec::new();
    root.as_node()
        .serialize(&mut output)
        .map_err(|e| ContentError::Serialize(e.to_string()))?;
    let markup =
        String::from_utf8(output).map_err(|e| ContentError::Serialize(e.to_string()))?;

    Ok(collapse_whitespace(&markup))
}

/// Checks that `selector` can be used as a remove selector
///
/// Compiles it with the same engine [`shrink_html`] uses, which supports
/// fewer selectors than the page-level CSS parser.
///
/// # Examples
///
/// ```
/// use gleaner::content::validate_remove_selector;
///
/// assert!(validate_remove_selector("nav, footer, .ad").is_ok());
/// assert!(validate_remove_selector("nav[").is_err());
/// ```
pub fn validate_remove_selector(selector: &str) -> Result<(), ContentError> {
    kuchiki::Selectors::compile(selector)
        .map(|_| ())
        .map_err(|()| ContentError::InvalidSelector(selector.to_string()))
}

/// Detaches every node matching `selector`
fn remove_matching(document: &NodeRef, selector: &str) -> Result<(), ContentError> {
    // Collect first, detaching while iterating would skip siblings
    let matches: Vec<_> = document
        .select(selector)
        .map_err(|()| ContentError::InvalidSelector(selector.to_string()))?
        .collect();

    for node in matches {
        node.as_node().detach();
    }

    Ok(())
}

fn collapse_whitespace(markup: &str) -> String {
    let collapsed = MULTI_WHITESPACE.replace_all(markup, " ");
    INTER_TAG_WHITESPACE.replace_all(&collapsed, "><").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn opts() -> ShrinkOptions {
        ShrinkOptions::default()
    }

    #[test]
    fn test_validate_remove_selector() {
        assert!(validate_remove_selector("script, .cookie-banner > div").is_ok());
        assert!(matches!(
            validate_remove_selector("p:not(.a .b)"),
            Err(ContentError::InvalidSelector(s)) if s == "p:not(.a .b)"
        ));
        assert!(shrink_html(
            "<html><body><p>x</p></body></html>",
            &ShrinkOptions {
                remove_selector: Some("p:not(.a .b)".to_string()),
                remove_link_hrefs: false,
            }
        )
        .is_err());
    }

    #[test]
    fn test_collapses_whitespace() {
        let html = "<html>   <head>      <title>Title1     end</title> </head> <body> <p>text    1   </p> </body></html>";
        let shrunk = shrink_html(html, &opts()).unwrap();
        assert_eq!(
            shrunk,
            "<html><head><title>Title1 end</title></head><body><p>text 1 </p></body></html>"
        );
    }

    #[test]
    fn test_drops_doctype() {
        let html = "<!DOCTYPE html><html><head></head><body><p>x</p></body></html>";
        let shrunk = shrink_html(html, &opts()).unwrap();
        assert!(!shrunk.to_lowercase().contains("doctype"));
        assert!(shrunk.starts_with("<html>"));
    }

    #[test]
    fn test_removes_scripts_and_styles() {
        let html = r#"<html><head><style>p{}</style></head><body><script>alert(1)</script><noscript>no</noscript><p>keep</p></body></html>"#;
        let shrunk = shrink_html(html, &opts()).unwrap();
        assert!(!shrunk.contains("alert"));
        assert!(!shrunk.contains("p{}"));
        assert!(!shrunk.contains("noscript"));
        assert!(shrunk.contains("<p>keep</p>"));
    }

    #[test]
    fn test_removes_caller_selectors() {
        let html = r#"<html><body><div class="remove">ad</div><nav>menu</nav><p>body</p></body></html>"#;
        let options = ShrinkOptions {
            remove_selector: Some(".remove, nav".to_string()),
            remove_link_hrefs: false,
        };
        let shrunk = shrink_html(html, &options).unwrap();
        assert_eq!(shrunk, "<html><head></head><body><p>body</p></body></html>");
    }

    #[test]
    fn test_strips_link_hrefs() {
        let html = r#"<html><body><a href="https://example.com">Link</a></body></html>"#;
        let options = ShrinkOptions {
            remove_selector: None,
            remove_link_hrefs: true,
        };
        let shrunk = shrink_html(html, &options).unwrap();
        assert!(shrunk.contains("<a>Link</a>"));
    }

    #[test]
    fn test_keeps_link_hrefs_by_default() {
        let html = r#"<html><body><a href="https://example.com">Link</a></body></html>"#;
        let shrunk = shrink_html(html, &opts()).unwrap();
        assert!(shrunk.contains(r#"<a href="https://example.com">Link</a>"#));
    }

    #[test]
    fn test_invalid_selector() {
        let options = ShrinkOptions {
            remove_selector: Some("div[".to_string()),
            remove_link_hrefs: false,
        };
        let result = shrink_html("<p>x</p>", &options);
        assert!(matches!(result, Err(ContentError::InvalidSelector(_))));
    }

    #[test]
    fn test_shrink_is_idempotent() {
        let html = r#"<!doctype html><html> <head><title> A </title></head>
            <body>  <div class="x"> <p>one   two</p>
            <ul> <li>a</li>  <li>b</li> </ul></div> <a href="/y">y</a></body></html>"#;
        let options = ShrinkOptions {
            remove_selector: Some(".x ul".to_string()),
            remove_link_hrefs: true,
        };
        let once = shrink_html(html, &options).unwrap();
        let twice = shrink_html(&once, &options).unwrap();
        assert_eq!(once, twice);
    }

    proptest! {
        #[test]
        fn prop_whitespace_collapse_is_idempotent(
            words in proptest::collection::vec("[a-z]{1,8}", 1..20),
            gaps in proptest::collection::vec(" {1,5}", 1..20),
        ) {
            let body: String = words
                .iter()
                .zip(gaps.iter().cycle())
                .map(|(w, g)| format!("<p>{}{}</p>{}", g, w, g))
                .collect();
            let html = format!("<html><body>{}</body></html>", body);

            let once = shrink_html(&html, &opts()).unwrap();
            let twice = shrink_html(&once, &opts()).unwrap();
            prop_assert_eq!(once, twice);
        }
    }
}

use crate::content::ContentError;
use serde::Deserialize;

/// Format of the page content sent to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageFormat {
    /// Shrunk HTML markup
    Html,

    /// Markdown rendering of the shrunk markup
    #[default]
    Markdown,
}

impl PageFormat {
    /// File extension used for saved sent-content artifacts
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Markdown => "md",
        }
    }

    /// MIME type used for saved sent-content artifacts
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Html => "text/html; charset=utf-8",
            Self::Markdown => "text/markdown; charset=utf-8",
        }
    }
}

/// Converts shrunk markup into the requested page format
///
/// Markdown conversion keeps link URLs, headings and lists and drops
/// styling.
pub fn to_page_format(html: &str, format: PageFormat) -> Result<String, ContentError> {
    match format {
        PageFormat::Html => Ok(html.to_string()),
        PageFormat::Markdown => {
            htmd::convert(html).map_err(|e| ContentError::Markdown(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head></head><body><h1>Pricing</h1><p>See the <a href="https://example.com/docs">docs</a>.</p><ul><li>Free tier</li><li>Pro tier</li></ul><p><span style="color:red">Red</span></p></body></html>"#;

    #[test]
    fn test_html_passthrough() {
        assert_eq!(to_page_format(PAGE, PageFormat::Html).unwrap(), PAGE);
    }

    #[test]
    fn test_markdown_keeps_structure() {
        let md = to_page_format(PAGE, PageFormat::Markdown).unwrap();

        assert!(md.contains("Pricing"));
        assert!(md.contains("[docs](https://example.com/docs)"));
        assert!(md.contains("Free tier"));
        assert!(md.contains("Pro tier"));
        assert!(md.contains("Red"));
        assert!(!md.contains("<h1>"));
        assert!(!md.contains("color:red"));
    }

    #[test]
    fn test_format_metadata() {
        assert_eq!(PageFormat::default(), PageFormat::Markdown);
        assert_eq!(PageFormat::Markdown.extension(), "md");
        assert_eq!(PageFormat::Html.extension(), "html");
    }

    #[test]
    fn test_format_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            format: PageFormat,
        }
        let parsed: Wrapper = toml::from_str(r#"format = "html""#).unwrap();
        assert_eq!(parsed.format, PageFormat::Html);
    }
}

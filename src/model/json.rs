use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static BRACED_OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("Invalid braced object regex"));

/// Best-effort extraction of a JSON value from model output
///
/// The whole string is tried first; failing that, the widest
/// brace-delimited substring is parsed. Returns `None` when neither works.
///
/// # Examples
///
/// ```
/// use gleaner::model::try_parse_json_from_str;
/// use serde_json::json;
///
/// let answer = "Sure! Here it is: {\"title\": \"Pricing\"} Hope that helps.";
/// assert_eq!(try_parse_json_from_str(answer), Some(json!({"title": "Pricing"})));
/// assert_eq!(try_parse_json_from_str("no json here"), None);
/// ```
pub fn try_parse_json_from_str(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Some(value);
    }

    let candidate = BRACED_OBJECT.find(text)?;
    serde_json::from_str::<Value>(candidate.as_str()).ok()
}

//! Dataset record shapes
//!
//! Serialized field names are part of the output format and must not change.

use crate::model::UsageStats;
use serde::Serialize;
use serde_json::Value;

/// Debug block attached to every result record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultDebug {
    pub model_name: String,

    /// Cumulative usage of the run at the time the record was written
    pub model_stats: UsageStats,
}

/// The answer extracted from one page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub url: String,
    pub answer: String,
    pub json_answer: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_snapshot_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_content_url: Option<String>,

    #[serde(rename = "#debug")]
    pub debug: ResultDebug,
}

/// A page that failed with an error meant for the user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoftErrorRecord {
    pub url: String,

    /// `ERROR: <message>`
    pub answer: String,
}

impl SoftErrorRecord {
    pub fn new(url: impl Into<String>, message: &str) -> Self {
        Self {
            url: url.into(),
            answer: format!("ERROR: {}", message),
        }
    }
}

/// Request details of a failed page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureDebug {
    pub request_id: String,
    pub url: String,
    pub unique_key: String,
    pub retry_count: u32,
    pub error_messages: Vec<String>,
}

/// A page that failed on every allowed attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureRecord {
    #[serde(rename = "#error")]
    pub error: bool,

    #[serde(rename = "#debug")]
    pub debug: FailureDebug,
}

impl FailureRecord {
    pub fn new(debug: FailureDebug) -> Self {
        Self { error: true, debug }
    }
}

/// Any record written to the dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutputRecord {
    Result(ResultRecord),
    SoftError(SoftErrorRecord),
    Failure(FailureRecord),
}

impl OutputRecord {
    /// URL of the page the record is about
    pub fn url(&self) -> &str {
        match self {
            Self::Result(r) => &r.url,
            Self::SoftError(r) => &r.url,
            Self::Failure(r) => &r.debug.url,
        }
    }
}

impl From<ResultRecord> for OutputRecord {
    fn from(record: ResultRecord) -> Self {
        Self::Result(record)
    }
}

impl From<SoftErrorRecord> for OutputRecord {
    fn from(record: SoftErrorRecord) -> Self {
        Self::SoftError(record)
    }
}

impl From<FailureRecord> for OutputRecord {
    fn from(record: FailureRecord) -> Self {
        Self::Failure(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_result_record_field_names() {
        let record = ResultRecord {
            url: "https://example.com/".to_string(),
            answer: "Hello".to_string(),
            json_answer: Some(json!({"title": "Hello"})),
            html_snapshot_url: Some("file:///s/1.html".to_string()),
            screenshot_url: None,
            sent_content_url: Some("file:///s/1-sentContent.md".to_string()),
            debug: ResultDebug {
                model_name: "gpt-4".to_string(),
                model_stats: UsageStats::default(),
            },
        };

        let value = serde_json::to_value(OutputRecord::from(record)).unwrap();

        assert_eq!(value["url"], "https://example.com/");
        assert_eq!(value["jsonAnswer"]["title"], "Hello");
        assert_eq!(value["htmlSnapshotUrl"], "file:///s/1.html");
        assert!(value.get("screenshotUrl").is_none());
        assert_eq!(value["sentContentUrl"], "file:///s/1-sentContent.md");
        assert_eq!(value["#debug"]["modelName"], "gpt-4");
        assert_eq!(value["#debug"]["modelStats"]["apiCallsCount"], 0);
    }

    #[test]
    fn test_missing_json_answer_is_null() {
        let record = ResultRecord {
            url: "https://example.com/".to_string(),
            answer: "plain".to_string(),
            json_answer: None,
            html_snapshot_url: None,
            screenshot_url: None,
            sent_content_url: None,
            debug: ResultDebug {
                model_name: "gpt-4".to_string(),
                model_stats: UsageStats::default(),
            },
        };

        let value = serde_json::to_value(&record).unwrap();
        assert!(value["jsonAnswer"].is_null());
    }

    #[test]
    fn test_soft_error_record() {
        let record = SoftErrorRecord::new("https://example.com/x", "HTTP 404 Not Found");
        let value = serde_json::to_value(OutputRecord::from(record)).unwrap();

        assert_eq!(
            value,
            json!({"url": "https://example.com/x", "answer": "ERROR: HTTP 404 Not Found"})
        );
    }

    #[test]
    fn test_failure_record() {
        let record = FailureRecord::new(FailureDebug {
            request_id: "abc".to_string(),
            url: "https://example.com/y".to_string(),
            unique_key: "https://example.com/y".to_string(),
            retry_count: 3,
            error_messages: vec!["timeout".to_string()],
        });
        let output = OutputRecord::from(record);
        assert_eq!(output.url(), "https://example.com/y");

        let value = serde_json::to_value(output).unwrap();
        assert_eq!(value["#error"], true);
        assert_eq!(value["#debug"]["requestId"], "abc");
        assert_eq!(value["#debug"]["retryCount"], 3);
        assert_eq!(value["#debug"]["errorMessages"][0], "timeout");
    }
}

use crate::content::PageFormat;
use serde::Deserialize;

/// Main configuration structure for Gleaner
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub content: ContentConfig,
    pub model: ModelOptions,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// What to crawl and how far
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    /// Seed URLs, crawled at depth 0
    #[serde(rename = "start-urls")]
    pub start_urls: Vec<String>,

    /// CSS selector for links to follow; no link discovery when unset
    #[serde(rename = "link-selector")]
    pub link_selector: Option<String>,

    /// Discovered links must match one of these globs
    #[serde(rename = "include-url-globs", default)]
    pub include_url_globs: Vec<String>,

    /// Discovered links matching any of these globs are dropped
    #[serde(rename = "exclude-url-globs", default)]
    pub exclude_url_globs: Vec<String>,

    /// Pages matching these globs are used for link discovery only
    #[serde(rename = "skip-extraction-globs", default)]
    pub skip_extraction_globs: Vec<String>,

    /// Deprecated alias of `include-url-globs`
    #[serde(default)]
    pub globs: Option<Vec<String>>,

    /// Maximum pages to open, 0 for unlimited
    #[serde(rename = "max-pages-per-crawl", default)]
    pub max_pages_per_crawl: u64,

    /// Maximum link depth from a seed, 0 for unlimited
    #[serde(rename = "max-crawling-depth", default)]
    pub max_crawling_depth: u32,

    /// Upper bound on waiting for dynamic content after load (seconds)
    #[serde(rename = "dynamic-content-wait-secs", default)]
    pub dynamic_content_wait_secs: u64,

    /// Cookies sent with every navigation
    #[serde(rename = "initial-cookies", default)]
    pub initial_cookies: Vec<CookieEntry>,
}

/// A cookie set before each navigation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CookieEntry {
    pub name: String,
    pub value: String,

    /// Only send to this host when set
    pub domain: Option<String>,

    pub path: Option<String>,
}

/// How page content is prepared for the model
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentConfig {
    /// Only the inner HTML of the first match is sent
    #[serde(rename = "target-selector")]
    pub target_selector: Option<String>,

    /// Every matching element is removed before sending
    #[serde(rename = "remove-elements-css-selector")]
    pub remove_elements_css_selector: Option<String>,

    #[serde(rename = "remove-link-urls", default)]
    pub remove_link_urls: bool,

    #[serde(rename = "page-format", default)]
    pub page_format: PageFormat,
}

/// A number that may also be written as a string, e.g. `"0.5"`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum StringyNumber {
    Number(f64),
    Text(String),
}

/// Model selection, prompt and sampling settings
#[derive(Debug, Clone, Deserialize)]
pub struct ModelOptions {
    /// Registry name, e.g. `gpt-3.5-turbo`
    pub name: String,

    /// Falls back to the `OPENAI_API_KEY` environment variable
    #[serde(rename = "api-key")]
    pub api_key: Option<String>,

    /// OpenAI-compatible API root
    #[serde(rename = "base-url")]
    pub base_url: Option<String>,

    pub instructions: String,

    /// JSON schema as an inline JSON string
    pub schema: Option<String>,

    #[serde(rename = "schema-description")]
    pub schema_description: Option<String>,

    #[serde(rename = "use-structured-output", default)]
    pub use_structured_output: bool,

    pub temperature: Option<StringyNumber>,

    #[serde(rename = "top-p")]
    pub top_p: Option<StringyNumber>,

    #[serde(rename = "frequency-penalty")]
    pub frequency_penalty: Option<StringyNumber>,

    #[serde(rename = "presence-penalty")]
    pub presence_penalty: Option<StringyNumber>,
}

/// Worker pool and navigation behavior
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    #[serde(rename = "min-concurrency", default = "default_min_concurrency")]
    pub min_concurrency: usize,

    #[serde(rename = "max-concurrency", default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Retries per page after the first attempt
    #[serde(rename = "max-request-retries", default = "default_max_request_retries")]
    pub max_request_retries: u32,

    /// Hard limit for processing one page, model call included
    #[serde(
        rename = "request-handler-timeout-secs",
        default = "default_request_handler_timeout_secs"
    )]
    pub request_handler_timeout_secs: u64,

    #[serde(
        rename = "navigation-timeout-secs",
        default = "default_navigation_timeout_secs"
    )]
    pub navigation_timeout_secs: u64,

    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            min_concurrency: default_min_concurrency(),
            max_concurrency: default_max_concurrency(),
            max_request_retries: default_max_request_retries(),
            request_handler_timeout_secs: default_request_handler_timeout_secs(),
            navigation_timeout_secs: default_navigation_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// Proxy pools by tier
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub datacenter: Vec<String>,
    #[serde(default)]
    pub residential: Vec<String>,
}

impl ProxyConfig {
    pub fn is_empty(&self) -> bool {
        self.datacenter.is_empty() && self.residential.is_empty()
    }
}

/// Where results, snapshots and queue state are written
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Root of the key-value store holding snapshots
    #[serde(rename = "storage-dir", default = "default_storage_dir")]
    pub storage_dir: String,

    /// JSON-lines file receiving one record per page
    #[serde(rename = "dataset-path", default = "default_dataset_path")]
    pub dataset_path: String,

    /// SQLite request queue
    #[serde(rename = "queue-path", default = "default_queue_path")]
    pub queue_path: String,

    #[serde(rename = "save-snapshots", default = "default_true")]
    pub save_snapshots: bool,

    /// Public prefix for snapshot URLs; file URLs are used when unset
    #[serde(rename = "public-base-url")]
    pub public_base_url: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            dataset_path: default_dataset_path(),
            queue_path: default_queue_path(),
            save_snapshots: true,
            public_base_url: None,
        }
    }
}

fn default_min_concurrency() -> usize {
    1
}

fn default_max_concurrency() -> usize {
    20
}

fn default_max_request_retries() -> u32 {
    3
}

fn default_request_handler_timeout_secs() -> u64 {
    180
}

fn default_navigation_timeout_secs() -> u64 {
    60
}

fn default_user_agent() -> String {
    format!("gleaner/{}", env!("CARGO_PKG_VERSION"))
}

fn default_storage_dir() -> String {
    "./storage".to_string()
}

fn default_dataset_path() -> String {
    "./storage/dataset.jsonl".to_string()
}

fn default_queue_path() -> String {
    "./storage/queue.db".to_string()
}

fn default_true() -> bool {
    true
}

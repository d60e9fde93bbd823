use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Parses and validates configuration text
///
/// # Arguments
///
/// * `content` - TOML document with `[crawl]`, `[model]` and the optional sections
///
/// # Returns
///
/// * `Ok(Config)` - A configuration that passed validation
/// * `Err(ConfigError)` - The TOML is malformed or a value is out of bounds
///
/// # Example
///
/// ```
/// use gleaner::config::parse_config;
///
/// let config = parse_config(r#"
/// [crawl]
/// start-urls = ["https://example.com/"]
///
/// [model]
/// name = "gpt-3.5-turbo"
/// instructions = "Summarize the page"
/// "#).unwrap();
/// assert_eq!(config.crawler.request_handler_timeout_secs, 180);
/// ```
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Reads a crawl configuration file
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - The validated configuration
/// * `Err(ConfigError)` - The file is unreadable or its content is rejected
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use gleaner::config::load_config;
///
/// let config = load_config(Path::new("gleaner.toml")).unwrap();
/// println!("Model: {}", config.model.name);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    parse_config(&std::fs::read_to_string(path)?)
}

/// Hex-encoded SHA-256 of a configuration file
///
/// Logged at startup and stored with each run in the request queue, so a
/// resumed crawl can be traced back to the configuration it ran with.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    Ok(hash_content(&std::fs::read_to_string(path)?))
}

/// Reads a configuration file once, returning the config and its hash
///
/// The hash always matches the text that was parsed, even if the file is
/// edited while the crawler starts.
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    Ok((config, hash_content(&content)))
}

fn hash_content(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::PageFormat;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn config_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    const FULL_CONFIG: &str = r#"
[crawl]
start-urls = ["https://example.com/"]
link-selector = "a[href]"
include-url-globs = ["https://example.com/**"]
max-pages-per-crawl = 10

[content]
target-selector = "main"
page-format = "html"

[model]
name = "gpt-3.5-turbo"
instructions = "Summarize the page"
temperature = "0.2"

[crawler]
max-concurrency = 4

[output]
dataset-path = "./out/dataset.jsonl"
save-snapshots = false
"#;

    #[test]
    fn test_load_full_config() {
        let file = config_file(FULL_CONFIG);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawl.start_urls, vec!["https://example.com/"]);
        assert_eq!(config.crawl.max_pages_per_crawl, 10);
        assert_eq!(config.content.page_format, PageFormat::Html);
        assert_eq!(config.model.name, "gpt-3.5-turbo");
        assert_eq!(config.crawler.max_concurrency, 4);
        assert_eq!(config.crawler.min_concurrency, 1);
        assert_eq!(config.crawler.request_handler_timeout_secs, 180);
        assert!(!config.output.save_snapshots);
        assert_eq!(config.output.queue_path, "./storage/queue.db");
    }

    #[test]
    fn test_defaults_for_minimal_config() {
        let config = parse_config(
            r#"
[crawl]
start-urls = ["https://example.com/"]

[model]
name = "gpt-4"
instructions = "List the products"
"#,
        )
        .unwrap();

        assert_eq!(config.content.page_format, PageFormat::Markdown);
        assert!(config.proxy.is_empty());
        assert!(config.output.save_snapshots);
        assert!(config.crawl.initial_cookies.is_empty());
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_config(Path::new("/nonexistent/gleaner.toml")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            parse_config("[crawl\nstart-urls = "),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_model_section() {
        assert!(matches!(
            parse_config("[crawl]\nstart-urls = [\"https://example.com/\"]\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_empty_instructions_rejected() {
        let config = FULL_CONFIG.replace("Summarize the page", "");
        assert!(matches!(
            parse_config(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_unknown_model_rejected() {
        let config = FULL_CONFIG.replace("gpt-3.5-turbo", "gpt-17");
        assert!(matches!(
            parse_config(&config),
            Err(ConfigError::UnknownModel(_))
        ));
    }

    #[test]
    fn test_out_of_range_setting_rejected() {
        let config = FULL_CONFIG.replace("temperature = \"0.2\"", "temperature = 3");
        assert!(matches!(
            parse_config(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_bad_glob_rejected() {
        let config = FULL_CONFIG.replace("https://example.com/**", "https://example.com/{a,b");
        assert!(matches!(
            parse_config(&config),
            Err(ConfigError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_hash_matches_parsed_content() {
        let file = config_file(FULL_CONFIG);
        let (config, hash) = load_config_with_hash(file.path()).unwrap();

        assert_eq!(config.model.instructions, "Summarize the page");
        assert_eq!(hash, compute_config_hash(file.path()).unwrap());
        assert_eq!(hash.len(), 64);
    }

    #[test]
    fn test_hash_tracks_edits() {
        let original = config_file(FULL_CONFIG);
        let edited = config_file(&FULL_CONFIG.replace("max-concurrency = 4", "max-concurrency = 8"));

        assert_ne!(
            compute_config_hash(original.path()).unwrap(),
            compute_config_hash(edited.path()).unwrap()
        );
    }
}

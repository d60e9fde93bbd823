use crate::config::types::{
    Config, CrawlConfig, CrawlerConfig, ModelOptions, OutputConfig, ProxyConfig, StringyNumber,
};
use crate::model::model_config_by_name;
use crate::url::UrlGlob;
use crate::ConfigError;
use url::Url;

/// Inclusive range and default for a numeric model setting
#[derive(Debug, Clone, Copy)]
pub(crate) struct NumberRange {
    pub default: f64,
    pub min: f64,
    pub max: f64,
}

pub(crate) const TEMPERATURE: NumberRange = NumberRange {
    default: 0.0,
    min: 0.0,
    max: 2.0,
};

pub(crate) const TOP_P: NumberRange = NumberRange {
    default: 1.0,
    min: 0.0,
    max: 1.0,
};

pub(crate) const PENALTY: NumberRange = NumberRange {
    default: 0.0,
    min: 0.0,
    max: 2.0,
};

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawl_config(&config.crawl)?;
    validate_model_options(&config.model)?;
    validate_crawler_config(&config.crawler)?;
    validate_proxy_config(&config.proxy)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Parses a number that may be written as a string and checks its range
///
/// Missing values take the range default.
pub(crate) fn parse_number_in_range(
    value: Option<&StringyNumber>,
    name: &str,
    range: NumberRange,
) -> Result<f64, ConfigError> {
    let number = match value {
        None => range.default,
        Some(StringyNumber::Number(n)) => *n,
        Some(StringyNumber::Text(text)) => text.trim().parse::<f64>().map_err(|_| {
            ConfigError::Validation(format!("'{}' must be a stringy number, got '{}'", name, text))
        })?,
    };

    if number.is_nan() || number < range.min || number > range.max {
        return Err(ConfigError::Validation(format!(
            "'{}' must be in range between {} and {}, got '{}'",
            name, range.min, range.max, number
        )));
    }

    Ok(number)
}

fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.start_urls.is_empty() {
        return Err(ConfigError::Validation(
            "start-urls must contain at least one URL".to_string(),
        ));
    }

    for start_url in &config.start_urls {
        let url = Url::parse(start_url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid start URL '{}': {}", start_url, e))
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Start URL '{}' must use HTTP or HTTPS scheme",
                start_url
            )));
        }
    }

    let all_globs = config
        .include_url_globs
        .iter()
        .chain(&config.exclude_url_globs)
        .chain(&config.skip_extraction_globs)
        .chain(config.globs.iter().flatten());

    for glob in all_globs {
        UrlGlob::new(glob).map_err(|e| ConfigError::InvalidPattern(e.to_string()))?;
    }

    for cookie in &config.initial_cookies {
        if cookie.name.is_empty() {
            return Err(ConfigError::Validation(
                "initial-cookies entries must have a non-empty name".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_model_options(config: &ModelOptions) -> Result<(), ConfigError> {
    if model_config_by_name(&config.name).is_none() {
        return Err(ConfigError::UnknownModel(format!(
            "Model {} is not supported",
            config.name
        )));
    }

    if config.instructions.trim().is_empty() {
        return Err(ConfigError::Validation(
            "instructions cannot be empty".to_string(),
        ));
    }

    if let Some(base_url) = &config.base_url {
        Url::parse(base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;
    }

    parse_number_in_range(config.temperature.as_ref(), "temperature", TEMPERATURE)?;
    parse_number_in_range(config.top_p.as_ref(), "top-p", TOP_P)?;
    parse_number_in_range(
        config.frequency_penalty.as_ref(),
        "frequency-penalty",
        PENALTY,
    )?;
    parse_number_in_range(config.presence_penalty.as_ref(), "presence-penalty", PENALTY)?;

    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.min_concurrency < 1 {
        return Err(ConfigError::Validation(format!(
            "min-concurrency must be >= 1, got {}",
            config.min_concurrency
        )));
    }

    if config.max_concurrency < config.min_concurrency {
        return Err(ConfigError::Validation(format!(
            "max-concurrency ({}) must be >= min-concurrency ({})",
            config.max_concurrency, config.min_concurrency
        )));
    }

    if config.request_handler_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request-handler-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.navigation_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "navigation-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_proxy_config(config: &ProxyConfig) -> Result<(), ConfigError> {
    for proxy in config.datacenter.iter().chain(&config.residential) {
        Url::parse(proxy)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy URL '{}': {}", proxy, e)))?;
    }
    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.storage_dir.is_empty() {
        return Err(ConfigError::Validation(
            "storage-dir cannot be empty".to_string(),
        ));
    }

    if config.dataset_path.is_empty() {
        return Err(ConfigError::Validation(
            "dataset-path cannot be empty".to_string(),
        ));
    }

    if config.queue_path.is_empty() {
        return Err(ConfigError::Validation(
            "queue-path cannot be empty".to_string(),
        ));
    }

    if let Some(base) = &config.public_base_url {
        Url::parse(base)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid public-base-url: {}", e)))?;
    }

    Ok(())
}

//! Runtime settings resolved from a validated [`Config`]

use crate::config::types::Config;
use crate::config::validation::{parse_number_in_range, PENALTY, TEMPERATURE, TOP_P};
use crate::content::{ContentProcessor, ShrinkOptions};
use crate::model::{model_config_by_name, ModelConfig, ModelSettings};
use crate::url::{compile_globs, UrlGlob};
use crate::ConfigError;
use serde_json::Value;

/// Everything a crawl run needs, derived once at startup
#[derive(Debug, Clone)]
pub struct Settings {
    /// The configuration the settings were resolved from
    pub config: Config,

    pub model: ModelConfig,
    pub model_settings: ModelSettings,

    /// Function-call schema; `None` unless structured output is in use
    pub schema: Option<Value>,

    /// Function description, defaults to the instructions
    pub schema_description: String,

    pub include_globs: Vec<UrlGlob>,
    pub exclude_globs: Vec<UrlGlob>,
    pub skip_extraction_globs: Vec<UrlGlob>,

    /// `None` means unlimited
    pub max_pages: Option<u64>,

    /// `None` means unlimited
    pub max_depth: Option<u32>,
}

impl Settings {
    /// Resolves the model, the schema and the URL globs
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - Ready-to-run settings
    /// * `Err(ConfigError::UnknownModel)` - The model is not in the registry
    /// * `Err(ConfigError::InvalidSchema)` - Structured output is on but the
    ///   schema is missing or is not a JSON object
    pub fn resolve(mut config: Config) -> Result<Self, ConfigError> {
        let model = *model_config_by_name(&config.model.name).ok_or_else(|| {
            ConfigError::UnknownModel(format!("Model {} is not supported", config.model.name))
        })?;

        if let Some(globs) = config.crawl.globs.take() {
            tracing::warn!(
                "Deprecation warning: `globs` is deprecated, please use `include-url-globs` instead!"
            );
            config.crawl.include_url_globs = globs;
        }

        let schema = resolve_schema(&config, &model)?;

        if schema.is_some() && config.model.schema_description.is_none() {
            tracing::warn!("Schema description is not set, using instructions as schema description.");
        }
        let schema_description = config
            .model
            .schema_description
            .clone()
            .unwrap_or_else(|| config.model.instructions.clone());

        let model_settings = ModelSettings {
            temperature: parse_number_in_range(
                config.model.temperature.as_ref(),
                "temperature",
                TEMPERATURE,
            )?,
            top_p: parse_number_in_range(config.model.top_p.as_ref(), "top-p", TOP_P)?,
            frequency_penalty: parse_number_in_range(
                config.model.frequency_penalty.as_ref(),
                "frequency-penalty",
                PENALTY,
            )?,
            presence_penalty: parse_number_in_range(
                config.model.presence_penalty.as_ref(),
                "presence-penalty",
                PENALTY,
            )?,
        };

        let to_pattern_error = |e: crate::UrlError| ConfigError::InvalidPattern(e.to_string());
        let include_globs = compile_globs(&config.crawl.include_url_globs).map_err(to_pattern_error)?;
        let exclude_globs = compile_globs(&config.crawl.exclude_url_globs).map_err(to_pattern_error)?;
        let skip_extraction_globs =
            compile_globs(&config.crawl.skip_extraction_globs).map_err(to_pattern_error)?;

        let max_pages = match config.crawl.max_pages_per_crawl {
            0 => None,
            n => Some(n),
        };
        let max_depth = match config.crawl.max_crawling_depth {
            0 => None,
            n => Some(n),
        };

        Ok(Self {
            config,
            model,
            model_settings,
            schema,
            schema_description,
            include_globs,
            exclude_globs,
            skip_extraction_globs,
            max_pages,
            max_depth,
        })
    }

    /// Builds the content processor for these settings
    pub fn content_processor(&self) -> ContentProcessor {
        let content = &self.config.content;
        ContentProcessor::new(
            ShrinkOptions {
                remove_selector: content.remove_elements_css_selector.clone(),
                remove_link_hrefs: content.remove_link_urls,
            },
            content.page_format,
        )
    }

    /// Whether a task at `depth` may still enqueue links
    pub fn allows_links_from(&self, depth: u32) -> bool {
        self.max_depth.map_or(true, |max| depth < max)
    }
}

fn resolve_schema(config: &Config, model: &ModelConfig) -> Result<Option<Value>, ConfigError> {
    let options = &config.model;
    if !options.use_structured_output {
        return Ok(None);
    }

    if !model.supports_schema() {
        if options.schema.is_some() {
            tracing::warn!(
                "Schema is not supported for model {}! Ignoring schema.",
                model.name
            );
        }
        return Ok(None);
    }

    let raw = options.schema.as_deref().ok_or_else(|| {
        ConfigError::InvalidSchema(
            "Schema is required when use-structured-output is enabled. Provide a JSON schema or disable the option.".to_string(),
        )
    })?;

    let schema: Value = serde_json::from_str(raw)
        .map_err(|e| ConfigError::InvalidSchema(format!("Schema is not valid JSON: {}", e)))?;

    if !schema.is_object() {
        return Err(ConfigError::InvalidSchema(
            "Schema must be a JSON object".to_string(),
        ));
    }

    Ok(Some(schema))
}

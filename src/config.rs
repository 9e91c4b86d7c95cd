//! Deployment configuration.
//!
//! Settings are resolved once at startup from CLI flags and environment
//! variables and validated before any network call is made. Nothing here
//! is editable at runtime.

use crate::error::{ConfigError, Result};
use crate::model::SamplingConfig;
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default region of the knowledge base and model services.
pub const DEFAULT_REGION: &str = "us-west-2";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20240620";

/// Upper bound on the number of documents a single retrieval may request.
pub const MAX_RESULT_LIMIT: usize = 100;

/// Model service provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Anthropic Messages API.
    Anthropic,
    /// OpenAI-compatible chat completions.
    OpenAi,
}

impl Provider {
    /// Returns the provider name as used on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAi),
            _ => Err(ConfigError::UnknownProvider {
                name: s.to_string(),
            }),
        }
    }
}

/// Where retrieved documents come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetrieverSource {
    /// A managed knowledge base reached over HTTP.
    KnowledgeBase {
        /// Base URL of the retrieve API.
        endpoint: String,
        /// Knowledge base identifier.
        knowledge_base_id: String,
    },
    /// A fixed corpus loaded from a JSON file.
    StaticFile {
        /// Path to the JSON document file.
        path: PathBuf,
    },
}

/// Validated retriever settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetrieverSettings {
    /// Document source.
    pub source: RetrieverSource,
    /// Maximum number of documents per retrieval.
    pub result_limit: usize,
}

impl RetrieverSettings {
    /// Builds settings for a managed knowledge base.
    ///
    /// When `endpoint` is `None` the regional runtime endpoint is derived
    /// from `region`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the knowledge base ID is missing or
    /// malformed, the region or endpoint is invalid, or the result limit is
    /// out of range.
    pub fn knowledge_base(
        region: &str,
        knowledge_base_id: Option<&str>,
        endpoint: Option<&str>,
        result_limit: usize,
    ) -> Result<Self> {
        let knowledge_base_id = knowledge_base_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ConfigError::Missing {
                name: "--knowledge-base-id (KB_RAG_KNOWLEDGE_BASE_ID)".to_string(),
            })?;
        if !knowledge_base_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::Invalid {
                name: "knowledge_base_id".to_string(),
                reason: format!("'{knowledge_base_id}' must be alphanumeric"),
            }
            .into());
        }

        let endpoint = match endpoint {
            Some(url) => validate_url("retriever_endpoint", url)?,
            None => runtime_endpoint(region)?,
        };

        Ok(Self {
            source: RetrieverSource::KnowledgeBase {
                endpoint,
                knowledge_base_id: knowledge_base_id.to_string(),
            },
            result_limit: validate_result_limit(result_limit)?,
        })
    }

    /// Builds settings for a static document file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the result limit is out of range.
    pub fn static_file(path: PathBuf, result_limit: usize) -> Result<Self> {
        Ok(Self {
            source: RetrieverSource::StaticFile { path },
            result_limit: validate_result_limit(result_limit)?,
        })
    }
}

/// Validated model settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSettings {
    /// Model service provider.
    pub provider: Provider,
    /// Model identifier.
    pub model_id: String,
    /// Base URL override for the provider API.
    pub api_base: Option<String>,
    /// API key forwarded to the provider. Never printed.
    #[serde(serialize_with = "redact")]
    pub api_key: Option<String>,
    /// Sampling parameters.
    pub sampling: SamplingConfig,
}

impl ModelSettings {
    /// Builds model settings with default sampling and the given token cap.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the model ID is empty, the API base is
    /// not an HTTP(S) URL, or the sampling parameters are out of range.
    pub fn new(
        provider: Provider,
        model_id: &str,
        api_base: Option<&str>,
        api_key: Option<&str>,
        max_output_tokens: u32,
    ) -> Result<Self> {
        let model_id = model_id.trim();
        if model_id.is_empty() {
            return Err(ConfigError::Missing {
                name: "--model (KB_RAG_MODEL)".to_string(),
            }
            .into());
        }

        let api_base = api_base
            .map(|url| validate_url("api_base", url))
            .transpose()?;

        let sampling = SamplingConfig::new().with_max_output_tokens(max_output_tokens);
        sampling.validate()?;

        Ok(Self {
            provider,
            model_id: model_id.to_string(),
            api_base,
            api_key: api_key
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(ToString::to_string),
            sampling,
        })
    }

    /// Returns the API key or a configuration error naming the setting.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if no key was configured.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            ConfigError::Missing {
                name: "--api-key (KB_RAG_API_KEY)".to_string(),
            }
            .into()
        })
    }
}

/// Fully resolved deployment settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    /// Retriever settings.
    pub retriever: RetrieverSettings,
    /// Model settings.
    pub model: ModelSettings,
}

/// Returns the regional retrieve endpoint for `region`.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] if the region is not a valid region
/// name.
pub fn runtime_endpoint(region: &str) -> Result<String> {
    let region = region.trim();
    let valid = !region.is_empty()
        && region
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !valid {
        return Err(ConfigError::Invalid {
            name: "region".to_string(),
            reason: format!("'{region}' is not a valid region name"),
        }
        .into());
    }
    Ok(format!("https://bedrock-agent-runtime.{region}.amazonaws.com"))
}

fn validate_url(name: &str, url: &str) -> Result<String> {
    let url = url.trim().trim_end_matches('/');
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(url.to_string())
    } else {
        Err(ConfigError::Invalid {
            name: name.to_string(),
            reason: format!("'{url}' must be an http(s) URL"),
        }
        .into())
    }
}

fn validate_result_limit(limit: usize) -> Result<usize> {
    if (1..=MAX_RESULT_LIMIT).contains(&limit) {
        Ok(limit)
    } else {
        Err(ConfigError::Invalid {
            name: "result_limit".to_string(),
            reason: format!("{limit} is outside 1..={MAX_RESULT_LIMIT}"),
        }
        .into())
    }
}

#[allow(clippy::ref_option)]
fn redact<S: Serializer>(
    value: &Option<String>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match value {
        Some(_) => serializer.serialize_str("***"),
        None => serializer.serialize_none(),
    }
}

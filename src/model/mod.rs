//! Model adapters.
//!
//! A model turns an assembled prompt into text, either as one complete
//! string or as an ordered stream of fragments whose concatenation is the
//! complete answer. Adapters only speak a provider's request/response
//! contract; they hold no conversation state and never retry.

mod anthropic;
#[cfg(feature = "openai")]
mod openai;
mod sampling;
mod sse;

pub use anthropic::{ANTHROPIC_VERSION, AnthropicModel, DEFAULT_API_BASE};
#[cfg(feature = "openai")]
pub use openai::OpenAiModel;
pub use sampling::{
    DEFAULT_MAX_OUTPUT_TOKENS, DEFAULT_STOP_SEQUENCE, DEFAULT_TOP_K, SamplingConfig,
};
pub use sse::{SseDecoder, SseEvent};

use crate::config::{ModelSettings, Provider};
use crate::error::Result;
use async_trait::async_trait;
use futures_util::Stream;
use std::pin::Pin;

/// Ordered stream of generated text fragments.
///
/// The stream ends after the last fragment. An `Err` item ends the answer;
/// consumers should not poll further after one.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Trait for model backends.
#[async_trait]
pub trait Model: Send + Sync {
    /// Returns the model identifier for logging.
    fn name(&self) -> &str;

    /// Generates the complete answer for `prompt`.
    ///
    /// # Errors
    ///
    /// Returns a [`GenerationError`](crate::error::GenerationError) if the
    /// service is unreachable, rejects the request, or returns no text.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Starts generating the answer for `prompt` as a fragment stream.
    ///
    /// Dropping the stream abandons the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be started. Failures after the
    /// first fragment arrive as `Err` items in the stream.
    async fn generate_stream(&self, prompt: &str) -> Result<FragmentStream>;
}

/// Creates the model backend described by `settings`.
///
/// # Errors
///
/// Returns a configuration error if no API key is set or the provider was
/// compiled out.
pub fn create_model(settings: &ModelSettings) -> Result<Box<dyn Model>> {
    let api_key = settings.require_api_key()?;

    match settings.provider {
        Provider::Anthropic => {
            let mut model = AnthropicModel::new(
                api_key.to_string(),
                settings.model_id.clone(),
                settings.sampling.clone(),
            );
            if let Some(base) = &settings.api_base {
                model = model.with_api_base(base);
            }
            Ok(Box::new(model))
        }
        #[cfg(feature = "openai")]
        Provider::OpenAi => Ok(Box::new(OpenAiModel::new(
            api_key,
            settings.api_base.as_deref(),
            settings.model_id.clone(),
            settings.sampling.clone(),
        ))),
        #[cfg(not(feature = "openai"))]
        Provider::OpenAi => Err(crate::error::ConfigError::Invalid {
            name: "provider".to_string(),
            reason: "built without the `openai` feature".to_string(),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::config::DEFAULT_MODEL;
    use crate::error::ConfigError;

    #[test]
    fn test_create_model_requires_api_key() {
        let settings =
            ModelSettings::new(Provider::Anthropic, DEFAULT_MODEL, None, None, 8192).unwrap();
        let err = create_model(&settings).err().unwrap();
        assert!(matches!(err, Error::Config(ConfigError::Missing { .. })));
    }

    #[test]
    fn test_create_anthropic_model() {
        let settings = ModelSettings::new(
            Provider::Anthropic,
            DEFAULT_MODEL,
            Some("http://localhost:8080"),
            Some("sk-test"),
            8192,
        )
        .unwrap();
        let model = create_model(&settings).unwrap();
        assert_eq!(model.name(), DEFAULT_MODEL);
    }

    #[cfg(feature = "openai")]
    #[test]
    fn test_create_openai_model() {
        let settings =
            ModelSettings::new(Provider::OpenAi, "gpt-4o-mini", None, Some("sk-test"), 512)
                .unwrap();
        let model = create_model(&settings).unwrap();
        assert_eq!(model.name(), "gpt-4o-mini");
    }
}

//! OpenAI-compatible chat completions backend.

use super::{FragmentStream, Model, SamplingConfig};
use crate::error::{GenerationError, Result};
use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs, Stop,
};
use async_trait::async_trait;
use futures_util::{StreamExt, future};
use tracing::debug;

/// Model backend for OpenAI-compatible chat completion endpoints.
///
/// Chat completions have no top-k parameter; it is not sent.
pub struct OpenAiModel {
    client: Client<OpenAIConfig>,
    model: String,
    sampling: SamplingConfig,
}

impl OpenAiModel {
    /// Creates a backend for `model`, optionally against a custom API base.
    #[must_use]
    pub fn new(
        api_key: &str,
        api_base: Option<&str>,
        model: String,
        sampling: SamplingConfig,
    ) -> Self {
        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base) = api_base {
            config = config.with_api_base(base);
        }
        debug!(top_k = sampling.top_k, "top_k is not sent to chat completions");

        Self {
            client: Client::with_config(config),
            model,
            sampling,
        }
    }

    fn request(&self, prompt: &str) -> Result<CreateChatCompletionRequest> {
        let message: ChatCompletionRequestMessage = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(GenerationError::from)?
            .into();

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![message])
            .max_completion_tokens(self.sampling.max_output_tokens)
            .temperature(self.sampling.temperature)
            .top_p(self.sampling.top_p)
            .stop(Stop::StringArray(self.sampling.stop_sequences.clone()))
            .build()
            .map_err(GenerationError::from)?;
        Ok(request)
    }
}

#[async_trait]
impl Model for OpenAiModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let response = self
            .client
            .chat()
            .create(self.request(prompt)?)
            .await
            .map_err(GenerationError::from)?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(GenerationError::EmptyResponse)?;
        debug!(model = %self.model, chars = text.len(), "generation complete");
        Ok(text)
    }

    async fn generate_stream(&self, prompt: &str) -> Result<FragmentStream> {
        let stream = self
            .client
            .chat()
            .create_stream(self.request(prompt)?)
            .await
            .map_err(GenerationError::from)?;

        let fragments = stream.filter_map(|item| {
            future::ready(match item {
                Ok(chunk) => {
                    let text: String = chunk
                        .choices
                        .iter()
                        .filter_map(|choice| choice.delta.content.as_deref())
                        .collect();
                    (!text.is_empty()).then_some(Ok(text))
                }
                Err(e) => Some(Err(GenerationError::from(e).into())),
            })
        });
        Ok(Box::pin(fragments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_carries_sampling() {
        let model = OpenAiModel::new(
            "sk-test",
            Some("http://localhost:8080/v1"),
            "gpt-4o-mini".to_string(),
            SamplingConfig::default().with_max_output_tokens(512),
        );
        let request = model.request("Question: hi").unwrap();

        assert_eq!(request.model, "gpt-4o-mini");
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.max_completion_tokens, Some(512));
        assert_eq!(request.temperature, Some(0.0));
        assert_eq!(request.top_p, Some(1.0));
        assert!(matches!(
            request.stop,
            Some(Stop::StringArray(ref stops)) if stops == &["\n\nHuman".to_string()]
        ));
    }
}

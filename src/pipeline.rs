//! Pipeline composer.
//!
//! Composes the stages as plain function calls: retrieve once, assemble the
//! prompt, generate, then shape the output. The retrieved documents are
//! reused for both the prompt and the result's `context`; nothing is
//! retrieved twice for one question.

use crate::config::Settings;
use crate::core::{Document, GenerationResult, PartialResult};
use crate::error::{Error, Result};
use crate::model::{Model, create_model};
use crate::prompt;
use crate::retriever::{Retriever, create_retriever};
use futures_util::{Stream, StreamExt, TryStreamExt, future, stream};
use std::pin::Pin;
use tracing::debug;

/// Stream of tagged results for one question.
///
/// The single [`PartialResult::Context`] element comes first, followed by
/// the [`PartialResult::Response`] fragments in generation order.
pub type ResultStream = Pin<Box<dyn Stream<Item = Result<PartialResult>> + Send>>;

/// Retrieval-augmented generation pipeline.
pub struct Pipeline {
    retriever: Box<dyn Retriever>,
    model: Box<dyn Model>,
}

impl Pipeline {
    /// Creates a pipeline from a retriever and a model.
    #[must_use]
    pub fn new(retriever: Box<dyn Retriever>, model: Box<dyn Model>) -> Self {
        Self { retriever, model }
    }

    /// Builds the retriever and model described by `settings`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the model cannot be created (for
    /// example without an API key), or an I/O error for an unreadable
    /// document file.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let retriever = create_retriever(&settings.retriever)?;
        let model = create_model(&settings.model)?;
        Ok(Self::new(retriever, model))
    }

    /// Returns the retriever.
    #[must_use]
    pub fn retriever(&self) -> &dyn Retriever {
        self.retriever.as_ref()
    }

    /// Returns the model.
    #[must_use]
    pub fn model(&self) -> &dyn Model {
        self.model.as_ref()
    }

    /// Retrieves context for `question` and assembles the prompt without
    /// calling the model.
    ///
    /// # Errors
    ///
    /// Returns a retrieval error if the retriever fails.
    pub async fn prompt(&self, question: &str) -> Result<(Vec<Document>, String)> {
        build_prompt(self.retriever(), question).await
    }

    /// Answers `question` in one piece.
    ///
    /// # Errors
    ///
    /// Returns a retrieval error (the model is then not called) or a
    /// generation error.
    pub async fn run(&self, question: &str) -> Result<GenerationResult> {
        let (context, prompt) = self.prompt(question).await?;
        let response = self.model.generate(&prompt).await?;
        debug!(
            model = self.model.name(),
            chars = response.len(),
            "response generated"
        );
        Ok(GenerationResult { response, context })
    }

    /// Answers `question` as a stream of tagged results.
    ///
    /// Retrieval and the start of generation happen before this returns;
    /// fragments are produced as the stream is polled. Dropping the stream
    /// abandons generation.
    ///
    /// # Errors
    ///
    /// Returns a retrieval error or a generation error raised before the
    /// first fragment. Later generation errors arrive inside the stream.
    pub async fn run_stream(&self, question: &str) -> Result<ResultStream> {
        let (context, prompt) = self.prompt(question).await?;
        let fragments = self.model.generate_stream(&prompt).await?;
        debug!(model = self.model.name(), "response stream started");

        let head = stream::once(future::ready(Ok(PartialResult::Context(context))));
        Ok(Box::pin(head.chain(fragments.map_ok(PartialResult::Response))))
    }
}

/// Retrieves context for `question` from `retriever` and assembles the
/// prompt.
///
/// # Errors
///
/// Returns a retrieval error if the retriever fails.
pub async fn build_prompt(
    retriever: &dyn Retriever,
    question: &str,
) -> Result<(Vec<Document>, String)> {
    let context = retriever.retrieve(question).await?;
    let prompt = prompt::assemble(&context, question);
    debug!(
        retriever = retriever.name(),
        documents = context.len(),
        prompt_chars = prompt.len(),
        "prompt assembled"
    );
    Ok((context, prompt))
}

/// Folds a result stream into a single [`GenerationResult`].
///
/// # Errors
///
/// Returns the first error item in the stream, or
/// [`Error::InvalidState`] if the stream does not carry exactly one context
/// element.
pub async fn collect<S>(mut stream: S) -> Result<GenerationResult>
where
    S: Stream<Item = Result<PartialResult>> + Unpin,
{
    let mut response = String::new();
    let mut context = None;

    while let Some(item) = stream.next().await {
        match item? {
            PartialResult::Response(fragment) => response.push_str(&fragment),
            PartialResult::Context(docs) => {
                if context.replace(docs).is_some() {
                    return Err(Error::InvalidState {
                        message: "result stream carried more than one context element"
                            .to_string(),
                    });
                }
            }
        }
    }

    let context = context.ok_or_else(|| Error::InvalidState {
        message: "result stream carried no context element".to_string(),
    })?;
    Ok(GenerationResult { response, context })
}

#[cfg(test)]
pub(crate) mod fakes {
    //! In-crate retriever and model doubles.

    use crate::core::Document;
    use crate::error::{GenerationError, Result, RetrievalError};
    use crate::model::{FragmentStream, Model};
    use crate::retriever::Retriever;
    use async_trait::async_trait;
    use futures_util::{StreamExt, future, stream};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Retriever returning a fixed corpus and counting its calls.
    pub struct CountingRetriever {
        documents: Vec<Document>,
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl CountingRetriever {
        pub fn new(documents: Vec<Document>) -> Self {
            Self {
                documents,
                calls: Arc::default(),
                fail: false,
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(Vec::new())
            }
        }

        pub fn calls(&self) -> Arc<AtomicUsize> {
            Arc::clone(&self.calls)
        }
    }

    #[async_trait]
    impl Retriever for CountingRetriever {
        fn name(&self) -> &str {
            "counting"
        }

        async fn retrieve(&self, _question: &str) -> Result<Vec<Document>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RetrievalError::Unreachable("connection refused".to_string()).into());
            }
            Ok(self.documents.clone())
        }
    }

    /// Deterministic model that answers with a fixed list of fragments.
    pub struct ScriptedModel {
        fragments: Vec<String>,
        fail_after: Option<usize>,
        stall: bool,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedModel {
        pub fn new<I, S>(fragments: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                fragments: fragments.into_iter().map(Into::into).collect(),
                fail_after: None,
                stall: false,
                prompts: Arc::default(),
            }
        }

        /// Fails with an upstream error after `n` fragments.
        pub fn failing_after(mut self, n: usize) -> Self {
            self.fail_after = Some(n);
            self
        }

        /// Never finishes: `generate` hangs and the stream goes quiet after
        /// its fragments.
        pub fn stalling(mut self) -> Self {
            self.stall = true;
            self
        }

        pub fn prompts(&self) -> Arc<Mutex<Vec<String>>> {
            Arc::clone(&self.prompts)
        }

        fn record(&self, prompt: &str) {
            self.prompts.lock().unwrap().push(prompt.to_string());
        }

        fn failure() -> crate::Error {
            GenerationError::Upstream {
                status: Some(529),
                message: "overloaded".to_string(),
            }
            .into()
        }
    }

    #[async_trait]
    impl Model for ScriptedModel {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, prompt: &str) -> Result<String> {
            self.record(prompt);
            if self.stall {
                return future::pending().await;
            }
            if self.fail_after.is_some() {
                return Err(Self::failure());
            }
            Ok(self.fragments.concat())
        }

        async fn generate_stream(&self, prompt: &str) -> Result<FragmentStream> {
            self.record(prompt);
            let mut items: Vec<Result<String>> = self.fragments.iter().cloned().map(Ok).collect();
            if let Some(n) = self.fail_after {
                items.truncate(n);
                items.push(Err(Self::failure()));
            }
            if self.stall {
                return Ok(Box::pin(stream::iter(items).chain(stream::pending())));
            }
            Ok(Box::pin(stream::iter(items)))
        }
    }
}

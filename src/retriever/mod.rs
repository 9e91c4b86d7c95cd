//! Retriever adapters.
//!
//! A retriever turns a question into an ordered list of context documents.
//! The search itself happens in an external service; this module only
//! speaks its request/response contract.
//!
//! Backends:
//! - [`KnowledgeBaseRetriever`]: managed knowledge base over HTTP
//! - [`StaticRetriever`]: fixed corpus, for offline runs and prompt dry-runs

mod knowledge_base;
mod static_corpus;

pub use knowledge_base::KnowledgeBaseRetriever;
pub use static_corpus::StaticRetriever;

use crate::config::{RetrieverSettings, RetrieverSource};
use crate::core::Document;
use crate::error::Result;
use async_trait::async_trait;

/// Default number of documents retrieved per question.
pub const DEFAULT_RESULT_LIMIT: usize = 4;

/// Trait for retriever backends.
///
/// Implementations must not retry internally; failures surface as
/// [`RetrievalError`](crate::error::RetrievalError) and retries, if any,
/// are the external service's concern.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Returns a short name for logging.
    fn name(&self) -> &str;

    /// Retrieves the documents relevant to `question`, most relevant first.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing service is unreachable or returns a
    /// malformed response.
    async fn retrieve(&self, question: &str) -> Result<Vec<Document>>;
}

/// Creates the retriever described by `settings`.
///
/// # Errors
///
/// Returns an error if a static document file cannot be read or parsed.
pub fn create_retriever(settings: &RetrieverSettings) -> Result<Box<dyn Retriever>> {
    match &settings.source {
        RetrieverSource::KnowledgeBase {
            endpoint,
            knowledge_base_id,
        } => Ok(Box::new(KnowledgeBaseRetriever::new(
            endpoint.clone(),
            knowledge_base_id.clone(),
            settings.result_limit,
        ))),
        RetrieverSource::StaticFile { path } => Ok(Box::new(
            StaticRetriever::from_file(path)?.with_limit(settings.result_limit),
        )),
    }
}

//! Fixed-corpus retriever.

use super::{DEFAULT_RESULT_LIMIT, Retriever};
use crate::core::Document;
use crate::error::{IoError, RetrievalError, Result};
use async_trait::async_trait;
use std::path::Path;

/// Retriever that returns the same ordered corpus for every question.
///
/// Useful offline and for inspecting assembled prompts without a knowledge
/// base. The corpus file is a JSON array of documents:
///
/// ```json
/// [{ "content": "...", "source": "spec.yaml" }]
/// ```
#[derive(Debug, Clone)]
pub struct StaticRetriever {
    documents: Vec<Document>,
    result_limit: usize,
}

impl StaticRetriever {
    /// Creates a retriever over `documents` with the default result limit.
    #[must_use]
    pub const fn new(documents: Vec<Document>) -> Self {
        Self {
            documents,
            result_limit: DEFAULT_RESULT_LIMIT,
        }
    }

    /// Loads the corpus from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or a retrieval error
    /// if it is not a JSON array of documents.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(IoError::FileNotFound {
                path: path.display().to_string(),
            }
            .into());
        }

        let content = std::fs::read_to_string(path).map_err(|e| IoError::ReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let documents: Vec<Document> = serde_json::from_str(&content).map_err(|e| {
            RetrievalError::Malformed(format!("{}: {e}", path.display()))
        })?;

        Ok(Self::new(documents))
    }

    /// Sets the maximum number of documents returned per question.
    #[must_use]
    pub const fn with_limit(mut self, result_limit: usize) -> Self {
        self.result_limit = result_limit;
        self
    }

    /// Returns the full corpus.
    #[must_use]
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    fn name(&self) -> &str {
        "static"
    }

    async fn retrieve(&self, _question: &str) -> Result<Vec<Document>> {
        Ok(self
            .documents
            .iter()
            .take(self.result_limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn corpus(n: usize) -> Vec<Document> {
        (0..n).map(|i| Document::new(format!("doc {i}"))).collect()
    }

    #[tokio::test]
    async fn test_retrieve_applies_limit() {
        let retriever = StaticRetriever::new(corpus(6));
        let docs = retriever.retrieve("q").await.unwrap();
        assert_eq!(docs.len(), DEFAULT_RESULT_LIMIT);
        assert_eq!(docs[0].content, "doc 0");

        let retriever = StaticRetriever::new(corpus(6)).with_limit(2);
        let docs = retriever.retrieve("q").await.unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[tokio::test]
    async fn test_retrieve_empty_corpus() {
        let retriever = StaticRetriever::new(Vec::new());
        assert!(retriever.retrieve("What is the refund policy?").await.unwrap().is_empty());
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"content": "PUT /v1/shops", "source": "shop.yaml"}}, {{"content": "204"}}]"#
        )
        .unwrap();

        let retriever = StaticRetriever::from_file(file.path()).unwrap();
        assert_eq!(retriever.documents().len(), 2);
        assert_eq!(retriever.documents()[0].source.as_deref(), Some("shop.yaml"));
    }

    #[test]
    fn test_from_file_not_found() {
        let err = StaticRetriever::from_file(Path::new("/nonexistent/docs.json")).unwrap_err();
        assert!(matches!(err, Error::Io(IoError::FileNotFound { .. })));
    }

    #[test]
    fn test_from_file_malformed() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"content": "not an array"}}"#).unwrap();

        let err = StaticRetriever::from_file(file.path()).unwrap_err();
        assert!(matches!(err, Error::Retrieval(RetrievalError::Malformed(_))));
    }
}

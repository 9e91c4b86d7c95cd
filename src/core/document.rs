//! Retrieved document representation.
//!
//! Documents are the opaque text fragments a retriever returns for a
//! question. They carry the text handed to the prompt plus whatever
//! metadata the backing service attached.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A document fragment returned by a retriever.
///
/// # Examples
///
/// ```
/// use kb_rag::core::Document;
///
/// let doc = Document::new("PUT /shops/{id}/pickup-notice updates the notice.")
///     .with_source("s3://api-specs/shop.yaml")
///     .with_score(0.82);
/// assert_eq!(doc.source.as_deref(), Some("s3://api-specs/shop.yaml"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Text content handed to the prompt.
    pub content: String,

    /// Location of the original document (URI or URL), when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Relevance score reported by the retriever, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    /// Backend-specific metadata, passed through untouched.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Document {
    /// Creates a document with content only.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source: None,
            score: None,
            metadata: Map::new(),
        }
    }

    /// Sets the source location.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Sets the relevance score.
    #[must_use]
    pub const fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }
}

//! Generation results produced by the pipeline.

use super::Document;
use serde::{Deserialize, Serialize};

/// The answer to one question together with the context it was generated
/// from.
///
/// `context` is always exactly the documents retrieved for the question
/// that produced `response`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Generated text.
    pub response: String,
    /// Documents retrieved for the question.
    pub context: Vec<Document>,
}

/// One element of a streamed generation.
///
/// Serializes externally tagged, so a fragment becomes
/// `{"response": "..."}` and the context becomes `{"context": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartialResult {
    /// An incremental text fragment.
    Response(String),
    /// The documents retrieved for the question. Delivered once per stream.
    Context(Vec<Document>),
}

impl PartialResult {
    /// Returns the fragment text if this is a response element.
    #[must_use]
    pub fn as_response(&self) -> Option<&str> {
        match self {
            Self::Response(text) => Some(text),
            Self::Context(_) => None,
        }
    }

    /// Returns the documents if this is the context element.
    #[must_use]
    pub fn as_context(&self) -> Option<&[Document]> {
        match self {
            Self::Context(docs) => Some(docs),
            Self::Response(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_partial_result_tagging() {
        let fragment = PartialResult::Response("Hel".to_string());
        assert_eq!(
            serde_json::to_value(&fragment).unwrap(),
            json!({ "response": "Hel" })
        );

        let context = PartialResult::Context(vec![Document::new("doc")]);
        assert_eq!(
            serde_json::to_value(&context).unwrap(),
            json!({ "context": [{ "content": "doc" }] })
        );
    }

    #[test]
    fn test_partial_result_accessors() {
        let fragment = PartialResult::Response("x".to_string());
        assert_eq!(fragment.as_response(), Some("x"));
        assert!(fragment.as_context().is_none());

        let context = PartialResult::Context(Vec::new());
        assert!(context.as_response().is_none());
        assert_eq!(context.as_context().map(<[Document]>::len), Some(0));
    }

    #[test]
    fn test_generation_result_json_shape() {
        let result = GenerationResult {
            response: "I don't know.".to_string(),
            context: Vec::new(),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value, json!({ "response": "I don't know.", "context": [] }));
    }
}

//! Managed knowledge-base retriever.
//!
//! Speaks the knowledge-base `retrieve` contract over HTTP:
//! `POST {endpoint}/knowledgebases/{id}/retrieve` with the query text and a
//! vector-search result count, answered by an ordered list of retrieval
//! results.

use super::Retriever;
use crate::core::Document;
use crate::error::{RetrievalError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Retriever backed by a managed knowledge base.
#[derive(Debug, Clone)]
pub struct KnowledgeBaseRetriever {
    client: Client,
    endpoint: String,
    knowledge_base_id: String,
    result_limit: usize,
}

impl KnowledgeBaseRetriever {
    /// Creates a retriever for the given endpoint and knowledge base.
    #[must_use]
    pub fn new(endpoint: String, knowledge_base_id: String, result_limit: usize) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            knowledge_base_id,
            result_limit,
        }
    }

    /// Returns the retrieve URL for this knowledge base.
    #[must_use]
    pub fn retrieve_url(&self) -> String {
        format!(
            "{}/knowledgebases/{}/retrieve",
            self.endpoint, self.knowledge_base_id
        )
    }

    fn request_body<'a>(&self, question: &'a str) -> RetrieveRequest<'a> {
        RetrieveRequest {
            retrieval_query: RetrievalQuery { text: question },
            retrieval_configuration: RetrievalConfiguration {
                vector_search_configuration: VectorSearchConfiguration {
                    number_of_results: self.result_limit,
                },
            },
        }
    }
}

#[async_trait]
impl Retriever for KnowledgeBaseRetriever {
    fn name(&self) -> &str {
        "knowledge-base"
    }

    async fn retrieve(&self, question: &str) -> Result<Vec<Document>> {
        let response = self
            .client
            .post(self.retrieve_url())
            .json(&self.request_body(question))
            .send()
            .await
            .map_err(|e| RetrievalError::transport(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RetrievalError::transport(&e))?;

        if !status.is_success() {
            return Err(RetrievalError::Upstream {
                status: status.as_u16(),
                message: body,
            }
            .into());
        }

        let documents = parse_response(&body, self.result_limit)?;
        debug!(
            knowledge_base_id = %self.knowledge_base_id,
            documents = documents.len(),
            "retrieved documents"
        );
        Ok(documents)
    }
}

/// Parses a retrieve response body into documents, preserving order and
/// truncating to `limit`.
fn parse_response(body: &str, limit: usize) -> Result<Vec<Document>> {
    let parsed: RetrieveResponse =
        serde_json::from_str(body).map_err(|e| RetrievalError::Malformed(e.to_string()))?;

    Ok(parsed
        .retrieval_results
        .into_iter()
        .take(limit)
        .map(RetrievalResult::into_document)
        .collect())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveRequest<'a> {
    retrieval_query: RetrievalQuery<'a>,
    retrieval_configuration: RetrievalConfiguration,
}

#[derive(Debug, Serialize)]
struct RetrievalQuery<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RetrievalConfiguration {
    vector_search_configuration: VectorSearchConfiguration,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VectorSearchConfiguration {
    number_of_results: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveResponse {
    retrieval_results: Vec<RetrievalResult>,
}

#[derive(Debug, Deserialize)]
struct RetrievalResult {
    content: RetrievalContent,
    #[serde(default)]
    location: Option<Value>,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct RetrievalContent {
    #[serde(default)]
    text: String,
}

impl RetrievalResult {
    fn into_document(self) -> Document {
        Document {
            content: self.content.text,
            source: self.location.as_ref().and_then(location_uri),
            score: self.score,
            metadata: self.metadata.unwrap_or_default(),
        }
    }
}

/// Finds the first `uri` or `url` string in a location object.
///
/// Locations are shaped per data source type (`s3Location.uri`,
/// `webLocation.url`, ...), so the lookup is structural.
fn location_uri(location: &Value) -> Option<String> {
    match location {
        Value::Object(map) => {
            for key in ["uri", "url"] {
                if let Some(Value::String(s)) = map.get(key) {
                    return Some(s.clone());
                }
            }
            map.values().find_map(location_uri)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use serde_json::json;

    const RESPONSE: &str = r#"{
        "retrievalResults": [
            {
                "content": { "text": "PUT /v1/shops/{shopId}/pickup-notice" },
                "location": { "type": "S3", "s3Location": { "uri": "s3://specs/shop.yaml" } },
                "score": 0.71,
                "metadata": { "x-amz-bedrock-kb-chunk-id": "c1" }
            },
            {
                "content": { "text": "Response 204 No Content" },
                "location": { "type": "WEB", "webLocation": { "url": "https://docs.example/api" } },
                "score": 0.55
            },
            {
                "content": { "text": "third" }
            }
        ]
    }"#;

    #[test]
    fn test_retrieve_url() {
        let retriever = KnowledgeBaseRetriever::new(
            "https://bedrock-agent-runtime.us-west-2.amazonaws.com/".to_string(),
            "NVFN52ARPL".to_string(),
            4,
        );
        assert_eq!(
            retriever.retrieve_url(),
            "https://bedrock-agent-runtime.us-west-2.amazonaws.com/knowledgebases/NVFN52ARPL/retrieve"
        );
    }

    #[test]
    fn test_request_body_shape() {
        let retriever =
            KnowledgeBaseRetriever::new("http://localhost".to_string(), "KB1".to_string(), 4);
        let body = serde_json::to_value(retriever.request_body("pickup notice API")).unwrap();
        assert_eq!(
            body,
            json!({
                "retrievalQuery": { "text": "pickup notice API" },
                "retrievalConfiguration": {
                    "vectorSearchConfiguration": { "numberOfResults": 4 }
                }
            })
        );
    }

    #[test]
    fn test_parse_response_preserves_order() {
        let docs = parse_response(RESPONSE, 4).unwrap();
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0].content, "PUT /v1/shops/{shopId}/pickup-notice");
        assert_eq!(docs[0].source.as_deref(), Some("s3://specs/shop.yaml"));
        assert_eq!(docs[0].score, Some(0.71));
        assert_eq!(
            docs[0].metadata.get("x-amz-bedrock-kb-chunk-id"),
            Some(&json!("c1"))
        );
        assert_eq!(docs[1].source.as_deref(), Some("https://docs.example/api"));
        assert_eq!(docs[2].content, "third");
        assert!(docs[2].source.is_none());
        assert!(docs[2].metadata.is_empty());
    }

    #[test]
    fn test_parse_response_truncates_to_limit() {
        let docs = parse_response(RESPONSE, 2).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].content, "Response 204 No Content");
    }

    #[test]
    fn test_parse_response_empty() {
        let docs = parse_response(r#"{"retrievalResults": []}"#, 4).unwrap();
        assert!(docs.is_empty());
    }

    #[test]
    fn test_parse_response_malformed() {
        let err = parse_response(r#"{"results": "nope"}"#, 4).unwrap_err();
        assert!(matches!(err, Error::Retrieval(RetrievalError::Malformed(_))));

        let err = parse_response("<html>", 4).unwrap_err();
        assert!(matches!(err, Error::Retrieval(RetrievalError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_retrieve_unreachable() {
        // Port 9 (discard) on localhost is not expected to accept connections
        let retriever =
            KnowledgeBaseRetriever::new("http://127.0.0.1:9".to_string(), "KB1".to_string(), 4);
        let err = retriever.retrieve("anything").await.unwrap_err();
        assert!(matches!(err, Error::Retrieval(RetrievalError::Unreachable(_))));
    }
}

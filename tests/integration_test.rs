//! Integration tests for kb-rag.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use kb_rag::chat::{AbandonPolicy, ChatController, Renderer, Role, Session, TurnOutcome};
use kb_rag::prompt::{PLACEHOLDER_DOMAIN, RULE_DONT_KNOW, RULE_DOMAIN};
use kb_rag::{
    Document, Error, FragmentStream, Model, PartialResult, Pipeline, Result, StaticRetriever,
    collect,
};
use predicates::prelude::*;
use std::io::Write;
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// Deterministic model that echoes a fixed answer split into words and
/// records every prompt it receives.
struct EchoModel {
    answer: String,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl EchoModel {
    fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            prompts: Arc::default(),
        }
    }

    fn fragments(&self) -> Vec<String> {
        self.answer
            .split_inclusive(' ')
            .map(ToString::to_string)
            .collect()
    }
}

#[async_trait]
impl Model for EchoModel {
    fn name(&self) -> &str {
        "echo"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.answer.clone())
    }

    async fn generate_stream(&self, prompt: &str) -> Result<FragmentStream> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(Box::pin(stream::iter(self.fragments().into_iter().map(Ok))))
    }
}

fn api_docs() -> Vec<Document> {
    vec![
        Document::new("PUT https://api.baemin.com/v1/shops/{shopId}/pickup-notice")
            .with_source("s3://api-specs/shop.yaml"),
        Document::new("Request body: { \"notice\": string }. Response: 204 No Content."),
    ]
}

fn pipeline(answer: &str) -> Pipeline {
    Pipeline::new(
        Box::new(StaticRetriever::new(api_docs())),
        Box::new(EchoModel::new(answer)),
    )
}

fn documents_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    let json = serde_json::to_string(&api_docs()).expect("serialize documents");
    file.write_all(json.as_bytes()).expect("write documents");
    file
}

/// Renderer that stops after a fixed number of fragments.
struct StopAfter {
    limit: usize,
    seen: usize,
}

impl Renderer for StopAfter {
    fn user_message(&mut self, _content: &str) -> Result<()> {
        Ok(())
    }

    fn fragment(&mut self, _text: &str) -> Result<ControlFlow<()>> {
        self.seen += 1;
        if self.seen >= self.limit {
            Ok(ControlFlow::Break(()))
        } else {
            Ok(ControlFlow::Continue(()))
        }
    }

    fn end_stream(&mut self, _abandoned: bool) -> Result<()> {
        Ok(())
    }

    fn response(&mut self, _text: &str) -> Result<()> {
        Ok(())
    }

    fn sources(&mut self, _context: &[Document]) -> Result<()> {
        Ok(())
    }

    fn error(&mut self, _error: &Error) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_pipeline_end_to_end() {
    let model = EchoModel::new("PUT /v1/shops/{shopId}/pickup-notice updates the notice.");
    let prompts = Arc::clone(&model.prompts);
    let pipeline = Pipeline::new(Box::new(StaticRetriever::new(api_docs())), Box::new(model));

    let result = pipeline
        .run("가게 픽업주소안내문구 수정 API를 정보를 알고 싶어")
        .await
        .expect("run failed");

    assert_eq!(result.context, api_docs());
    assert!(result.response.starts_with("PUT"));

    let prompts = prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains(RULE_DONT_KNOW));
    assert!(prompts[0].contains(RULE_DOMAIN));
    assert!(prompts[0].contains("api.baemin.com"));
    assert!(prompts[0].contains("Question: 가게 픽업주소안내문구 수정 API를 정보를 알고 싶어"));
}

#[tokio::test]
async fn test_streaming_equals_blocking() {
    let answer = "def test_update_pickup_notice(): driver.get('https://woowa.in/shops/1')";
    let blocking = pipeline(answer).run("q").await.expect("run failed");

    let streamed = pipeline(answer).run_stream("q").await.expect("stream failed");
    let items: Vec<PartialResult> = streamed.map(|item| item.expect("item")).collect().await;

    assert!(items.len() > 2);
    assert!(items[0].as_context().is_some());
    let concatenated: String = items.iter().filter_map(PartialResult::as_response).collect();
    assert_eq!(concatenated, blocking.response);

    let collected = collect(pipeline(answer).run_stream("q").await.expect("stream failed"))
        .await
        .expect("collect failed");
    assert_eq!(collected, blocking);
}

#[tokio::test]
async fn test_empty_retrieval_still_instructs_dont_know() {
    let pipeline = Pipeline::new(
        Box::new(StaticRetriever::new(Vec::new())),
        Box::new(EchoModel::new("I don't know.")),
    );

    let (context, prompt) = pipeline
        .prompt("What is the refund policy?")
        .await
        .expect("prompt failed");

    assert!(context.is_empty());
    assert!(prompt.contains(RULE_DONT_KNOW));
    assert!(prompt.contains(PLACEHOLDER_DOMAIN));
    assert!(prompt.contains("Documents: \nQuestion: What is the refund policy?"));
}

#[tokio::test]
async fn test_chat_abandon_keeps_session_consistent() {
    let answer = "one two three four five six seven eight nine ten";
    let mut session = Session::new();

    let mut discard = ChatController::new(pipeline(answer)).with_streaming(true);
    let outcome = discard
        .submit(&mut session, "q", &mut StopAfter { limit: 2, seen: 0 })
        .await
        .expect("submit failed");
    assert!(matches!(outcome, TurnOutcome::Abandoned { committed: false, .. }));
    assert_eq!(session.last().map(|m| m.role), Some(Role::User));

    let mut keep = ChatController::new(pipeline(answer))
        .with_streaming(true)
        .with_abandon_policy(AbandonPolicy::CommitPartial);
    keep.submit(&mut session, "q", &mut StopAfter { limit: 2, seen: 0 })
        .await
        .expect("submit failed");
    let last = session.last().expect("message");
    assert_eq!(last.role, Role::Assistant);
    assert_eq!(last.content, "one two ");

    keep.clear(&mut session).expect("clear failed");
    assert_eq!(session.len(), 1);
}

#[test]
fn test_cli_help() {
    Command::cargo_bin("kb-rag")
        .expect("binary")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ask"))
        .stdout(predicate::str::contains("chat"))
        .stdout(predicate::str::contains("--knowledge-base-id"));
}

#[test]
fn test_cli_prompt_with_documents() {
    let file = documents_file();

    Command::cargo_bin("kb-rag")
        .expect("binary")
        .env_remove("KB_RAG_API_KEY")
        .arg("--documents")
        .arg(file.path())
        .args(["prompt", "픽업 안내문구 API"])
        .assert()
        .success()
        .stdout(predicate::str::contains(RULE_DOMAIN))
        .stdout(predicate::str::contains("pickup-notice"))
        .stdout(predicate::str::contains("Question: 픽업 안내문구 API"));
}

#[test]
fn test_cli_prompt_json() {
    let file = documents_file();

    let output = Command::cargo_bin("kb-rag")
        .expect("binary")
        .arg("--documents")
        .arg(file.path())
        .args(["--format", "json", "prompt", "q"])
        .output()
        .expect("run");

    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(value["context"].as_array().map(Vec::len), Some(2));
}

#[test]
fn test_cli_ask_without_api_key_fails() {
    let file = documents_file();

    Command::cargo_bin("kb-rag")
        .expect("binary")
        .env_remove("KB_RAG_API_KEY")
        .arg("--documents")
        .arg(file.path())
        .args(["ask", "question"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration error"))
        .stderr(predicate::str::contains("KB_RAG_API_KEY"));
}

#[test]
fn test_cli_missing_knowledge_base_json_error() {
    Command::cargo_bin("kb-rag")
        .expect("binary")
        .env_remove("KB_RAG_KNOWLEDGE_BASE_ID")
        .env_remove("KB_RAG_DOCUMENTS")
        .args(["--format", "json", "config"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"kind\":\"configuration\""));
}

#[test]
fn test_cli_missing_documents_file() {
    Command::cargo_bin("kb-rag")
        .expect("binary")
        .args(["--documents", "/nonexistent/kb-rag/docs.json", "prompt", "q"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("file not found"));
}

//! # kb-rag
//!
//! Knowledge-base retrieval-augmented generation for API test-case
//! writing.
//!
//! A question is answered in four explicit stages: retrieve documents from
//! a knowledge base, assemble a fixed instruction prompt around them, call
//! a model, and shape the output as a complete result or a stream of
//! tagged fragments.
//!
//! ## Features
//!
//! - **Retrievers**: managed knowledge base over HTTP, or a static JSON corpus
//! - **Models**: Anthropic Messages API, OpenAI-compatible chat completions
//! - **Streaming**: fragment streams with drop-to-abandon semantics
//! - **Chat**: explicit session and turn state machine, terminal front end

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![warn(unsafe_code)]

pub mod chat;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod prompt;
pub mod retriever;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

// Re-export core domain types
pub use crate::core::{Document, GenerationResult, PartialResult};

// Re-export configuration types
pub use config::{ModelSettings, Provider, RetrieverSettings, Settings};

// Re-export pipeline types
pub use pipeline::{Pipeline, ResultStream, build_prompt, collect};

// Re-export adapter types
#[cfg(feature = "openai")]
pub use model::OpenAiModel;
pub use model::{AnthropicModel, FragmentStream, Model, SamplingConfig, create_model};
pub use retriever::{KnowledgeBaseRetriever, Retriever, StaticRetriever, create_retriever};

// Re-export chat types
pub use chat::{AbandonPolicy, ChatController, Renderer, Session, TurnOutcome, TurnState};

// Re-export CLI types
pub use cli::{Cli, Commands, OutputFormat};

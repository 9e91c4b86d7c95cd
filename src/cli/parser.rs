//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros. Deployment settings
//! are global flags with environment fallbacks.

use crate::config::{
    DEFAULT_MODEL, DEFAULT_REGION, ModelSettings, Provider, RetrieverSettings, Settings,
};
use crate::error::Result;
use crate::model::DEFAULT_MAX_OUTPUT_TOKENS;
use crate::retriever::DEFAULT_RESULT_LIMIT;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// kb-rag: knowledge-base RAG for API test-case generation.
///
/// Retrieves API documentation from a knowledge base and asks a model to
/// answer questions or write Selenium test cases from it.
#[derive(Parser, Debug)]
#[command(name = "kb-rag")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Region of the knowledge base service.
    #[arg(long, env = "KB_RAG_REGION", default_value = DEFAULT_REGION, global = true)]
    pub region: String,

    /// Knowledge base identifier.
    #[arg(long, env = "KB_RAG_KNOWLEDGE_BASE_ID", global = true)]
    pub knowledge_base_id: Option<String>,

    /// Retrieve API base URL (defaults to the regional endpoint).
    #[arg(long, env = "KB_RAG_RETRIEVER_ENDPOINT", global = true)]
    pub retriever_endpoint: Option<String>,

    /// JSON document file to use instead of a knowledge base.
    #[arg(long, env = "KB_RAG_DOCUMENTS", global = true)]
    pub documents: Option<PathBuf>,

    /// Number of documents retrieved per question.
    #[arg(long, env = "KB_RAG_RESULT_LIMIT", default_value_t = DEFAULT_RESULT_LIMIT, global = true)]
    pub result_limit: usize,

    /// Model provider (anthropic, openai).
    #[arg(long, env = "KB_RAG_PROVIDER", default_value = "anthropic", global = true)]
    pub provider: String,

    /// Model identifier.
    #[arg(long, env = "KB_RAG_MODEL", default_value = DEFAULT_MODEL, global = true)]
    pub model: String,

    /// Model API base URL (defaults to the provider's).
    #[arg(long, env = "KB_RAG_API_BASE", global = true)]
    pub api_base: Option<String>,

    /// Model API key.
    #[arg(long, env = "KB_RAG_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Maximum number of output tokens.
    #[arg(long, env = "KB_RAG_MAX_TOKENS", default_value_t = DEFAULT_MAX_OUTPUT_TOKENS, global = true)]
    pub max_tokens: u32,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json, ndjson).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer questions and exit.
    ///
    /// Runs the built-in questions when none are given.
    Ask {
        /// Questions to answer, in order.
        questions: Vec<String>,

        /// Print the answer as it is generated.
        #[arg(short, long)]
        stream: bool,
    },

    /// Start an interactive chat.
    Chat {
        /// Start with streaming on.
        #[arg(short, long)]
        stream: bool,

        /// Keep the text of an interrupted answer in the transcript.
        #[arg(long)]
        keep_partial: bool,
    },

    /// Retrieve context and print the assembled prompt without calling the
    /// model.
    Prompt {
        /// Question to build the prompt for.
        question: String,
    },

    /// Show the resolved settings.
    Config,
}

impl Cli {
    /// Resolves the retriever settings.
    ///
    /// A `--documents` file takes precedence over the knowledge base.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for missing or invalid values.
    pub fn retriever_settings(&self) -> Result<RetrieverSettings> {
        match &self.documents {
            Some(path) => RetrieverSettings::static_file(path.clone(), self.result_limit),
            None => RetrieverSettings::knowledge_base(
                &self.region,
                self.knowledge_base_id.as_deref(),
                self.retriever_endpoint.as_deref(),
                self.result_limit,
            ),
        }
    }

    /// Resolves the model settings.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown provider or invalid
    /// values. A missing API key is reported only when a model is created.
    pub fn model_settings(&self) -> Result<ModelSettings> {
        let provider: Provider = self.provider.parse()?;
        ModelSettings::new(
            provider,
            &self.model,
            self.api_base.as_deref(),
            self.api_key.as_deref(),
            self.max_tokens,
        )
    }

    /// Resolves all settings.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error found.
    pub fn settings(&self) -> Result<Settings> {
        Ok(Settings {
            retriever: self.retriever_settings()?,
            model: self.model_settings()?,
        })
    }
}

//! Output formatting for CLI commands.
//!
//! Supports text, JSON and newline-delimited JSON output formats.

use crate::chat::SOURCES_HEADING;
use crate::config::{RetrieverSource, Settings};
use crate::core::{Document, GenerationResult, PartialResult};
use crate::error::Error;
use serde::Serialize;
use serde_json::json;
use std::fmt::Write;

/// Characters of document content shown in source listings.
const SOURCE_PREVIEW_CHARS: usize = 120;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output.
    Json,
    /// One JSON value per line.
    Ndjson,
}

impl OutputFormat {
    /// Parses format from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "ndjson" | "jsonl" => Self::Ndjson,
            _ => Self::Text,
        }
    }
}

/// Formats the answer to one question.
#[must_use]
pub fn format_result(result: &GenerationResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!("{}\n", result.response),
        OutputFormat::Json => format!("{}\n", format_json(result)),
        OutputFormat::Ndjson => format!("{}\n", format_json_line(result)),
    }
}

/// Formats one element of a streamed answer.
///
/// Text output shows fragments only; JSON formats emit every element as
/// its own line.
#[must_use]
pub fn format_partial(item: &PartialResult, format: OutputFormat) -> String {
    match (format, item) {
        (OutputFormat::Text, PartialResult::Response(fragment)) => fragment.clone(),
        (OutputFormat::Text, PartialResult::Context(_)) => String::new(),
        (OutputFormat::Json | OutputFormat::Ndjson, item) => {
            format!("{}\n", format_json_line(item))
        }
    }
}

/// Formats the documents an answer was generated from.
///
/// Returns an empty string for an empty context.
#[must_use]
pub fn format_sources(context: &[Document]) -> String {
    if context.is_empty() {
        return String::new();
    }

    let mut output = String::new();
    let _ = writeln!(output, "{SOURCES_HEADING}");
    for (index, doc) in context.iter().enumerate() {
        let source = doc.source.as_deref().unwrap_or("-");
        match doc.score {
            Some(score) => {
                let _ = writeln!(output, "  [{index}] {source} (score {score:.3})");
            }
            None => {
                let _ = writeln!(output, "  [{index}] {source}");
            }
        }
        let preview = truncate(&doc.content.replace('\n', " "), SOURCE_PREVIEW_CHARS);
        let _ = writeln!(output, "      {preview}");
    }
    output
}

/// Formats a dry-run prompt.
#[must_use]
pub fn format_prompt(context: &[Document], prompt: &str, format: OutputFormat) -> String {
    #[derive(Serialize)]
    struct PromptOutput<'a> {
        context: &'a [Document],
        prompt: &'a str,
    }

    let value = PromptOutput { context, prompt };
    match format {
        OutputFormat::Text => {
            let mut output = prompt.to_string();
            if !output.ends_with('\n') {
                output.push('\n');
            }
            output
        }
        OutputFormat::Json => format!("{}\n", format_json(&value)),
        OutputFormat::Ndjson => format!("{}\n", format_json_line(&value)),
    }
}

/// Formats resolved settings. The API key is never shown.
#[must_use]
pub fn format_settings(settings: &Settings, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_settings_text(settings),
        OutputFormat::Json => format!("{}\n", format_json(settings)),
        OutputFormat::Ndjson => format!("{}\n", format_json_line(settings)),
    }
}

fn format_settings_text(settings: &Settings) -> String {
    let mut output = String::new();
    output.push_str("kb-rag Settings\n");
    output.push_str("===============\n\n");

    match &settings.retriever.source {
        RetrieverSource::KnowledgeBase {
            endpoint,
            knowledge_base_id,
        } => {
            let _ = writeln!(output, "  Retriever:       knowledge base {knowledge_base_id}");
            let _ = writeln!(output, "  Endpoint:        {endpoint}");
        }
        RetrieverSource::StaticFile { path } => {
            let _ = writeln!(output, "  Retriever:       static file {}", path.display());
        }
    }
    let _ = writeln!(output, "  Result limit:    {}", settings.retriever.result_limit);

    let model = &settings.model;
    let _ = writeln!(output, "  Provider:        {}", model.provider);
    let _ = writeln!(output, "  Model:           {}", model.model_id);
    let _ = writeln!(
        output,
        "  API base:        {}",
        model.api_base.as_deref().unwrap_or("(provider default)")
    );
    let _ = writeln!(
        output,
        "  API key:         {}",
        if model.api_key.is_some() { "set" } else { "not set" }
    );
    let _ = writeln!(output, "  Max tokens:      {}", model.sampling.max_output_tokens);
    let _ = writeln!(output, "  Temperature:     {}", model.sampling.temperature);
    let _ = writeln!(output, "  Top k / top p:   {} / {}", model.sampling.top_k, model.sampling.top_p);
    let _ = writeln!(
        output,
        "  Stop sequences:  {}",
        format_json_line(&model.sampling.stop_sequences)
    );
    output
}

/// Formats an error for display.
///
/// JSON formats produce `{"error": {"kind": ..., "message": ...}}`.
#[must_use]
pub fn format_error(error: &Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => error.to_string(),
        OutputFormat::Json | OutputFormat::Ndjson => {
            let value = json!({
                "error": {
                    "kind": error_kind(error),
                    "message": error.to_string(),
                }
            });
            format_json_line(&value)
        }
    }
}

const fn error_kind(error: &Error) -> &'static str {
    match error {
        Error::Retrieval(_) => "retrieval",
        Error::Generation(_) => "generation",
        Error::Config(_) => "configuration",
        Error::Io(_) => "io",
        Error::Command(_) => "command",
        Error::InvalidState { .. } => "invalid_state",
    }
}

/// Formats a value as pretty JSON.
fn format_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Formats a value as single-line JSON.
fn format_json_line<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

/// Truncates a string to at most `max_len` bytes with ellipsis, on a char
/// boundary.
fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s[..find_char_boundary(s, max_len)].to_string()
    } else {
        format!("{}...", &s[..find_char_boundary(s, max_len - 3)])
    }
}

/// Finds the nearest character boundary at or before `pos`.
fn find_char_boundary(s: &str, pos: usize) -> usize {
    if pos >= s.len() {
        return s.len();
    }
    let mut boundary = pos;
    while boundary > 0 && !s.is_char_boundary(boundary) {
        boundary -= 1;
    }
    boundary
}

//! Prompt template and assembly.
//!
//! The template carries four fixed instructions into every model call:
//! the "don't know" fallback, the note that the API spec is in the supplied
//! documents, the Selenium test-case format, and the fixed placeholder
//! domain. [`assemble`] is a pure function of the context and question.

use crate::core::Document;
use std::fmt::Write;

/// Placeholder domain every generated test case must use.
pub const PLACEHOLDER_DOMAIN: &str = "woowa.in";

/// Opening line of the template.
pub const PREAMBLE: &str = "You are a helpful assistant who writes test cases for the API server. Follow these instructions:";

/// Rule 1: admit ignorance instead of fabricating.
pub const RULE_DONT_KNOW: &str =
    "1. If you do not know the answer, just say you don't know. Don't make up information.";

/// Rule 2: the API specification is part of the supplied documents.
pub const RULE_API_SPEC: &str = "2. API Spec is included in the following document.";

/// Rule 3: output format is Selenium test cases.
pub const RULE_SELENIUM: &str = "3. Write test cases in accordance with Selenium.";

/// Rule 4: always use the placeholder domain.
pub const RULE_DOMAIN: &str = "4. When writing a test case, always use 'woowa.in' as the domain, regardless of the actual URL.";

/// Full prompt template with `{context}` and `{question}` slots.
pub const PROMPT_TEMPLATE: &str = "
You are a helpful assistant who writes test cases for the API server. Follow these instructions:
1. If you do not know the answer, just say you don't know. Don't make up information.
2. API Spec is included in the following document.
3. Write test cases in accordance with Selenium.
4. When writing a test case, always use 'woowa.in' as the domain, regardless of the actual URL.

Documents: {context}
Question: {question}
";

const CONTEXT_SLOT: &str = "{context}";
const QUESTION_SLOT: &str = "{question}";

/// Assembles the prompt for a question and its retrieved context.
///
/// Deterministic: identical inputs always produce an identical string.
/// An empty context leaves the `Documents:` section empty.
///
/// # Examples
///
/// ```
/// use kb_rag::prompt::{assemble, RULE_DOMAIN};
///
/// let prompt = assemble(&[], "What is the refund policy?");
/// assert!(prompt.contains(RULE_DOMAIN));
/// assert!(prompt.contains("Documents: \nQuestion: What is the refund policy?"));
/// ```
#[must_use]
pub fn assemble(context: &[Document], question: &str) -> String {
    let (head, rest) = PROMPT_TEMPLATE
        .split_once(CONTEXT_SLOT)
        .unwrap_or((PROMPT_TEMPLATE, ""));
    let (middle, tail) = rest.split_once(QUESTION_SLOT).unwrap_or((rest, ""));

    // Substitute positionally so slot-like text inside documents or the
    // question is never re-expanded.
    let rendered = render_context(context);
    let mut prompt =
        String::with_capacity(PROMPT_TEMPLATE.len() + rendered.len() + question.len());
    prompt.push_str(head);
    prompt.push_str(&rendered);
    prompt.push_str(middle);
    prompt.push_str(question);
    prompt.push_str(tail);
    prompt
}

/// Renders documents for the `{context}` slot.
///
/// Each document becomes a `<document>` block in retrieval order. Returns
/// an empty string for an empty context.
#[must_use]
pub fn render_context(context: &[Document]) -> String {
    let mut rendered = String::new();
    for (index, doc) in context.iter().enumerate() {
        let _ = write!(rendered, "\n<document index=\"{index}\"");
        if let Some(ref source) = doc.source {
            let _ = write!(rendered, " source=\"{source}\"");
        }
        let _ = write!(rendered, ">\n{}\n</document>", doc.content);
    }
    rendered
}

//! CLI command implementations.
//!
//! Contains the business logic for each CLI command. Output is written to
//! the given writer as it is produced so streamed answers appear
//! incrementally.

use crate::chat::{AbandonPolicy, ChatController, Session};
use crate::cli::output::{
    OutputFormat, format_partial, format_prompt, format_result, format_settings,
};
use crate::cli::parser::{Cli, Commands};
use crate::cli::repl::{self, Interrupt, LineEditor};
use crate::error::{CommandError, Result};
use crate::pipeline::{Pipeline, build_prompt};
use crate::retriever::create_retriever;
use futures_util::StreamExt;
use std::io::Write;
use tracing::info;

/// Questions answered by `ask` when none are given.
pub const BUILTIN_QUESTIONS: [&str; 2] = [
    "가게 픽업주소안내문구 수정 API를 정보를 알고 싶어",
    "가게 픽업주소안내문구 수정 API의 테스트 케이스를 Python으로 작성해줘",
];

/// Executes the CLI command, writing its output to `out`.
///
/// # Errors
///
/// Returns an error if configuration is invalid, retrieval or generation
/// fails in script mode, or output cannot be written.
pub async fn execute<W: Write>(cli: &Cli, out: &mut W) -> Result<()> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Ask { questions, stream } => cmd_ask(cli, questions, *stream, format, out).await,
        Commands::Chat {
            stream,
            keep_partial,
        } => cmd_chat(cli, *stream, *keep_partial, out).await,
        Commands::Prompt { question } => cmd_prompt(cli, question, format, out).await,
        Commands::Config => cmd_config(cli, format, out),
    }
}

async fn cmd_ask<W: Write>(
    cli: &Cli,
    questions: &[String],
    stream: bool,
    format: OutputFormat,
    out: &mut W,
) -> Result<()> {
    let questions: Vec<&str> = if questions.is_empty() {
        BUILTIN_QUESTIONS.to_vec()
    } else {
        questions
            .iter()
            .map(|question| require_question(question))
            .collect::<Result<_>>()?
    };
    let pipeline = Pipeline::from_settings(&cli.settings()?)?;

    for question in questions {
        info!(question, "answering");
        if stream {
            let mut results = pipeline.run_stream(question).await?;
            while let Some(item) = results.next().await {
                write!(out, "{}", format_partial(&item?, format))?;
                out.flush()?;
            }
            if format == OutputFormat::Text {
                writeln!(out)?;
            }
        } else {
            let result = pipeline.run(question).await?;
            write!(out, "{}", format_result(&result, format))?;
        }
    }
    Ok(())
}

async fn cmd_chat<W: Write>(
    cli: &Cli,
    stream: bool,
    keep_partial: bool,
    out: &mut W,
) -> Result<()> {
    let pipeline = Pipeline::from_settings(&cli.settings()?)?;
    let policy = if keep_partial {
        AbandonPolicy::CommitPartial
    } else {
        AbandonPolicy::Discard
    };

    let mut controller = ChatController::new(pipeline)
        .with_streaming(stream)
        .with_abandon_policy(policy);
    let mut session = Session::new();
    let interrupt = Interrupt::install();

    let mut input = LineEditor::spawn();

    repl::run(&mut controller, &mut session, &mut input, out, &interrupt).await
}

async fn cmd_prompt<W: Write>(
    cli: &Cli,
    question: &str,
    format: OutputFormat,
    out: &mut W,
) -> Result<()> {
    let question = require_question(question)?;
    let retriever = create_retriever(&cli.retriever_settings()?)?;
    let (context, prompt) = build_prompt(retriever.as_ref(), question).await?;
    write!(out, "{}", format_prompt(&context, &prompt, format))?;
    Ok(())
}

/// Rejects blank questions before any settings are resolved.
fn require_question(question: &str) -> Result<&str> {
    if question.trim().is_empty() {
        return Err(CommandError::InvalidArgument("question must not be blank".to_string()).into());
    }
    Ok(question)
}

fn cmd_config<W: Write>(cli: &Cli, format: OutputFormat, out: &mut W) -> Result<()> {
    let settings = cli.settings()?;
    write!(out, "{}", format_settings(&settings, format))?;
    Ok(())
}

//! Binary entry point for kb-rag.
//!
//! kb-rag: knowledge-base RAG for API test-case generation.

#![allow(clippy::print_stderr)]

use clap::Parser;
use kb_rag::cli::output::{OutputFormat, format_error};
use kb_rag::cli::repl::INTERRUPT_EXIT_CODE;
use kb_rag::cli::{Cli, execute};
use kb_rag::error::{CommandError, Error, IoError};
use kb_rag::logging;
use std::io::{self, Write};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let format = OutputFormat::parse(&cli.format);
    logging::init(cli.verbose);

    let mut stdout = io::stdout();
    match execute(&cli, &mut stdout).await {
        // Handle broken pipe gracefully (e.g., when piped to `head` or `jq`)
        Ok(()) | Err(Error::Io(IoError::BrokenPipe)) => ExitCode::SUCCESS,
        Err(Error::Command(CommandError::Interrupted)) => ExitCode::from(INTERRUPT_EXIT_CODE),
        Err(e) => {
            let error_output = format_error(&e, format);
            match format {
                OutputFormat::Json | OutputFormat::Ndjson => {
                    // JSON errors go to stdout for programmatic parsing
                    let _ = writeln!(stdout, "{error_output}");
                }
                OutputFormat::Text => {
                    eprintln!("Error: {error_output}");
                }
            }
            ExitCode::FAILURE
        }
    }
}

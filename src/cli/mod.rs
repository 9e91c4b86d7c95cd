//! CLI layer for kb-rag.
//!
//! Provides the command-line interface using clap: one-shot script mode
//! (`ask`), the interactive chat (`chat`) and inspection commands
//! (`prompt`, `config`).

pub mod commands;
pub mod output;
pub mod parser;
pub mod repl;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands};

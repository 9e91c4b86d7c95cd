//! Terminal front end for the interactive chat.
//!
//! Reads one line per turn through a [`LineSource`], handles slash
//! commands, and renders turns through [`TerminalRenderer`]. Ctrl-C during
//! a turn abandons it; at the prompt it ends the chat.

use crate::chat::{ChatController, Renderer, Session, TITLE, TurnOutcome};
use crate::cli::output::format_sources;
use crate::core::Document;
use crate::error::{CommandError, Error, Result};
use async_trait::async_trait;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use std::io::Write;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufRead, Lines};
use tokio::sync::{Notify, mpsc};
use tracing::debug;

/// Exit status after Ctrl-C outside a turn.
pub const INTERRUPT_EXIT_CODE: u8 = 130;

const PROMPT: &str = "> ";

const COMMANDS_HELP: &str = "/stream [on|off]  /clear  /history  /help  /quit";

/// Slash commands offered for completion.
const COMMANDS: [&str; 6] = ["/stream", "/clear", "/history", "/help", "/quit", "/exit"];

/// A slash command typed at the chat prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// Set or toggle streaming.
    Stream(Option<bool>),
    /// Reset the session.
    Clear,
    /// Replay the transcript.
    History,
    /// List commands.
    Help,
    /// Leave the chat.
    Quit,
    /// Anything else starting with `/`.
    Unknown(String),
}

impl ReplCommand {
    /// Parses a slash command. Returns `None` for an ordinary message.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.trim().strip_prefix('/')?;
        let mut parts = rest.split_whitespace();

        let command = match (parts.next().unwrap_or_default(), parts.next()) {
            ("stream", None) => Self::Stream(None),
            ("stream", Some("on")) => Self::Stream(Some(true)),
            ("stream", Some("off")) => Self::Stream(Some(false)),
            ("clear", None) => Self::Clear,
            ("history", None) => Self::History,
            ("help", None) => Self::Help,
            ("quit" | "exit", None) => Self::Quit,
            _ => Self::Unknown(line.trim().to_string()),
        };
        Some(command)
    }
}

/// Slash commands that complete `typed`, in listing order.
fn command_candidates(typed: &str) -> impl Iterator<Item = &'static str> + '_ {
    let completable = typed.starts_with('/') && !typed.contains(char::is_whitespace);
    COMMANDS
        .into_iter()
        .filter(move |command| completable && command.starts_with(typed))
}

/// Remainder of the first command completing `typed`.
fn command_hint(typed: &str) -> Option<String> {
    command_candidates(typed)
        .find(|command| command.len() > typed.len())
        .map(|command| command[typed.len()..].to_string())
}

/// Source of chat input lines.
#[async_trait]
pub trait LineSource: Send {
    /// Reads the next line, showing `prompt` if the source is interactive.
    ///
    /// Returns `None` at end of input.
    ///
    /// # Errors
    ///
    /// Returns an error if input cannot be read, or
    /// [`CommandError::Interrupted`] if the user pressed Ctrl-C.
    async fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> LineSource for Lines<R> {
    async fn read_line(&mut self, _prompt: &str) -> Result<Option<String>> {
        Ok(self.next_line().await?)
    }
}

/// Rustyline helper completing and hinting slash commands.
struct SlashCommands;

impl Helper for SlashCommands {}

impl Completer for SlashCommands {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let candidates = command_candidates(line.get(..pos).unwrap_or(line))
            .map(|command| Pair {
                display: command.to_string(),
                replacement: command.to_string(),
            })
            .collect();
        Ok((0, candidates))
    }
}

impl Hinter for SlashCommands {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        if pos < line.len() {
            return None;
        }
        command_hint(line)
    }
}

impl Highlighter for SlashCommands {}

impl Validator for SlashCommands {}

enum ReadOutcome {
    Line(String),
    Eof,
    Interrupted,
    Failed(String),
}

/// Terminal input with line editing, history and slash-command completion.
///
/// The editor blocks on the terminal, so it runs on its own thread and
/// reads a line only when asked for one.
pub struct LineEditor {
    prompts: std::sync::mpsc::Sender<String>,
    lines: mpsc::Receiver<ReadOutcome>,
}

impl LineEditor {
    /// Starts the editor thread.
    #[must_use]
    pub fn spawn() -> Self {
        let (prompt_tx, prompt_rx) = std::sync::mpsc::channel();
        let (line_tx, line_rx) = mpsc::channel(1);
        std::thread::spawn(move || edit_lines(&prompt_rx, &line_tx));
        Self {
            prompts: prompt_tx,
            lines: line_rx,
        }
    }
}

fn edit_lines(prompts: &std::sync::mpsc::Receiver<String>, lines: &mpsc::Sender<ReadOutcome>) {
    let mut editor = match Editor::<SlashCommands, DefaultHistory>::new() {
        Ok(editor) => editor,
        Err(e) => {
            let _ = lines.blocking_send(ReadOutcome::Failed(e.to_string()));
            return;
        }
    };
    editor.set_helper(Some(SlashCommands));

    while let Ok(prompt) = prompts.recv() {
        let outcome = match editor.readline(&prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = editor.add_history_entry(line.as_str());
                }
                ReadOutcome::Line(line)
            }
            Err(ReadlineError::Eof) => ReadOutcome::Eof,
            Err(ReadlineError::Interrupted) => ReadOutcome::Interrupted,
            Err(e) => ReadOutcome::Failed(e.to_string()),
        };
        if lines.blocking_send(outcome).is_err() {
            break;
        }
    }
}

#[async_trait]
impl LineSource for LineEditor {
    async fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        let closed = || CommandError::ExecutionFailed("line editor stopped".to_string());

        self.prompts.send(prompt.to_string()).map_err(|_| closed())?;
        match self.lines.recv().await {
            Some(ReadOutcome::Line(line)) => Ok(Some(line)),
            Some(ReadOutcome::Eof) => Ok(None),
            Some(ReadOutcome::Interrupted) => Err(CommandError::Interrupted.into()),
            Some(ReadOutcome::Failed(reason)) => {
                Err(CommandError::ExecutionFailed(format!("line editor: {reason}")).into())
            }
            None => Err(closed().into()),
        }
    }
}

/// Ctrl-C state shared between the signal listener and the chat loop.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    requested: Arc<AtomicBool>,
    in_turn: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Interrupt {
    /// Creates interrupt state with no signal listener attached.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates interrupt state fed by a Ctrl-C listener task.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn install() -> Self {
        let interrupt = Self::new();
        let listener = interrupt.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if listener.in_turn.load(Ordering::SeqCst) {
                    debug!("interrupt requested");
                    listener.request();
                } else {
                    std::process::exit(i32::from(INTERRUPT_EXIT_CODE));
                }
            }
        });
        interrupt
    }

    /// Interrupts the current turn.
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Resolves once the current turn is interrupted.
    pub async fn requested(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.requested.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }

    fn begin_turn(&self) {
        self.requested.store(false, Ordering::SeqCst);
        self.in_turn.store(true, Ordering::SeqCst);
    }

    fn end_turn(&self) {
        self.in_turn.store(false, Ordering::SeqCst);
    }
}

/// [`Renderer`] writing plain text to a terminal.
pub struct TerminalRenderer<'a, W: Write> {
    out: &'a mut W,
    streaming: bool,
}

impl<'a, W: Write> TerminalRenderer<'a, W> {
    /// Creates a renderer writing to `out`.
    pub const fn new(out: &'a mut W) -> Self {
        Self {
            out,
            streaming: false,
        }
    }
}

impl<W: Write> Renderer for TerminalRenderer<'_, W> {
    fn user_message(&mut self, _content: &str) -> Result<()> {
        // Already on screen as typed
        Ok(())
    }

    fn fragment(&mut self, text: &str) -> Result<ControlFlow<()>> {
        if !self.streaming {
            write!(self.out, "assistant: ")?;
            self.streaming = true;
        }
        write!(self.out, "{text}")?;
        self.out.flush()?;
        Ok(ControlFlow::Continue(()))
    }

    fn end_stream(&mut self, abandoned: bool) -> Result<()> {
        if !self.streaming {
            write!(self.out, "assistant:")?;
        }
        self.streaming = false;
        if abandoned {
            writeln!(self.out, " [stopped]")?;
        } else {
            writeln!(self.out)?;
        }
        Ok(())
    }

    fn response(&mut self, text: &str) -> Result<()> {
        writeln!(self.out, "assistant: {text}")?;
        Ok(())
    }

    fn sources(&mut self, context: &[Document]) -> Result<()> {
        write!(self.out, "{}", format_sources(context))?;
        Ok(())
    }

    fn error(&mut self, error: &Error) -> Result<()> {
        writeln!(self.out, "error: {error}")?;
        Ok(())
    }
}

/// Runs the chat until `/quit` or end of input.
///
/// # Errors
///
/// Returns an error if input cannot be read or output cannot be written,
/// or [`CommandError::Interrupted`] after Ctrl-C at the prompt. Failed
/// turns are shown to the user and do not end the chat.
pub async fn run<L, W>(
    controller: &mut ChatController,
    session: &mut Session,
    input: &mut L,
    out: &mut W,
    interrupt: &Interrupt,
) -> Result<()>
where
    L: LineSource + ?Sized,
    W: Write,
{
    write_header(out, controller.streaming())?;
    write_history(out, session)?;

    loop {
        out.flush()?;
        let Some(line) = input.read_line(PROMPT).await? else {
            writeln!(out)?;
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match ReplCommand::parse(line) {
            Some(ReplCommand::Quit) => break,
            Some(ReplCommand::Stream(value)) => {
                let on = value.unwrap_or(!controller.streaming());
                controller.set_streaming(on);
                writeln!(out, "streaming {}", on_off(on))?;
            }
            Some(ReplCommand::Clear) => {
                controller.clear(session)?;
                write_history(out, session)?;
            }
            Some(ReplCommand::History) => write_history(out, session)?,
            Some(ReplCommand::Help) => writeln!(out, "commands: {COMMANDS_HELP}")?,
            Some(ReplCommand::Unknown(command)) => {
                writeln!(out, "unknown command: {command} (try /help)")?;
            }
            None => {
                interrupt.begin_turn();
                let turn = run_turn(controller, session, line, out, interrupt).await;
                interrupt.end_turn();
                turn?;
            }
        }
    }
    Ok(())
}

/// Runs one turn, abandoning it if `interrupt` fires first.
async fn run_turn<W: Write>(
    controller: &mut ChatController,
    session: &mut Session,
    line: &str,
    out: &mut W,
    interrupt: &Interrupt,
) -> Result<TurnOutcome> {
    let mut renderer = TerminalRenderer::new(out);
    let finished = tokio::select! {
        biased;
        outcome = controller.submit(session, line, &mut renderer) => Some(outcome),
        () = interrupt.requested() => None,
    };

    match finished {
        Some(outcome) => outcome,
        None => {
            debug!("turn interrupted");
            controller.interrupt(session, &mut renderer)
        }
    }
}

fn write_header<W: Write>(out: &mut W, streaming: bool) -> Result<()> {
    writeln!(out, "{TITLE}")?;
    writeln!(out, "{}", "=".repeat(TITLE.chars().count()))?;
    writeln!(out, "streaming: {}", on_off(streaming))?;
    writeln!(out, "commands: {COMMANDS_HELP}")?;
    writeln!(out)?;
    Ok(())
}

fn write_history<W: Write>(out: &mut W, session: &Session) -> Result<()> {
    for message in session.messages() {
        writeln!(out, "{}: {}", message.role, message.content)?;
    }
    Ok(())
}

const fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

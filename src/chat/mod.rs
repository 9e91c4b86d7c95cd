//! Interactive chat.
//!
//! Surface-independent pieces of the chat mode: the [`Session`]
//! transcript, the [`TurnState`] machine and the [`ChatController`] that
//! runs turns through a [`Renderer`]. The terminal front end lives in
//! `cli::repl`.

mod handler;
mod session;
mod state;

pub use handler::{AbandonPolicy, ChatController, Renderer, TurnOutcome};
pub use session::{GREETING, Message, Role, Session};
pub use state::{TurnEvent, TurnState};

/// Chat window title.
pub const TITLE: &str = "Knowledge Bases for Amazon Bedrock and LangChain 🦜️🔗";

/// Heading shown above the retrieved sources of an answer.
pub const SOURCES_HEADING: &str = "Show source details >";

//! Turn state machine.

use crate::error::{Error, Result};
use std::fmt;

/// Where the chat is within a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    /// Waiting for input.
    #[default]
    Idle,
    /// Input submitted; retrieval and generation under way.
    AwaitingResponse,
    /// Fragments are being rendered.
    Streaming,
    /// The answer is complete and about to be committed.
    Displaying,
}

/// Something that happened during a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnEvent {
    /// The user submitted a message.
    Submit,
    /// Generation started streaming.
    StreamStarted,
    /// A blocking answer arrived.
    ResponseReady,
    /// The stream was exhausted or abandoned.
    StreamEnded,
    /// The answer was committed to the session.
    Committed,
    /// Retrieval or generation failed.
    Failed,
}

impl TurnState {
    /// Applies `event`, returning the next state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if `event` is not allowed in this
    /// state.
    pub fn transition(self, event: TurnEvent) -> Result<Self> {
        use TurnEvent as E;

        match (self, event) {
            (Self::Idle, E::Submit) => Ok(Self::AwaitingResponse),
            (Self::AwaitingResponse, E::StreamStarted) => Ok(Self::Streaming),
            (Self::AwaitingResponse, E::ResponseReady) | (Self::Streaming, E::StreamEnded) => {
                Ok(Self::Displaying)
            }
            (Self::Displaying, E::Committed) => Ok(Self::Idle),
            (state, E::Failed) if state.is_busy() => Ok(Self::Idle),
            (state, event) => Err(Error::InvalidState {
                message: format!("cannot apply {event:?} while {state}"),
            }),
        }
    }

    /// Returns `true` while a turn is in progress.
    #[must_use]
    pub const fn is_busy(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::AwaitingResponse => "awaiting response",
            Self::Streaming => "streaming",
            Self::Displaying => "displaying",
        })
    }
}

//! Turn handling.
//!
//! [`ChatController`] drives one turn at a time through the
//! [`TurnState`] machine: it records the user message, runs the pipeline
//! in blocking or streaming mode, hands output to a [`Renderer`] and
//! commits the answer to the [`Session`] only once the turn is over.

use super::session::{Role, Session};
use super::state::{TurnEvent, TurnState};
use crate::core::{Document, GenerationResult, PartialResult};
use crate::error::{Error, Result};
use crate::pipeline::Pipeline;
use futures_util::StreamExt;
use std::ops::ControlFlow;
use tracing::{info, warn};

/// Output side of the chat.
pub trait Renderer {
    /// Shows a submitted user message.
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be written.
    fn user_message(&mut self, content: &str) -> Result<()>;

    /// Shows one streamed fragment.
    ///
    /// Returning [`ControlFlow::Break`] abandons the rest of the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be written.
    fn fragment(&mut self, text: &str) -> Result<ControlFlow<()>>;

    /// Ends a streamed or interrupted answer, `abandoned` if it was cut
    /// short.
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be written.
    fn end_stream(&mut self, abandoned: bool) -> Result<()>;

    /// Shows a complete, non-streamed answer.
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be written.
    fn response(&mut self, text: &str) -> Result<()>;

    /// Shows the documents the answer was generated from.
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be written.
    fn sources(&mut self, context: &[Document]) -> Result<()>;

    /// Shows a failed turn.
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be written.
    fn error(&mut self, error: &Error) -> Result<()>;
}

/// What happens to the text of an abandoned stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AbandonPolicy {
    /// Commit nothing; the session ends with the user message.
    #[default]
    Discard,
    /// Commit the text received so far as the assistant answer.
    CommitPartial,
}

/// How a turn ended.
#[derive(Debug)]
pub enum TurnOutcome {
    /// The answer was generated in full and committed.
    Completed(GenerationResult),
    /// The stream was abandoned.
    Abandoned {
        /// Text received before abandonment.
        partial: String,
        /// Whether `partial` was committed to the session.
        committed: bool,
    },
    /// Retrieval or generation failed; the error has been rendered.
    Failed(Error),
}

/// Drives chat turns against a pipeline.
pub struct ChatController {
    pipeline: Pipeline,
    state: TurnState,
    streaming: bool,
    abandon_policy: AbandonPolicy,
    partial: String,
}

impl ChatController {
    /// Creates an idle controller with streaming off.
    #[must_use]
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            state: TurnState::Idle,
            streaming: false,
            abandon_policy: AbandonPolicy::default(),
            partial: String::new(),
        }
    }

    /// Sets the initial streaming toggle.
    #[must_use]
    pub const fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Sets the abandonment policy.
    #[must_use]
    pub const fn with_abandon_policy(mut self, policy: AbandonPolicy) -> Self {
        self.abandon_policy = policy;
        self
    }

    /// Returns the current turn state.
    #[must_use]
    pub const fn state(&self) -> TurnState {
        self.state
    }

    /// Returns whether answers are streamed.
    #[must_use]
    pub const fn streaming(&self) -> bool {
        self.streaming
    }

    /// Turns streaming on or off for the following turns.
    pub const fn set_streaming(&mut self, streaming: bool) {
        self.streaming = streaming;
    }

    /// Resets `session` to the greeting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless the controller is idle.
    pub fn clear(&mut self, session: &mut Session) -> Result<()> {
        if self.state.is_busy() {
            return Err(Error::InvalidState {
                message: format!("cannot clear the session while {}", self.state),
            });
        }
        session.reset();
        Ok(())
    }

    /// Runs one turn for `input`.
    ///
    /// The user message is appended to `session` immediately. The
    /// assistant answer is appended only after the turn completes (or is
    /// abandoned under [`AbandonPolicy::CommitPartial`]). Retrieval and
    /// generation failures are rendered and reported as
    /// [`TurnOutcome::Failed`]; the controller is idle again afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if a turn is already in progress, or
    /// an error if the renderer fails while reporting a failure.
    pub async fn submit<R: Renderer>(
        &mut self,
        session: &mut Session,
        input: &str,
        renderer: &mut R,
    ) -> Result<TurnOutcome> {
        self.advance(TurnEvent::Submit)?;
        session.push(Role::User, input);

        let turn = match renderer.user_message(input) {
            Ok(()) if self.streaming => self.streamed_turn(session, input, renderer).await,
            Ok(()) => self.blocking_turn(session, input, renderer).await,
            Err(e) => Err(e),
        };

        match turn {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.advance(TurnEvent::Failed)?;
                info!(error = %e, "turn failed");
                renderer.error(&e)?;
                Ok(TurnOutcome::Failed(e))
            }
        }
    }

    /// Ends a turn whose [`submit`](Self::submit) future was dropped
    /// before it finished.
    ///
    /// A turn cut off while streaming is abandoned: the text received so
    /// far is committed under [`AbandonPolicy::CommitPartial`]. A turn cut
    /// off before any answer arrived commits nothing. Either way the
    /// renderer is told the answer was abandoned and the controller is
    /// idle afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if no turn is in progress, or an
    /// error if the renderer fails.
    pub fn interrupt<R: Renderer>(
        &mut self,
        session: &mut Session,
        renderer: &mut R,
    ) -> Result<TurnOutcome> {
        let partial = std::mem::take(&mut self.partial);
        if self.state != TurnState::Streaming {
            self.advance(TurnEvent::Failed)?;
            renderer.end_stream(true)?;
            warn!("turn interrupted before an answer arrived");
            return Ok(TurnOutcome::Abandoned {
                partial: String::new(),
                committed: false,
            });
        }

        renderer.end_stream(true)?;
        self.advance(TurnEvent::StreamEnded)?;
        self.commit_abandoned(session, partial)
    }

    async fn blocking_turn<R: Renderer>(
        &mut self,
        session: &mut Session,
        input: &str,
        renderer: &mut R,
    ) -> Result<TurnOutcome> {
        let result = self.pipeline.run(input).await?;
        self.advance(TurnEvent::ResponseReady)?;

        renderer.response(&result.response)?;
        renderer.sources(&result.context)?;

        session.push(Role::Assistant, result.response.clone());
        self.advance(TurnEvent::Committed)?;
        info!(chars = result.response.len(), "turn completed");
        Ok(TurnOutcome::Completed(result))
    }

    async fn streamed_turn<R: Renderer>(
        &mut self,
        session: &mut Session,
        input: &str,
        renderer: &mut R,
    ) -> Result<TurnOutcome> {
        self.partial.clear();
        let mut stream = self.pipeline.run_stream(input).await?;
        self.advance(TurnEvent::StreamStarted)?;

        let mut context = Vec::new();
        let mut abandoned = false;

        while let Some(item) = stream.next().await {
            let item = match item {
                Ok(item) => item,
                Err(e) => {
                    renderer.end_stream(true)?;
                    return Err(e);
                }
            };
            match item {
                PartialResult::Context(docs) => context = docs,
                PartialResult::Response(fragment) => {
                    self.partial.push_str(&fragment);
                    if renderer.fragment(&fragment)?.is_break() {
                        abandoned = true;
                        break;
                    }
                }
            }
        }
        // Dropping the stream stops the producer
        drop(stream);
        let response = std::mem::take(&mut self.partial);

        renderer.end_stream(abandoned)?;
        self.advance(TurnEvent::StreamEnded)?;
        renderer.sources(&context)?;

        if abandoned {
            return self.commit_abandoned(session, response);
        }

        session.push(Role::Assistant, response.clone());
        self.advance(TurnEvent::Committed)?;
        info!(chars = response.len(), "turn completed");
        Ok(TurnOutcome::Completed(GenerationResult { response, context }))
    }

    fn commit_abandoned(&mut self, session: &mut Session, partial: String) -> Result<TurnOutcome> {
        let committed = self.abandon_policy == AbandonPolicy::CommitPartial;
        if committed {
            session.push(Role::Assistant, partial.clone());
        }
        self.advance(TurnEvent::Committed)?;
        warn!(chars = partial.len(), committed, "response stream abandoned");
        Ok(TurnOutcome::Abandoned { partial, committed })
    }

    fn advance(&mut self, event: TurnEvent) -> Result<()> {
        self.state = self.state.transition(event)?;
        Ok(())
    }
}

//! Sampling configuration shared by all model backends.

use crate::error::{ConfigError, Result};
use serde::Serialize;

/// Default maximum number of output tokens.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 8192;

/// Default top-k cutoff.
pub const DEFAULT_TOP_K: u32 = 250;

/// Stop sequence that halts generation if the model starts a new human turn.
pub const DEFAULT_STOP_SEQUENCE: &str = "\n\nHuman";

/// Sampling parameters sent with every generation request.
///
/// Fixed per deployment. The defaults give deterministic sampling
/// (`temperature = 0.0`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SamplingConfig {
    /// Maximum number of tokens to generate.
    pub max_output_tokens: u32,
    /// Sampling temperature (0.0 is deterministic).
    pub temperature: f32,
    /// Top-k cutoff.
    pub top_k: u32,
    /// Nucleus sampling cutoff.
    pub top_p: f32,
    /// Sequences that stop generation when emitted.
    pub stop_sequences: Vec<String>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            temperature: 0.0,
            top_k: DEFAULT_TOP_K,
            top_p: 1.0,
            stop_sequences: vec![DEFAULT_STOP_SEQUENCE.to_string()],
        }
    }
}

impl SamplingConfig {
    /// Creates a sampling config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of output tokens.
    #[must_use]
    pub const fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    /// Validates parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for out-of-range values.
    pub fn validate(&self) -> Result<()> {
        if self.max_output_tokens == 0 {
            return Err(invalid("max_output_tokens", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(invalid("temperature", "must be between 0.0 and 1.0"));
        }
        if self.top_p <= 0.0 || self.top_p > 1.0 {
            return Err(invalid("top_p", "must be in (0.0, 1.0]"));
        }
        if self.top_k == 0 {
            return Err(invalid("top_k", "must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(name: &str, reason: &str) -> crate::Error {
    ConfigError::Invalid {
        name: name.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

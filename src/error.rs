//! Error types for kb-rag operations.
//!
//! This module provides the error hierarchy using `thiserror` for every
//! stage of the pipeline: retrieval, generation, configuration, I/O and
//! CLI commands. Nothing here is retried or translated; errors surface to
//! the interaction surface as-is.

use thiserror::Error;

/// Result type alias for kb-rag operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for kb-rag operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Retriever unreachable or returned a malformed response.
    #[error("retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    /// Model service failure, quota, or malformed output.
    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),

    /// Missing or invalid deployment configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors (document files, console output).
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// CLI command errors.
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// Invalid state errors.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of the invalid state.
        message: String,
    },
}

/// Retrieval-specific errors.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// The retriever service could not be reached.
    #[error("retriever unreachable: {0}")]
    Unreachable(String),

    /// The retriever service answered with a non-success status.
    #[error("retriever returned status {status}: {message}")]
    Upstream {
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// The retriever response could not be decoded.
    #[error("malformed retriever response: {0}")]
    Malformed(String),
}

/// Generation-specific errors.
#[derive(Error, Debug)]
pub enum GenerationError {
    /// The model service could not be reached.
    #[error("model service unreachable: {0}")]
    Unreachable(String),

    /// The model service rejected the request due to rate limiting.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The model service or transport timed out.
    #[error("model request timed out: {0}")]
    Timeout(String),

    /// The model service answered with an error.
    #[error("model service error{}: {message}", .status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Upstream {
        /// HTTP status code, when the error came from a response status.
        status: Option<u16>,
        /// Error message reported by the service.
        message: String,
    },

    /// The model output could not be decoded.
    #[error("malformed model output: {0}")]
    Malformed(String),

    /// The model returned no text content.
    #[error("model returned no text content")]
    EmptyResponse,
}

/// Configuration errors (missing or invalid deployment identifiers).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required setting was not provided.
    #[error("missing required setting: {name}")]
    Missing {
        /// Name of the setting (flag or environment variable).
        name: String,
    },

    /// A setting was provided with an invalid value.
    #[error("invalid setting {name}: {reason}")]
    Invalid {
        /// Name of the setting.
        name: String,
        /// Reason the value is invalid.
        reason: String,
    },

    /// Unknown model provider.
    #[error("unknown model provider: {name}")]
    UnknownProvider {
        /// Name of the unknown provider.
        name: String,
    },
}

/// I/O-specific errors for file and console operations.
#[derive(Error, Debug)]
pub enum IoError {
    /// File not found.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path to the file that was not found.
        path: String,
    },

    /// Failed to read file.
    #[error("failed to read file: {path}: {reason}")]
    ReadFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// The output stream was closed by the reader (e.g. `| head`).
    #[error("broken pipe")]
    BrokenPipe,

    /// Generic I/O error wrapper.
    #[error("I/O error: {0}")]
    Generic(String),
}

/// CLI command-specific errors.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Invalid argument provided.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Command execution failed.
    #[error("command execution failed: {0}")]
    ExecutionFailed(String),

    /// The user pressed Ctrl-C at the chat prompt.
    #[error("interrupted")]
    Interrupted,
}

impl RetrievalError {
    /// Classifies a transport-level `reqwest` failure.
    #[must_use]
    pub fn transport(err: &reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Unreachable(err.to_string())
        }
    }
}

impl GenerationError {
    /// Classifies a transport-level `reqwest` failure.
    #[must_use]
    pub fn transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Unreachable(err.to_string())
        }
    }

    /// Classifies a non-success HTTP status from the model service.
    #[must_use]
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            429 => Self::RateLimited(message),
            408 | 504 => Self::Timeout(message),
            _ => Self::Upstream {
                status: Some(status),
                message,
            },
        }
    }
}

// Implement From traits for standard library and client errors

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::BrokenPipe {
            Self::Io(IoError::BrokenPipe)
        } else {
            Self::Io(IoError::Generic(err.to_string()))
        }
    }
}

#[cfg(feature = "openai")]
impl From<async_openai::error::OpenAIError> for GenerationError {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        use async_openai::error::OpenAIError;

        match err {
            OpenAIError::Reqwest(e) => Self::transport(&e),
            OpenAIError::ApiError(api) => {
                if api.code.as_deref() == Some("rate_limit_exceeded") {
                    Self::RateLimited(api.message)
                } else {
                    Self::Upstream {
                        status: None,
                        message: api.message,
                    }
                }
            }
            OpenAIError::JSONDeserialize(e) => Self::Malformed(e.to_string()),
            OpenAIError::StreamError(message) => Self::Upstream {
                status: None,
                message,
            },
            other => Self::Malformed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidState {
            message: "test error".to_string(),
        };
        assert_eq!(err.to_string(), "invalid state: test error");
    }

    #[test]
    fn test_retrieval_error_display() {
        let err = RetrievalError::Upstream {
            status: 403,
            message: "denied".to_string(),
        };
        assert_eq!(err.to_string(), "retriever returned status 403: denied");

        let err = RetrievalError::Malformed("missing field".to_string());
        assert!(err.to_string().contains("missing field"));
    }

    #[test]
    fn test_generation_error_display() {
        let err = GenerationError::Upstream {
            status: Some(500),
            message: "overloaded".to_string(),
        };
        assert_eq!(err.to_string(), "model service error (status 500): overloaded");

        let err = GenerationError::Upstream {
            status: None,
            message: "overloaded".to_string(),
        };
        assert_eq!(err.to_string(), "model service error: overloaded");

        assert_eq!(
            GenerationError::EmptyResponse.to_string(),
            "model returned no text content"
        );
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Missing {
            name: "--knowledge-base-id".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "missing required setting: --knowledge-base-id"
        );

        let err = ConfigError::UnknownProvider {
            name: "foo".to_string(),
        };
        assert!(err.to_string().contains("foo"));
    }

    #[test_case(429 => matches GenerationError::RateLimited(_); "rate limited")]
    #[test_case(408 => matches GenerationError::Timeout(_); "request timeout")]
    #[test_case(504 => matches GenerationError::Timeout(_); "gateway timeout")]
    #[test_case(500 => matches GenerationError::Upstream { status: Some(500), .. }; "server error")]
    #[test_case(400 => matches GenerationError::Upstream { status: Some(400), .. }; "bad request")]
    fn test_generation_error_from_status(status: u16) -> GenerationError {
        GenerationError::from_status(status, "body".to_string())
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(IoError::Generic(_))));

        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(IoError::BrokenPipe)));
    }

    #[test]
    fn test_error_from_nested() {
        let err: Error = RetrievalError::Unreachable("dns".to_string()).into();
        assert!(matches!(err, Error::Retrieval(_)));

        let err: Error = GenerationError::EmptyResponse.into();
        assert!(matches!(err, Error::Generation(_)));

        let err: Error = ConfigError::Missing {
            name: "x".to_string(),
        }
        .into();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().starts_with("configuration error:"));

        let err: Error = CommandError::InvalidArgument("--bad".to_string()).into();
        assert!(matches!(err, Error::Command(_)));

        let err: Error = CommandError::Interrupted.into();
        assert_eq!(err.to_string(), "command error: interrupted");
    }

    #[test]
    fn test_io_error_variants() {
        let err = IoError::FileNotFound {
            path: "/tmp/docs.json".to_string(),
        };
        assert_eq!(err.to_string(), "file not found: /tmp/docs.json");

        let err = IoError::ReadFailed {
            path: "/tmp/docs.json".to_string(),
            reason: "permission denied".to_string(),
        };
        assert!(err.to_string().contains("permission denied"));
    }
}

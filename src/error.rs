//! Error taxonomy for a conversational turn.
//!
//! Only [`ProtocolViolation`], [`ProjectionError`] and transport failures
//! ([`ProviderError`]) abort a turn; they are unified as [`TurnError`], the
//! error type of the caller-facing stream. [`ToolError`] never propagates:
//! the dispatch loop renders it into the invocation's response so the model
//! can see and correct its own mistake.

use thiserror::Error;

/// The decoder could not reconcile a provider event with its open blocks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    #[error("argument delta (index {index:?}) matches no open tool call")]
    UnresolvableDelta { index: Option<usize> },

    #[error("argument delta addressed to closed tool block at index {index}")]
    DeltaAfterClose { index: usize },

    #[error("tool block at index {index} started without a call id or name")]
    MissingCallIdentity { index: usize },

    #[error("block started at index {index} while the block there is still open")]
    IndexReused { index: usize },

    #[error("tool call id '{id}' was opened twice in one turn")]
    DuplicateCallId { id: String },
}

/// The conversation cannot be expressed as a provider request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectionError {
    #[error("conversation must open with a non-empty system message")]
    MissingSystemPrompt,

    #[error("unsupported message content: {0}")]
    UnsupportedContent(String),
}

/// A tool invocation could not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("tool '{name}' failed: {message}")]
    ExecutionFailed { name: String, message: String },
}

/// The tool registry was built from an inconsistent set of descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("tool name must not be empty")]
    EmptyName,

    #[error("tool '{0}' is registered more than once")]
    DuplicateName(String),

    #[error("tool '{tool}' has an invalid input schema: {reason}")]
    InvalidSchema { tool: String, reason: String },
}

/// Returned when a response is written to an invocation a second time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("tool invocation '{id}' is already resolved")]
pub struct AlreadyResolved {
    pub id: String,
}

/// Transport-level failure talking to a provider.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Network, message)
    }

    pub fn stream(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Stream, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Auth, message)
    }

    /// Maps a non-success HTTP status and its body to an error.
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 | 403 => Self::auth(format!("Authentication failed: {}", body)),
            429 => Self::new(
                ProviderErrorKind::RateLimit,
                format!("Rate limited: {}", body),
            ),
            400 | 404 | 422 => Self::new(
                ProviderErrorKind::InvalidRequest,
                format!("Invalid request: {}", body),
            ),
            500..=599 => Self::new(
                ProviderErrorKind::ServerError,
                format!("Server error: {}", body),
            ),
            _ => Self::new(
                ProviderErrorKind::Unknown,
                format!("HTTP {}: {}", status, body),
            ),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::network(format!("Request timeout: {}", e))
        } else if e.is_connect() {
            Self::network(format!("Connection failed: {}", e))
        } else {
            Self::new(ProviderErrorKind::Unknown, format!("Request failed: {}", e))
        }
    }
}

/// Error classification for provider failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Timeouts and connection failures.
    Network,
    /// 401 / 403.
    Auth,
    /// 429.
    RateLimit,
    /// 5xx.
    ServerError,
    /// Other 4xx: the request itself was rejected.
    InvalidRequest,
    /// The response stream was malformed or carried an error event.
    Stream,
    Unknown,
}

/// Anything that aborts a turn.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

//! Error types for the Addis-Sync domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; the orchestrator converts
//! all of them into natural-language replies before they reach a caller.

use thiserror::Error;

// --- Bounded context errors ---

/// Failure of a single provider adapter call.
///
/// The variant decides what the fallback chain does next:
/// `AuthFailure` disables the adapter for the process lifetime,
/// `TransientFailure` may be retried, `ProtocolFailure` moves on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdapterError {
    #[error("Authentication failed: {0}")]
    AuthFailure(String),

    #[error("Transient failure: {0}")]
    TransientFailure(String),

    #[error("Protocol failure: {0}")]
    ProtocolFailure(String),
}

impl AdapterError {
    /// Short machine-readable kind, used in logs and events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AuthFailure(_) => "auth",
            Self::TransientFailure(_) => "transient",
            Self::ProtocolFailure(_) => "protocol",
        }
    }
}

/// Failure of a tool dispatch. Always fed back to the model as an
/// `{"error": ...}` payload, never surfaced to the end user directly.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },
}

impl ToolError {
    pub fn execution(tool_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            tool_name: tool_name.into(),
            reason: reason.into(),
        }
    }
}

/// Turn-level failures. Both variants are degraded into a user-facing
/// string by the orchestrator; they never escape `run_turn`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrchestrationError {
    #[error("Tool loop reached the limit of {turns} model steps")]
    MaxTurnsExceeded { turns: u32 },

    #[error("All {attempts} provider attempts failed; last error: {last_error}")]
    AllProvidersExhausted {
        attempts: usize,
        last_error: AdapterError,
    },
}

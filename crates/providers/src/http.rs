//! Shared HTTP plumbing for the adapters: client construction and the
//! mapping of transport and status failures onto [`AdapterError`].

use addis_core::AdapterError;
use std::time::Duration;
use tracing::warn;

/// Build a client with a transport-level timeout. The fallback chain applies
/// its own per-candidate timeout on top of this.
pub(crate) fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Failed to build configured HTTP client, using defaults");
            reqwest::Client::new()
        })
}

/// Network-level failures are always worth another candidate.
pub(crate) fn send_error(provider: &str, e: reqwest::Error) -> AdapterError {
    if e.is_timeout() {
        AdapterError::TransientFailure(format!("{provider}: request timed out"))
    } else {
        AdapterError::TransientFailure(format!("{provider}: network error: {e}"))
    }
}

/// Map a non-success HTTP status (and its body) to an adapter error.
pub(crate) fn status_error(provider: &str, status: u16, body: &str) -> AdapterError {
    let snippet: String = body.chars().take(300).collect();
    match status {
        401 | 403 => AdapterError::AuthFailure(format!(
            "{provider}: invalid API key or insufficient permissions ({status})"
        )),
        408 | 429 => AdapterError::TransientFailure(format!(
            "{provider}: rate limited or timed out ({status}): {snippet}"
        )),
        500..=599 => {
            AdapterError::TransientFailure(format!("{provider}: server error ({status}): {snippet}"))
        }
        _ => AdapterError::ProtocolFailure(format!("{provider}: HTTP {status}: {snippet}")),
    }
}

use thiserror::Error;

/// Top-level error type for the `homedeck-api` crate.
///
/// Covers every failure mode across all API surfaces: authentication,
/// transport, backend envelope errors, credential sealing, and the
/// server-sent-events stream. `homedeck-core` maps these into
/// user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login failed (wrong credentials, unknown user, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The backend rejected a bearer token (HTTP 401 on a protected call).
    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Backend ─────────────────────────────────────────────────────
    /// Non-success response from the backend.
    #[error("Backend error (HTTP {status}): {message}")]
    Backend { status: u16, message: String },

    // ── Credential sealing ──────────────────────────────────────────
    /// One-time-key sealing failed (bad key material, cipher failure).
    #[error("Credential sealing failed: {0}")]
    Sealing(String),

    // ── Event stream ────────────────────────────────────────────────
    /// SSE connection failed or broke mid-stream.
    #[error("Event stream error: {0}")]
    Stream(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error means the session is gone and the
    /// caller must tear down client-side session state.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Stream(_) => true,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Backend { status: 404, .. } => true,
            _ => false,
        }
    }
}

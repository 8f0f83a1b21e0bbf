// ── Core error types ──
//
// User-facing errors from homedeck-core. These are NOT API-specific --
// consumers never see HTTP status codes or JSON parse failures directly.
// The `From<homedeck_api::Error>` impl translates transport-layer errors
// into domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Session errors ───────────────────────────────────────────────
    #[error("Not logged in")]
    Disconnected,

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Session expired")]
    SessionExpired,

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Entity not found: {entity_type} with key {key}")]
    NotFound { entity_type: String, key: String },

    #[error("Decode failed: {0}")]
    Decode(String),

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Operation rejected by backend: {message}")]
    Rejected { message: String },

    #[error("Operation cancelled")]
    Cancelled,

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<homedeck_api::Error> for CoreError {
    fn from(err: homedeck_api::Error) -> Self {
        match err {
            homedeck_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            homedeck_api::Error::SessionExpired => CoreError::SessionExpired,
            homedeck_api::Error::Transport(ref e) => {
                if e.status().map(|s| s.as_u16()) == Some(404) {
                    CoreError::NotFound {
                        entity_type: "resource".into(),
                        key: e.url().map(|u| u.path().to_owned()).unwrap_or_default(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            homedeck_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            homedeck_api::Error::Tls(msg) => CoreError::Config {
                message: format!("TLS error: {msg}"),
            },
            homedeck_api::Error::Backend { status: 404, .. } => CoreError::NotFound {
                entity_type: "resource".into(),
                key: String::new(),
            },
            homedeck_api::Error::Backend { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            homedeck_api::Error::Sealing(msg) => CoreError::Internal(msg),
            homedeck_api::Error::Stream(msg) => CoreError::Api {
                message: format!("event stream: {msg}"),
                status: None,
            },
            homedeck_api::Error::Deserialization { message, body: _ } => {
                CoreError::Decode(message)
            }
        }
    }
}

impl CoreError {
    /// Whether this error means the session is gone and client-side
    /// session state must be torn down.
    pub fn is_session_loss(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }
}

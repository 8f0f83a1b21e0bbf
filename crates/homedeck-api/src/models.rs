// ── Wire models ──
//
// Entity payloads exchanged with the backend. These are the exact JSON
// shapes the REST endpoints and the event stream carry; homedeck-core
// re-exports them as its domain model (the store holds them directly).
//
// `version` is bumped by the backend on every accepted write.
// `is_preliminary` marks a client-created placeholder that has not been
// confirmed by the backend yet; the backend never sets it, so it
// defaults to `false` on anything read off the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Servers ─────────────────────────────────────────────────────────

/// A name/value parameter as used by features and actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub value: String,
}

impl Param {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A credential attached to a feature. `value` is ciphertext sealed by
/// the backend; it is only present when a server is fetched with
/// `full_data=true` and must be preserved verbatim on writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

/// A feature (plugin instance) attached to a server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    /// Plugin id this feature instantiates.
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default)]
    pub credentials: Vec<Credential>,
}

/// A managed host, keyed by its IP address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub ipaddress: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub is_preliminary: bool,
}

// ── Plugins ─────────────────────────────────────────────────────────

/// An action a plugin can execute against a server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginAction {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Whether the UI must confirm before the action is issued.
    #[serde(default)]
    pub needs_confirmation: bool,
}

/// A plugin known to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plugin {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub actions: Vec<PluginAction>,
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub is_preliminary: bool,
}

// ── Users & session ─────────────────────────────────────────────────

/// A console user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub is_preliminary: bool,
}

/// The authenticated session: bearer token plus the client-side
/// encryption key the backend derives at login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserToken {
    pub user_id: String,
    pub token: String,
    #[serde(default)]
    pub client_key: String,
}

// ── Monitoring ──────────────────────────────────────────────────────

/// Liveness status of a server, keyed by IP address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub ipaddress: String,
    #[serde(default)]
    pub is_running: bool,
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub is_preliminary: bool,
}

/// Result of a condition check run against a server.
///
/// Keyed by the composite `"{ipaddress}_{data_id}"` because one host can
/// carry many checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionCheckResult {
    pub ipaddress: String,
    pub data_id: String,
    #[serde(default)]
    pub passed: bool,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub is_preliminary: bool,
}

impl ConditionCheckResult {
    /// The composite store key for this result.
    pub fn composite_key(&self) -> String {
        composite_check_key(&self.ipaddress, &self.data_id)
    }
}

/// Build the composite key a condition check result is stored under.
pub fn composite_check_key(ipaddress: &str, data_id: &str) -> String {
    format!("{ipaddress}_{data_id}")
}

/// Severity of a backend notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NotificationLevel {
    #[default]
    Info,
    Warning,
    Error,
}

/// A notification pushed by the backend (scan finished, check failed, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub level: NotificationLevel,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

// ── DNS ─────────────────────────────────────────────────────────────

/// A DNS server the backend uses for host-name lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsServer {
    pub ipaddress: String,
}

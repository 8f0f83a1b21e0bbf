// ── Command API ──
//
// All user intents flow through a unified `Command` enum. The console
// routes each variant to the backend and, on success, to the matching
// store mutation. A failed command never partially applies: the store
// is only touched after the backend call succeeded.

use secrecy::SecretString;

use homedeck_api::actions::ActionRequest;

use crate::error::CoreError;
use crate::model::{DnsServer, Feature, Server, User};

/// A command envelope sent through the command channel.
/// Contains the command and a oneshot response channel.
pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub response_tx: tokio::sync::oneshot::Sender<Result<CommandResult, CoreError>>,
}

/// All write and load operations against the backend.
#[derive(Debug, Clone)]
pub enum Command {
    // ── Bulk loads ───────────────────────────────────────────────────
    /// Load servers, plugins, disabled-plugin ids, and users into the
    /// store (runs automatically after login).
    LoadAll,
    LoadServers,
    LoadPlugins,
    LoadUsers,

    // ── Server operations ────────────────────────────────────────────
    SaveServer(Server),
    /// Independent per-item saves; one failure never rolls back the rest.
    SaveServers(Vec<Server>),
    DeleteServer {
        ipaddress: String,
    },
    /// Independent per-item deletes.
    RemoveServers {
        ipaddresses: Vec<String>,
    },
    AddFeature {
        ipaddress: String,
        feature: Feature,
    },

    // ── Actions ──────────────────────────────────────────────────────
    ExecuteAction {
        /// `None` targets the whole fleet.
        ipaddress: Option<String>,
        request: ActionRequest,
        /// When set, the confirmation collaborator must approve before
        /// the backend call is issued.
        needs_confirmation: bool,
    },
    DiscoverServers {
        network: String,
        lookup_names: bool,
    },

    // ── Plugins ──────────────────────────────────────────────────────
    DisablePlugins {
        ids: Vec<String>,
    },

    // ── Users ────────────────────────────────────────────────────────
    SaveUser {
        user: User,
        password: SecretString,
    },
    DeleteUser {
        user_id: String,
    },
    ChangePassword {
        user_id: String,
        old_password: SecretString,
        new_password: SecretString,
    },

    // ── DNS ──────────────────────────────────────────────────────────
    LoadDnsServers,
    SaveDnsServer(DnsServer),
    DeleteDnsServer {
        ipaddress: String,
    },
}

/// Result of a successful command.
#[derive(Debug)]
pub enum CommandResult {
    Ok,
    /// The user declined the confirmation step; nothing was issued.
    Cancelled,
    Server(Server),
    Servers(Vec<Server>),
    DnsServers(Vec<DnsServer>),
    /// Raw action output (scan results, time-series rows, ...).
    Value(serde_json::Value),
    /// Per-item outcome of a bulk operation.
    Bulk(BulkOutcome),
}

/// Outcome of a bulk save/remove: items succeed and fail independently.
#[derive(Debug, Default)]
pub struct BulkOutcome {
    pub succeeded: Vec<String>,
    /// Key plus failure message, one entry per failed item.
    pub failed: Vec<(String, String)>,
}

// ── Confirmation collaborator ───────────────────────────────────────

/// UI hook consulted before actions flagged `needs_confirmation`.
///
/// The pipeline does not issue the backend call until this resolves
/// affirmatively. Presentation of the dialog is the front end's
/// problem; the core only guarantees the gate.
pub trait ActionConfirmer: Send + Sync {
    fn confirm<'a>(&'a self, prompt: &'a str) -> futures_util::future::BoxFuture<'a, bool>;
}

/// Default confirmer for headless use: approves everything.
pub struct AlwaysConfirm;

impl ActionConfirmer for AlwaysConfirm {
    fn confirm<'a>(&'a self, _prompt: &'a str) -> futures_util::future::BoxFuture<'a, bool> {
        Box::pin(std::future::ready(true))
    }
}

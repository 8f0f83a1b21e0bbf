// ── Action endpoints ──
//
// Writes that are not plain CRUD flow through the generic action
// envelope: `{action_type, params, condition_checks}` posted to
// `/backend/servers/actions` (fleet-wide) or
// `/backend/servers/{ip}/actions` (single host). Network discovery uses
// the same envelope on `/backend/networks/actions`.

use serde::{Deserialize, Serialize};

use crate::client::BackendClient;
use crate::error::Error;
use crate::models::{Param, Server};

/// Everything the backend can be asked to do to a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    /// Probe a host for features its plugins recognize.
    FeatureScan,
    /// Run one plugin action against a host.
    ExecuteFeatureAction,
    /// Ask for a fresh liveness status.
    Status,
    /// Fetch monitoring / time-series rows for a data id.
    QueryData,
    /// Evaluate the condition checks gating an action.
    ActionConditionCheck,
    /// Evaluate the condition checks gating a sub-action.
    SubActionConditionCheck,
    /// Scan a network range for hosts (networks endpoint only).
    AutoDiscover,
}

/// A condition check referenced by an action request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionCheck {
    pub data_id: String,
    #[serde(default)]
    pub params: Vec<Param>,
}

/// The generic action envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub action_type: ActionType,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default)]
    pub condition_checks: Vec<ConditionCheck>,
}

impl ActionRequest {
    pub fn new(action_type: ActionType) -> Self {
        Self {
            action_type,
            params: Vec::new(),
            condition_checks: Vec::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push(Param::new(name, value));
        self
    }
}

impl BackendClient {
    /// Execute an action. `ipaddress = None` targets the whole fleet.
    ///
    /// The response shape depends on the action type (scan results,
    /// time-series rows, ...), so it is returned as raw JSON.
    pub async fn execute_action(
        &self,
        ipaddress: Option<&str>,
        request: &ActionRequest,
    ) -> Result<serde_json::Value, Error> {
        let url = match ipaddress {
            Some(ip) => self.backend_url(&format!("servers/{ip}/actions")),
            None => self.backend_url("servers/actions"),
        };
        self.post(url, request).await
    }

    /// Scan a CIDR range for reachable hosts.
    ///
    /// Returns the discovered servers; nothing is persisted backend-side
    /// until the caller saves them.
    pub async fn auto_discover(
        &self,
        network: &str,
        lookup_names: bool,
    ) -> Result<Vec<Server>, Error> {
        let request = ActionRequest::new(ActionType::AutoDiscover)
            .with_param("network", network)
            .with_param("lookup_names", if lookup_names { "true" } else { "false" });
        self.post(self.backend_url("networks/actions"), &request)
            .await
    }
}

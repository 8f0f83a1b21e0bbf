// ── Plugin endpoints ──

use serde::Serialize;

use crate::client::BackendClient;
use crate::error::Error;
use crate::models::{Param, Plugin};

#[derive(Serialize)]
struct PluginActionRequest {
    action_type: &'static str,
    params: Vec<Param>,
}

impl BackendClient {
    /// List every plugin the backend has loaded.
    pub async fn list_plugins(&self) -> Result<Vec<Plugin>, Error> {
        self.get(self.backend_url("plugins")).await
    }

    /// Ids of plugins the user has disabled.
    pub async fn disabled_plugin_ids(&self) -> Result<Vec<String>, Error> {
        let mut url = self.backend_url("plugins/actions");
        url.query_pairs_mut().append_pair("query", "disabled");
        self.get(url).await
    }

    /// Replace the disabled-plugin set. Ids travel comma-joined in a
    /// single param, mirroring the query shape above.
    pub async fn disable_plugins(&self, ids: &[String]) -> Result<(), Error> {
        let request = PluginActionRequest {
            action_type: "Disable",
            params: vec![Param::new("ids", ids.join(","))],
        };
        self.send_no_content(
            self.http().put(self.backend_url("plugins/actions")).json(&request),
            Vec::new(),
        )
        .await
    }
}

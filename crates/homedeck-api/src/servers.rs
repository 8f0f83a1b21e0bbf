// ── Server endpoints ──

use crate::client::BackendClient;
use crate::error::Error;
use crate::models::Server;

impl BackendClient {
    /// List all managed servers. Payloads are partial: encrypted feature
    /// credentials are stripped (see [`get_server`](Self::get_server)).
    pub async fn list_servers(&self) -> Result<Vec<Server>, Error> {
        self.get(self.backend_url("servers")).await
    }

    /// Fetch one server. With `full_data` the record includes encrypted
    /// feature credentials and is the only valid base for a write-back.
    pub async fn get_server(&self, ipaddress: &str, full_data: bool) -> Result<Server, Error> {
        let mut url = self.backend_url(&format!("servers/{ipaddress}"));
        url.query_pairs_mut()
            .append_pair("full_data", if full_data { "true" } else { "false" });
        self.get(url).await
    }

    /// Create a server record.
    pub async fn create_server(&self, server: &Server) -> Result<Server, Error> {
        self.post(self.backend_url("servers"), server).await
    }

    /// Replace a server record. `server` must be a full record (fetched
    /// with `full_data=true`) or the backend drops credential payloads.
    pub async fn update_server(&self, server: &Server) -> Result<Server, Error> {
        self.put(
            self.backend_url(&format!("servers/{}", server.ipaddress)),
            server,
        )
        .await
    }

    /// Delete a server record.
    pub async fn delete_server(&self, ipaddress: &str) -> Result<(), Error> {
        self.delete(self.backend_url(&format!("servers/{ipaddress}")))
            .await
    }
}

// ── DNS configuration endpoints ──

use crate::client::BackendClient;
use crate::error::Error;
use crate::models::DnsServer;

impl BackendClient {
    /// List the DNS servers the backend uses for name lookups.
    pub async fn list_dns_servers(&self) -> Result<Vec<DnsServer>, Error> {
        self.get(self.backend_url("configurations/dnsservers")).await
    }

    /// Register a DNS server.
    pub async fn create_dns_server(&self, dns: &DnsServer) -> Result<DnsServer, Error> {
        self.post(self.backend_url("configurations/dnsservers"), dns)
            .await
    }

    /// Remove a DNS server.
    pub async fn delete_dns_server(&self, ipaddress: &str) -> Result<(), Error> {
        self.delete(self.backend_url(&format!("configurations/dnsservers/{ipaddress}")))
            .await
    }
}

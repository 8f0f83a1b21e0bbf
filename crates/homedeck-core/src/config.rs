// ── Runtime connection configuration ──
//
// Describes *how* to reach a homedeck backend. Carries connection
// tuning but never touches disk -- the config crate (or any front end)
// constructs a `ConsoleConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use homedeck_api::ReconnectConfig;
use homedeck_api::transport::TlsMode;

/// Configuration for one console session against one backend.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Backend root URL (e.g., `https://homedeck.local:8443`).
    pub url: Url,
    /// TLS verification strategy.
    pub tls: TlsMode,
    /// Request timeout for REST calls.
    pub timeout: Duration,
    /// Enable the push event stream.
    pub events_enabled: bool,
    /// Reconnect tuning for the event stream.
    pub reconnect: ReconnectConfig,
    /// Where the persisted store snapshot lives. `None` disables
    /// persistence entirely (hydration reports no snapshot).
    pub snapshot_path: Option<PathBuf>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            url: "https://homedeck.local:8443"
                .parse()
                .expect("default URL is valid"),
            tls: TlsMode::DangerAcceptInvalid,
            timeout: Duration::from_secs(30),
            events_enabled: true,
            reconnect: ReconnectConfig::default(),
            snapshot_path: None,
        }
    }
}

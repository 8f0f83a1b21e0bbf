// Backend HTTP client
//
// Wraps `reqwest::Client` with homedeck-specific URL construction and
// bearer-token handling. All endpoint groups (servers, plugins, users,
// dns, actions, auth) are implemented as inherent methods via separate
// files to keep this module focused on transport mechanics.
//
// Two URL roots exist: `/backend/*` requires `Authorization: Bearer`
// and answers 401 when the token is stale; `/backend_nt/*` is the
// no-token surface (authentication bootstrap and the event stream).

use std::sync::RwLock;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Raw HTTP client for the homedeck backend.
pub struct BackendClient {
    http: reqwest::Client,
    base_url: Url,
    token: RwLock<Option<String>>,
}

impl BackendClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the backend root (e.g. `https://homedeck.local:8443`).
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            token: RwLock::new(None),
        })
    }

    /// The backend base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The underlying HTTP client (shared with the event stream).
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    // ── Session token ────────────────────────────────────────────────

    /// Attach a bearer token to all subsequent `/backend/*` calls.
    pub fn set_token(&self, token: impl Into<String>) {
        *self.token.write().expect("token lock poisoned") = Some(token.into());
    }

    /// Drop the bearer token (logout / session loss).
    pub fn clear_token(&self) {
        *self.token.write().expect("token lock poisoned") = None;
    }

    /// Whether a bearer token is currently attached.
    pub fn has_token(&self) -> bool {
        self.token.read().expect("token lock poisoned").is_some()
    }

    fn bearer(&self) -> Option<String> {
        self.token.read().expect("token lock poisoned").clone()
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build a URL under the authenticated root: `{base}/backend/{path}`.
    pub(crate) fn backend_url(&self, path: &str) -> Url {
        let full = format!(
            "{}backend/{}",
            self.base_url,
            path.trim_start_matches('/')
        );
        Url::parse(&full).expect("invalid backend URL")
    }

    /// Build a URL under the no-token root: `{base}/backend_nt/{path}`.
    pub(crate) fn nt_url(&self, path: &str) -> Url {
        let full = format!(
            "{}backend_nt/{}",
            self.base_url,
            path.trim_start_matches('/')
        );
        Url::parse(&full).expect("invalid backend URL")
    }

    /// The event-stream endpoint.
    pub fn events_url(&self) -> Url {
        self.nt_url("events")
    }

    // ── Request helpers ──────────────────────────────────────────────

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.bearer() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Send a GET request against the authenticated root.
    pub(crate) async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);
        let resp = self
            .apply_auth(self.http.get(url))
            .send()
            .await
            .map_err(Error::Transport)?;
        Self::parse_response(resp).await
    }

    /// Send a POST request with a JSON body against the authenticated root.
    pub(crate) async fn post<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &impl Serialize,
    ) -> Result<T, Error> {
        debug!("POST {}", url);
        let resp = self
            .apply_auth(self.http.post(url))
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;
        Self::parse_response(resp).await
    }

    /// Send a PUT request with a JSON body against the authenticated root.
    pub(crate) async fn put<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &impl Serialize,
    ) -> Result<T, Error> {
        debug!("PUT {}", url);
        let resp = self
            .apply_auth(self.http.put(url))
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;
        Self::parse_response(resp).await
    }

    /// Send a DELETE request against the authenticated root.
    pub(crate) async fn delete(&self, url: Url) -> Result<(), Error> {
        debug!("DELETE {}", url);
        self.send_no_content(self.http.delete(url), Vec::new())
            .await
    }

    /// Send a request with extra headers (OTK flows) and parse the body.
    pub(crate) async fn send_with_headers<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
        headers: Vec<(&'static str, String)>,
    ) -> Result<T, Error> {
        let mut req = self.apply_auth(req);
        for (name, value) in headers {
            req = req.header(name, value);
        }
        let resp = req.send().await.map_err(Error::Transport)?;
        Self::parse_response(resp).await
    }

    /// Send a request where only the status matters (deletes, action
    /// PUTs with empty responses).
    pub(crate) async fn send_no_content(
        &self,
        req: reqwest::RequestBuilder,
        headers: Vec<(&'static str, String)>,
    ) -> Result<(), Error> {
        let mut req = self.apply_auth(req);
        for (name, value) in headers {
            req = req.header(name, value);
        }
        let resp = req.send().await.map_err(Error::Transport)?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::SessionExpired);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Backend {
                status: status.as_u16(),
                message: if body.is_empty() {
                    status.to_string()
                } else {
                    body
                },
            });
        }
        Ok(())
    }

    /// Map the response status, then deserialize the JSON body.
    ///
    /// 401 on any call means the session is gone -- callers surface that
    /// as session loss, never as a generic HTTP failure.
    pub(crate) async fn parse_response<T: DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::SessionExpired);
        }

        let body = resp.text().await.map_err(Error::Transport)?;

        if !status.is_success() {
            return Err(Error::Backend {
                status: status.as_u16(),
                message: if body.is_empty() {
                    status.to_string()
                } else {
                    body
                },
            });
        }

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }
}

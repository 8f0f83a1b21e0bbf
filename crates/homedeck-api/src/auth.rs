// ── Authentication endpoints (`/backend_nt/*`) ──
//
// The bootstrap surface works without a bearer token. Passwords are
// never sent in the clear: each call fetches a one-time key, seals the
// secret, and ships ciphertext + key id in custom headers next to a
// Basic header naming the user (see `otk`).

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::debug;

use crate::client::BackendClient;
use crate::error::Error;
use crate::models::{User, UserToken};
use crate::otk::{self, CIPHERTEXT_HEADER, OTK_ID_HEADER, OneTimeKey};

#[derive(Serialize)]
struct FirstUserRequest<'a> {
    user_id: &'a str,
    full_name: &'a str,
}

impl BackendClient {
    /// Fetch a fresh one-time key for credential sealing.
    pub async fn fetch_otk(&self) -> Result<OneTimeKey, Error> {
        self.get(self.nt_url("users/authenticate/otk")).await
    }

    /// Authenticate and obtain a session token.
    ///
    /// The password is sealed under a one-time key; the Basic header
    /// carries only the user id. On success the returned token is NOT
    /// attached automatically -- the caller owns session state.
    pub async fn authenticate(
        &self,
        user_id: &str,
        password: &SecretString,
    ) -> Result<UserToken, Error> {
        let otk = self.fetch_otk().await?;
        let sealed = otk::seal(&otk, password.expose_secret())?;
        let basic = STANDARD.encode(format!("{user_id}:"));

        debug!(user_id, otk = %otk.id, "authenticating");

        let resp = self
            .http()
            .post(self.nt_url("users/authenticate"))
            .header(reqwest::header::AUTHORIZATION, format!("Basic {basic}"))
            .header(OTK_ID_HEADER, otk.id)
            .header(CIPHERTEXT_HEADER, sealed)
            .send()
            .await
            .map_err(Error::Transport)?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED
            || resp.status() == reqwest::StatusCode::FORBIDDEN
        {
            return Err(Error::Authentication {
                message: "invalid user id or password".into(),
            });
        }

        Self::parse_response(resp).await
    }

    /// Whether any user account exists yet (first-run detection).
    pub async fn users_exist(&self) -> Result<bool, Error> {
        self.get(self.nt_url("users/exist")).await
    }

    /// Create the very first user account (only valid while
    /// [`users_exist`](Self::users_exist) is `false`).
    pub async fn create_initial_user(
        &self,
        user: &User,
        password: &SecretString,
    ) -> Result<(), Error> {
        let otk = self.fetch_otk().await?;
        let sealed = otk::seal(&otk, password.expose_secret())?;

        let resp = self
            .http()
            .post(self.nt_url("users_first"))
            .header(OTK_ID_HEADER, otk.id)
            .header(CIPHERTEXT_HEADER, sealed)
            .json(&FirstUserRequest {
                user_id: &user.user_id,
                full_name: &user.full_name,
            })
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Error::Backend {
                status: status.as_u16(),
                message: resp.text().await.unwrap_or_default(),
            })
        }
    }
}

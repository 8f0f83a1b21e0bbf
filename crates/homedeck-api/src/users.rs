// ── User endpoints ──

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::client::BackendClient;
use crate::error::Error;
use crate::models::User;
use crate::otk::{self, CIPHERTEXT_HEADER, OTK_ID_HEADER};

#[derive(Serialize)]
struct PasswordChange<'a> {
    old: &'a str,
    new: &'a str,
}

impl BackendClient {
    /// List all user accounts.
    pub async fn list_users(&self) -> Result<Vec<User>, Error> {
        self.get(self.backend_url("users")).await
    }

    /// Create a user. The initial password is sealed under a one-time
    /// key and travels in headers, never the body.
    pub async fn create_user(&self, user: &User, password: &SecretString) -> Result<User, Error> {
        let otk = self.fetch_otk().await?;
        let sealed = otk::seal(&otk, password.expose_secret())?;

        self.send_with_headers(
            self.http().post(self.backend_url("users")).json(user),
            vec![(OTK_ID_HEADER, otk.id), (CIPHERTEXT_HEADER, sealed)],
        )
        .await
    }

    /// Delete a user account.
    pub async fn delete_user(&self, user_id: &str) -> Result<(), Error> {
        self.delete(self.backend_url(&format!("users/{user_id}")))
            .await
    }

    /// Change a user's password. Old and new password are sealed
    /// together as one JSON document under a single one-time key.
    pub async fn change_password(
        &self,
        user_id: &str,
        old_password: &SecretString,
        new_password: &SecretString,
    ) -> Result<(), Error> {
        let otk = self.fetch_otk().await?;
        let payload = serde_json::to_string(&PasswordChange {
            old: old_password.expose_secret(),
            new: new_password.expose_secret(),
        })
        .map_err(|e| Error::Sealing(e.to_string()))?;
        let sealed = otk::seal(&otk, &payload)?;

        self.send_no_content(
            self.http()
                .put(self.backend_url(&format!("user/{user_id}/changepassword")))
                .json(&serde_json::json!({})),
            vec![(OTK_ID_HEADER, otk.id), (CIPHERTEXT_HEADER, sealed)],
        )
        .await
    }
}

// ── One-time-key credential sealing ──
//
// Passwords never travel in a request body: the backend hands out a
// single-use symmetric key (`GET /backend_nt/users/authenticate/otk`),
// the client seals the secret with it, and the ciphertext plus the key
// id ride in custom headers. Bodies may be cached or logged by proxies;
// headers carrying single-use ciphertext are not replayable.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};
use rand::RngCore;
use serde::Deserialize;

use crate::error::Error;

/// Header carrying the one-time-key id.
pub const OTK_ID_HEADER: &str = "x-homedeck-otk";

/// Header carrying the sealed secret (base64 of nonce || ciphertext).
pub const CIPHERTEXT_HEADER: &str = "x-homedeck-cipher";

const KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 24;

/// A single-use sealing key issued by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct OneTimeKey {
    pub id: String,
    /// base64-encoded 32-byte XChaCha20-Poly1305 key.
    pub key: String,
}

impl OneTimeKey {
    fn key_bytes(&self) -> Result<[u8; KEY_SIZE], Error> {
        let raw = STANDARD
            .decode(&self.key)
            .map_err(|e| Error::Sealing(format!("one-time key is not valid base64: {e}")))?;
        raw.try_into()
            .map_err(|_| Error::Sealing("one-time key must be 32 bytes".into()))
    }
}

/// Seal `plaintext` under the one-time key.
///
/// Returns base64 of nonce || ciphertext, suitable for
/// [`CIPHERTEXT_HEADER`].
pub fn seal(otk: &OneTimeKey, plaintext: &str) -> Result<String, Error> {
    let key = otk.key_bytes()?;
    let cipher = XChaCha20Poly1305::new((&key).into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|_| Error::Sealing("encryption failed".into()))?;

    let mut output = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    output.extend_from_slice(&nonce_bytes);
    output.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(output))
}

/// Open a sealed value. The backend side of [`seal`]; exposed so tests
/// can verify the framing without a live backend.
pub fn open(otk: &OneTimeKey, sealed: &str) -> Result<String, Error> {
    let key = otk.key_bytes()?;
    let data = STANDARD
        .decode(sealed)
        .map_err(|e| Error::Sealing(format!("sealed value is not valid base64: {e}")))?;

    if data.len() < NONCE_SIZE {
        return Err(Error::Sealing("sealed value too short".into()));
    }
    let (nonce_bytes, ciphertext) = data.split_at(NONCE_SIZE);

    let cipher = XChaCha20Poly1305::new((&key).into());
    let plaintext = cipher
        .decrypt(XNonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| Error::Sealing("decryption failed".into()))?;

    String::from_utf8(plaintext).map_err(|_| Error::Sealing("plaintext is not UTF-8".into()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_key() -> OneTimeKey {
        let mut raw = [0u8; KEY_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut raw);
        OneTimeKey {
            id: "otk-1".into(),
            key: STANDARD.encode(raw),
        }
    }

    #[test]
    fn seal_open_round_trip() {
        let otk = test_key();
        let sealed = seal(&otk, "hunter2").unwrap();
        assert_eq!(open(&otk, &sealed).unwrap(), "hunter2");
    }

    #[test]
    fn seal_is_randomized() {
        let otk = test_key();
        let a = seal(&otk, "hunter2").unwrap();
        let b = seal(&otk, "hunter2").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_fails_to_open() {
        let otk = test_key();
        let other = test_key();
        let sealed = seal(&otk, "hunter2").unwrap();
        assert!(open(&other, &sealed).is_err());
    }

    #[test]
    fn short_key_is_rejected() {
        let otk = OneTimeKey {
            id: "otk-1".into(),
            key: STANDARD.encode([0u8; 16]),
        };
        assert!(seal(&otk, "x").is_err());
    }

    #[test]
    fn truncated_sealed_value_is_rejected() {
        let otk = test_key();
        assert!(open(&otk, &STANDARD.encode([0u8; 8])).is_err());
    }
}

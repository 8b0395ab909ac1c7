//! Reversible credential storage.
//!
//! Passwords are AES-128-CFB encrypted under a server key with a random IV
//! prefixed to the ciphertext, then URL-safe base64 encoded with padding.
//! Anyone holding the key can recover every stored password; this is kept for
//! compatibility with existing panel databases.

use aes::cipher::{AsyncStreamCipher, KeyIvInit};
use anyhow::{anyhow, Context, Result};
use base64ct::{Base64Url, Encoding};
use rand::{rngs::OsRng, RngCore};
use std::fmt;

type Aes128CfbEnc = cfb_mode::Encryptor<aes::Aes128>;
type Aes128CfbDec = cfb_mode::Decryptor<aes::Aes128>;

pub const KEY_LEN: usize = 16;
const IV_LEN: usize = 16;

#[derive(Clone)]
pub struct CredentialCipher {
    key: [u8; KEY_LEN],
}

impl fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialCipher")
            .field("key", &"***")
            .finish()
    }
}

impl CredentialCipher {
    /// # Errors
    /// Returns an error unless `key` is exactly 16 bytes.
    pub fn new(key: &[u8]) -> Result<Self> {
        let key: [u8; KEY_LEN] = key
            .try_into()
            .map_err(|_| {
                anyhow!(
                    "credential key must be exactly {KEY_LEN} bytes, got {}",
                    key.len()
                )
            })?;
        Ok(Self { key })
    }

    /// # Errors
    /// Returns an error if the cipher cannot be initialized.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);

        let mut buf = plaintext.as_bytes().to_vec();
        Aes128CfbEnc::new_from_slices(&self.key, &iv)
            .map_err(|err| anyhow!("failed to init cipher: {err}"))?
            .encrypt(&mut buf);

        let mut sealed = Vec::with_capacity(IV_LEN + buf.len());
        sealed.extend_from_slice(&iv);
        sealed.extend_from_slice(&buf);
        Ok(Base64Url::encode_string(&sealed))
    }

    /// # Errors
    /// Returns an error if `sealed` is not valid base64, is shorter than the IV,
    /// or does not decrypt to UTF-8.
    pub fn decrypt(&self, sealed: &str) -> Result<String> {
        let raw = Base64Url::decode_vec(sealed)
            .map_err(|err| anyhow!("invalid credential encoding: {err}"))?;
        if raw.len() < IV_LEN {
            return Err(anyhow!("credential ciphertext too short"));
        }
        let (iv, body) = raw.split_at(IV_LEN);

        let mut buf = body.to_vec();
        Aes128CfbDec::new_from_slices(&self.key, iv)
            .map_err(|err| anyhow!("failed to init cipher: {err}"))?
            .decrypt(&mut buf);

        String::from_utf8(buf).context("credential is not valid UTF-8")
    }

    /// `true` when `sealed` decrypts to `candidate`. Undecryptable input never
    /// matches.
    #[must_use]
    pub fn verify(&self, sealed: &str, candidate: &str) -> bool {
        self.decrypt(sealed)
            .is_ok_and(|plaintext| plaintext.as_bytes() == candidate.as_bytes())
    }
}

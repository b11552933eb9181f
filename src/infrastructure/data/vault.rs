// SPDX-License-Identifier: MIT

use crate::domain::error::AppError;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use alloy::signers::local::PrivateKeySigner;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::str::FromStr;

const NONCE_LEN: usize = 12;

/// Process-wide symmetric vault for wallet secrets. The AES-256-GCM key
/// is derived once from the configured passphrase; plaintext leaves this
/// module only as the direct return of `decrypt`/`decrypt_signer` and
/// must not be retained beyond the immediate signing operation.
#[derive(Clone)]
pub struct SecretVault {
    cipher: Aes256Gcm,
}

impl SecretVault {
    pub fn new(passphrase: &str) -> Self {
        let digest = Sha256::digest(passphrase.as_bytes());
        let key = Key::<Aes256Gcm>::from_slice(&digest);
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    /// Encrypt to hex-encoded `nonce || ciphertext`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, AppError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| AppError::Vault(format!("Encryption failed: {e}")))?;

        let mut out = nonce_bytes.to_vec();
        out.extend_from_slice(&ciphertext);
        Ok(hex::encode(out))
    }

    pub fn decrypt(&self, ciphertext: &str) -> Result<Vec<u8>, AppError> {
        let raw = hex::decode(ciphertext)
            .map_err(|e| AppError::Vault(format!("Ciphertext is not valid hex: {e}")))?;
        if raw.len() <= NONCE_LEN {
            return Err(AppError::Vault("Ciphertext too short".into()));
        }
        let (nonce_bytes, body) = raw.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        self.cipher
            .decrypt(nonce, body)
            .map_err(|e| AppError::Vault(format!("Decryption failed: {e}")))
    }

    /// Decrypt a stored wallet secret into a signer for one signing
    /// operation. Callers must drop the signer as soon as the operation
    /// completes.
    pub fn decrypt_signer(&self, ciphertext: &str) -> Result<PrivateKeySigner, AppError> {
        let plaintext = self.decrypt(ciphertext)?;
        let key_str = String::from_utf8(plaintext)
            .map_err(|_| AppError::Vault("Secret is not valid UTF-8".into()))?;
        PrivateKeySigner::from_str(key_str.trim())
            .map_err(|e| AppError::Vault(format!("Secret is not a valid signing key: {e}")))
    }
}

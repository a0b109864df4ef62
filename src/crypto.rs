//! Passphrase sealing for the on-disk vault.
//!
//! Sealed layout: header || salt (32) || nonce (12) || ciphertext, where the
//! header is magic (4) || version (1) || m_cost || t_cost || p_cost (u32 LE
//! each). The header is bound as associated data, so tampering with the KDF
//! parameters fails authentication like a wrong passphrase does.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

const MAGIC: &[u8; 4] = b"LNRA";
const FORMAT_VERSION: u8 = 1;
const HEADER_LEN: usize = MAGIC.len() + 1 + 3 * 4;
const SALT_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

// Upper bounds for parameters read back from a vault header, checked before
// any key derivation runs.
const MAX_MEMORY_KIB: u32 = 1024 * 1024;
const MAX_ITERATIONS: u32 = 64;
const MAX_PARALLELISM: u32 = 16;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("key derivation failed")]
    KeyDerivation,
    #[error("encryption failed")]
    Encryption,
    #[error("decryption failed: wrong passphrase or corrupted data")]
    Decryption,
    #[error("invalid data format")]
    InvalidFormat,
    #[error("unsupported vault version {0}")]
    UnsupportedVersion(u8),
    #[error("key derivation parameters out of range")]
    KdfOutOfRange,
}

/// Argon2id cost parameters, stored in every sealed blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 65536,
            iterations: 3,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    fn encode(&self) -> [u8; HEADER_LEN] {
        let mut header = [0u8; HEADER_LEN];
        header[..4].copy_from_slice(MAGIC);
        header[4] = FORMAT_VERSION;
        header[5..9].copy_from_slice(&self.memory_kib.to_le_bytes());
        header[9..13].copy_from_slice(&self.iterations.to_le_bytes());
        header[13..17].copy_from_slice(&self.parallelism.to_le_bytes());
        header
    }

    fn decode(header: &[u8]) -> Result<Self, CryptoError> {
        if header.len() != HEADER_LEN || &header[..4] != MAGIC {
            return Err(CryptoError::InvalidFormat);
        }
        if header[4] != FORMAT_VERSION {
            return Err(CryptoError::UnsupportedVersion(header[4]));
        }
        let word = |at: usize| -> Result<u32, CryptoError> {
            header[at..at + 4]
                .try_into()
                .map(u32::from_le_bytes)
                .map_err(|_| CryptoError::InvalidFormat)
        };
        let params = Self {
            memory_kib: word(5)?,
            iterations: word(9)?,
            parallelism: word(13)?,
        };
        params.check_bounds()?;
        Ok(params)
    }

    fn check_bounds(&self) -> Result<(), CryptoError> {
        if self.memory_kib > MAX_MEMORY_KIB
            || self.iterations > MAX_ITERATIONS
            || self.parallelism > MAX_PARALLELISM
        {
            return Err(CryptoError::KdfOutOfRange);
        }
        Ok(())
    }
}

#[derive(Zeroize, ZeroizeOnDrop)]
struct VaultKey([u8; KEY_LEN]);

impl VaultKey {
    fn derive(passphrase: &str, salt: &[u8], kdf: &KdfParams) -> Result<Self, CryptoError> {
        let params = Params::new(
            kdf.memory_kib,
            kdf.iterations,
            kdf.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|_| CryptoError::KeyDerivation)?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut key = VaultKey([0u8; KEY_LEN]);
        argon2
            .hash_password_into(passphrase.as_bytes(), salt, &mut key.0)
            .map_err(|_| CryptoError::KeyDerivation)?;
        Ok(key)
    }

    fn cipher(&self) -> Result<Aes256Gcm, CryptoError> {
        Aes256Gcm::new_from_slice(&self.0).map_err(|_| CryptoError::KeyDerivation)
    }
}

/// Encrypt `plaintext` under a key derived from `passphrase`.
pub fn seal(passphrase: &str, plaintext: &[u8], kdf: &KdfParams) -> Result<Vec<u8>, CryptoError> {
    let mut salt = [0u8; SALT_LEN];
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    rand::thread_rng().fill_bytes(&mut nonce_bytes);

    kdf.check_bounds()?;
    let header = kdf.encode();
    let key = VaultKey::derive(passphrase, &salt, kdf)?;
    let ciphertext = key
        .cipher()?
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: plaintext,
                aad: &header,
            },
        )
        .map_err(|_| CryptoError::Encryption)?;

    let mut output = Vec::with_capacity(HEADER_LEN + SALT_LEN + NONCE_LEN + ciphertext.len());
    output.extend_from_slice(&header);
    output.extend_from_slice(&salt);
    output.extend_from_slice(&nonce_bytes);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

/// Decrypt a blob produced by [`seal`].
pub fn open(passphrase: &str, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if sealed.len() < HEADER_LEN + SALT_LEN + NONCE_LEN {
        return Err(CryptoError::InvalidFormat);
    }
    let (header, rest) = sealed.split_at(HEADER_LEN);
    let (salt, rest) = rest.split_at(SALT_LEN);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);

    let kdf = KdfParams::decode(header)?;
    let key = VaultKey::derive(passphrase, salt, &kdf)?;
    key.cipher()?
        .decrypt(
            Nonce::from_slice(nonce_bytes),
            Payload {
                msg: ciphertext,
                aad: header,
            },
        )
        .map_err(|_| CryptoError::Decryption)
}

#[cfg(test)]
pub(crate) fn test_kdf() -> KdfParams {
    KdfParams {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    }
}

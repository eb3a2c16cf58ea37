//! AEAD: AES-256-GCM
//!
//! Sealed layout: `nonce[12] || ciphertext || tag[16]`.
//!
//! Every seal draws a fresh nonce from the OS CSPRNG. Reuse of a
//! `(key, nonce)` pair with GCM forfeits authenticity and confidentiality,
//! so nonces are never caller-supplied.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use getrandom::getrandom;
use zeroize::Zeroizing;

use crate::error::{AeadError, SealError};

/// Key size in bytes (AES-256).
pub const KEY_BYTES: usize = 32;

/// Nonce size in bytes (96-bit GCM nonce).
pub const NONCE_BYTES: usize = 12;

/// Tag size in bytes (128-bit GCM tag).
pub const TAG_BYTES: usize = 16;

/// Smallest possible sealed buffer: nonce + tag around an empty plaintext.
pub const MIN_SEALED_BYTES: usize = NONCE_BYTES + TAG_BYTES;

/// A 256-bit AEAD key, zeroed on drop.
pub type Key = Zeroizing<[u8; KEY_BYTES]>;

/// Generate a random 256-bit key from the OS CSPRNG.
pub fn generate_key() -> Result<Key, SealError> {
    let mut k = [0u8; KEY_BYTES];
    getrandom(&mut k).map_err(|_| SealError)?;
    Ok(Zeroizing::new(k))
}

fn nonce() -> Result<[u8; NONCE_BYTES], SealError> {
    let mut n = [0u8; NONCE_BYTES];
    getrandom(&mut n).map_err(|_| SealError)?;
    Ok(n)
}

/// Seal `plaintext` under `key`, authenticating (but not encrypting) `aad`.
pub fn encrypt(key: &[u8; KEY_BYTES], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, SealError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| SealError)?;
    let n = nonce()?;
    let payload = Payload { msg: plaintext, aad };
    let ct = cipher
        .encrypt(Nonce::from_slice(&n), payload)
        .map_err(|_| SealError)?;

    let mut out = Vec::with_capacity(NONCE_BYTES + ct.len());
    out.extend_from_slice(&n);
    out.extend_from_slice(&ct);
    Ok(out)
}

/// Open `sealed` under `key`. The same `aad` must be presented.
pub fn decrypt(
    key: &[u8; KEY_BYTES],
    sealed: &[u8],
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>, AeadError> {
    if sealed.len() < MIN_SEALED_BYTES {
        return Err(AeadError::MalformedCiphertext);
    }
    let (n, ct) = sealed.split_at(NONCE_BYTES);
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| AeadError::AuthenticationFailure)?;
    let payload = Payload { msg: ct, aad };
    cipher
        .decrypt(Nonce::from_slice(n), payload)
        .map(Zeroizing::new)
        .map_err(|_| AeadError::AuthenticationFailure)
}

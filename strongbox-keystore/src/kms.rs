//! KMS adapter: wraps and unwraps DEKs under a named KEK.
//!
//! Two implementations, selected at construction time:
//! - [`DevKms`] holds a local 32-byte master KEK and wraps with the AEAD
//!   primitive directly. Per-`kek_id` wrapping keys are derived with
//!   HKDF-SHA256 so KEK rotation is exercisable without a real KMS.
//! - [`RemoteKms`] talks to an external KMS exposing encrypt/decrypt on a
//!   key path `projectId/location/keyring/keyId`, with end-to-end CRC32C
//!   checks on every payload crossing the wire.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as B64, Engine};
use hkdf::Hkdf;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use zeroize::Zeroizing;

use strongbox_envelope::aead::{self, KEY_BYTES};

use crate::error::{ErrorKind, Result};

/// HKDF `info` prefix for dev-mode per-KEK derivation.
const DEV_KEK_INFO: &[u8] = b"strongbox/kms/dev/kek/";

// ---------------------------------------------------------------------------
// Adapter trait
// ---------------------------------------------------------------------------

/// Wrap/unwrap primitives over the KEK held by the KMS.
#[async_trait]
pub trait KmsAdapter: Send + Sync {
    /// The KEK id named by configuration. New deployments wrap under this
    /// until a KEK rotation updates the engine's process-resident pointer.
    fn default_kek_id(&self) -> String;

    async fn wrap_dek(&self, plaintext_key: &[u8; KEY_BYTES], kek_id: &str) -> Result<Vec<u8>>;

    async fn unwrap_dek(&self, wrapped: &[u8], kek_id: &str) -> Result<aead::Key>;

    /// Move a wrapped DEK from one KEK to another. Unwrap-then-wrap.
    async fn reencrypt_dek(
        &self,
        wrapped: &[u8],
        old_kek_id: &str,
        new_kek_id: &str,
    ) -> Result<Vec<u8>> {
        let plaintext = self.unwrap_dek(wrapped, old_kek_id).await?;
        self.wrap_dek(&plaintext, new_kek_id).await
    }
}

// ---------------------------------------------------------------------------
// Development KMS
// ---------------------------------------------------------------------------

/// Local stand-in for the external KMS. The wrapped form is header-less
/// (`nonce || ct || tag`); the KEK identity is bound as associated data.
pub struct DevKms {
    master: Zeroizing<[u8; KEY_BYTES]>,
    default_kek: String,
}

impl DevKms {
    pub fn new(master: [u8; KEY_BYTES], default_kek: impl Into<String>) -> Self {
        Self {
            master: Zeroizing::new(master),
            default_kek: default_kek.into(),
        }
    }

    fn derive_kek(&self, kek_id: &str) -> Result<Zeroizing<[u8; KEY_BYTES]>> {
        let hk = Hkdf::<Sha256>::new(None, &*self.master);
        let mut info = Vec::with_capacity(DEV_KEK_INFO.len() + kek_id.len());
        info.extend_from_slice(DEV_KEK_INFO);
        info.extend_from_slice(kek_id.as_bytes());

        let mut kek = Zeroizing::new([0u8; KEY_BYTES]);
        hk.expand(&info, &mut *kek)
            .map_err(|_| ErrorKind::Kms("kek derivation failed".into()))?;
        Ok(kek)
    }
}

#[async_trait]
impl KmsAdapter for DevKms {
    fn default_kek_id(&self) -> String {
        self.default_kek.clone()
    }

    async fn wrap_dek(&self, plaintext_key: &[u8; KEY_BYTES], kek_id: &str) -> Result<Vec<u8>> {
        let kek = self.derive_kek(kek_id)?;
        aead::encrypt(&kek, plaintext_key, kek_id.as_bytes())
            .map_err(|e| ErrorKind::Kms(format!("wrap under kek '{}': {}", kek_id, e)))
    }

    async fn unwrap_dek(&self, wrapped: &[u8], kek_id: &str) -> Result<aead::Key> {
        let kek = self.derive_kek(kek_id)?;
        let plaintext = aead::decrypt(&kek, wrapped, kek_id.as_bytes())
            .map_err(|e| ErrorKind::Kms(format!("unwrap under kek '{}': {}", kek_id, e)))?;
        key_from_slice(&plaintext)
    }
}

// ---------------------------------------------------------------------------
// KMS transport
// ---------------------------------------------------------------------------

/// What the peer returned for an encrypt call.
#[derive(Clone, Debug)]
pub struct KmsEncryptResponse {
    /// Full key path the peer reports having used.
    pub name: String,
    pub ciphertext: Vec<u8>,
    pub ciphertext_crc32c: Option<u32>,
    /// Whether the peer confirmed our plaintext CRC matched.
    pub verified_plaintext_crc32c: bool,
}

/// What the peer returned for a decrypt call.
#[derive(Clone, Debug)]
pub struct KmsDecryptResponse {
    pub plaintext: Vec<u8>,
    pub plaintext_crc32c: Option<u32>,
}

/// Transport to the external KMS. Calls carry the configured timeout and
/// fail with `TransportTimeout`; they are never retried at this layer.
#[async_trait]
pub trait KmsClient: Send + Sync {
    async fn encrypt(
        &self,
        key_path: &str,
        plaintext: &[u8],
        plaintext_crc32c: u32,
    ) -> Result<KmsEncryptResponse>;

    async fn decrypt(
        &self,
        key_path: &str,
        ciphertext: &[u8],
        ciphertext_crc32c: u32,
    ) -> Result<KmsDecryptResponse>;
}

// ---------------------------------------------------------------------------
// Production KMS adapter
// ---------------------------------------------------------------------------

/// Adapter over a remote KMS. CRC32C disagreement at any point is
/// `TransportCorruption`: fatal to the operation, never silently retried.
pub struct RemoteKms {
    client: Arc<dyn KmsClient>,
    /// `projectId/location/keyring`; kek ids name keys inside this ring.
    key_ring_path: String,
    default_kek: String,
}

impl RemoteKms {
    /// `key_path` is the configured `projectId/location/keyring/keyId`;
    /// its last segment becomes the default KEK id.
    pub fn new(client: Arc<dyn KmsClient>, key_path: &str) -> Result<Self> {
        let parts: Vec<&str> = key_path.split('/').collect();
        if parts.len() != 4 || parts.iter().any(|p| p.is_empty()) {
            return Err(ErrorKind::validation(format!(
                "kms key path must be projectId/location/keyring/keyId, got '{}'",
                key_path
            )));
        }
        Ok(Self {
            client,
            key_ring_path: parts[..3].join("/"),
            default_kek: parts[3].to_string(),
        })
    }

    fn key_path(&self, kek_id: &str) -> String {
        format!("{}/{}", self.key_ring_path, kek_id)
    }
}

#[async_trait]
impl KmsAdapter for RemoteKms {
    fn default_kek_id(&self) -> String {
        self.default_kek.clone()
    }

    async fn wrap_dek(&self, plaintext_key: &[u8; KEY_BYTES], kek_id: &str) -> Result<Vec<u8>> {
        let path = self.key_path(kek_id);
        let plaintext_crc = crc32c::crc32c(plaintext_key);
        let resp = self.client.encrypt(&path, plaintext_key, plaintext_crc).await?;

        if !resp.verified_plaintext_crc32c {
            return Err(ErrorKind::TransportCorruption(
                "peer did not verify plaintext crc32c".into(),
            ));
        }
        match resp.ciphertext_crc32c {
            Some(crc) if crc == crc32c::crc32c(&resp.ciphertext) => {}
            Some(_) => {
                return Err(ErrorKind::TransportCorruption(
                    "ciphertext crc32c mismatch".into(),
                ))
            }
            None => {
                return Err(ErrorKind::TransportCorruption(
                    "peer omitted ciphertext crc32c".into(),
                ))
            }
        }
        if !resp.name.starts_with(&path) {
            return Err(ErrorKind::TransportCorruption(format!(
                "peer answered for key '{}', expected '{}'",
                resp.name, path
            )));
        }

        Ok(resp.ciphertext)
    }

    async fn unwrap_dek(&self, wrapped: &[u8], kek_id: &str) -> Result<aead::Key> {
        let path = self.key_path(kek_id);
        let ciphertext_crc = crc32c::crc32c(wrapped);
        let resp = self.client.decrypt(&path, wrapped, ciphertext_crc).await?;

        match resp.plaintext_crc32c {
            Some(crc) if crc == crc32c::crc32c(&resp.plaintext) => {}
            Some(_) => {
                return Err(ErrorKind::TransportCorruption(
                    "plaintext crc32c mismatch".into(),
                ))
            }
            None => {
                return Err(ErrorKind::TransportCorruption(
                    "peer omitted plaintext crc32c".into(),
                ))
            }
        }

        key_from_slice(&Zeroizing::new(resp.plaintext))
    }
}

// ---------------------------------------------------------------------------
// HTTP transport
// ---------------------------------------------------------------------------

/// JSON-over-HTTP `KmsClient`, following the common cloud-KMS REST shape:
/// `POST {base}/v1/{key_path}:encrypt` with base64 payloads and stringified
/// CRC32C fields.
pub struct HttpKmsClient {
    http: reqwest::Client,
    base: String,
}

impl HttpKmsClient {
    pub fn new(base: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ErrorKind::internal(format!("kms http client: {}", e)))?;
        Ok(Self {
            http,
            base: base.into().trim_end_matches('/').to_string(),
        })
    }

    fn map_send_err(e: reqwest::Error) -> ErrorKind {
        if e.is_timeout() {
            ErrorKind::TransportTimeout
        } else {
            ErrorKind::Kms(format!("kms request failed: {}", e))
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EncryptRequestBody {
    plaintext: String,
    plaintext_crc32c: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EncryptResponseBody {
    name: String,
    ciphertext: String,
    ciphertext_crc32c: Option<String>,
    #[serde(default)]
    verified_plaintext_crc32c: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DecryptRequestBody {
    ciphertext: String,
    ciphertext_crc32c: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DecryptResponseBody {
    plaintext: String,
    plaintext_crc32c: Option<String>,
}

fn parse_crc(field: Option<String>) -> Result<Option<u32>> {
    match field {
        None => Ok(None),
        Some(s) => s
            .parse::<u32>()
            .map(Some)
            .map_err(|_| ErrorKind::TransportCorruption(format!("unparseable crc32c '{}'", s))),
    }
}

fn decode_b64(field: &str, what: &str) -> Result<Vec<u8>> {
    B64.decode(field)
        .map_err(|_| ErrorKind::Kms(format!("kms returned invalid base64 {}", what)))
}

#[async_trait]
impl KmsClient for HttpKmsClient {
    async fn encrypt(
        &self,
        key_path: &str,
        plaintext: &[u8],
        plaintext_crc32c: u32,
    ) -> Result<KmsEncryptResponse> {
        let url = format!("{}/v1/{}:encrypt", self.base, key_path);
        let body = EncryptRequestBody {
            plaintext: B64.encode(plaintext),
            plaintext_crc32c: plaintext_crc32c.to_string(),
        };
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(Self::map_send_err)?
            .error_for_status()
            .map_err(|e| ErrorKind::Kms(format!("kms encrypt: {}", e)))?
            .json::<EncryptResponseBody>()
            .await
            .map_err(Self::map_send_err)?;

        Ok(KmsEncryptResponse {
            name: resp.name,
            ciphertext: decode_b64(&resp.ciphertext, "ciphertext")?,
            ciphertext_crc32c: parse_crc(resp.ciphertext_crc32c)?,
            verified_plaintext_crc32c: resp.verified_plaintext_crc32c,
        })
    }

    async fn decrypt(
        &self,
        key_path: &str,
        ciphertext: &[u8],
        ciphertext_crc32c: u32,
    ) -> Result<KmsDecryptResponse> {
        let url = format!("{}/v1/{}:decrypt", self.base, key_path);
        let body = DecryptRequestBody {
            ciphertext: B64.encode(ciphertext),
            ciphertext_crc32c: ciphertext_crc32c.to_string(),
        };
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(Self::map_send_err)?
            .error_for_status()
            .map_err(|e| ErrorKind::Kms(format!("kms decrypt: {}", e)))?
            .json::<DecryptResponseBody>()
            .await
            .map_err(Self::map_send_err)?;

        Ok(KmsDecryptResponse {
            plaintext: decode_b64(&resp.plaintext, "plaintext")?,
            plaintext_crc32c: parse_crc(resp.plaintext_crc32c)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn key_from_slice(bytes: &[u8]) -> Result<aead::Key> {
    if bytes.len() != KEY_BYTES {
        return Err(ErrorKind::Kms(format!(
            "unwrapped key has {} bytes, expected {}",
            bytes.len(),
            KEY_BYTES
        )));
    }
    let mut key = Zeroizing::new([0u8; KEY_BYTES]);
    key.copy_from_slice(bytes);
    Ok(key)
}

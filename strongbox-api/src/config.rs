//! Environment-driven configuration.
//!
//! All required variables are resolved up front so startup fails
//! atomically with a non-zero exit instead of half-initializing.

use std::fmt;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DATA_DIR: &str = "./strongbox-data";
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;
pub const DEFAULT_KMS_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_ADMIN_SECRET: &str = "0000";
pub const DEFAULT_ROTATION_WORKERS: usize = 2;
pub const DEFAULT_ROTATION_QUEUE: usize = 256;
/// KEK id used by the dev KMS.
pub const DEV_KEK_ID: &str = "local";

#[derive(Debug)]
pub struct ConfigError(pub String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "configuration error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: String,
    /// HMAC-SHA-256 token signing key.
    pub token_key: Vec<u8>,
    pub token_ttl: Duration,
    pub dev_kms: bool,
    /// Master KEK for the dev KMS. Required iff `dev_kms`.
    pub dev_kek: Option<[u8; 32]>,
    /// Remote KMS base URL. Required unless `dev_kms`.
    pub kms_endpoint: Option<String>,
    /// `projectId/location/keyring/keyId`. Required unless `dev_kms`.
    pub kms_key_path: Option<String>,
    pub kms_timeout: Duration,
    pub admin_secret: String,
    pub admin_secret_is_default: bool,
    pub rotation_workers: usize,
    pub rotation_queue: usize,
    pub log_format: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = parse_var("STRONGBOX_PORT", DEFAULT_PORT)?;
        let data_dir = var("STRONGBOX_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.into());

        let Some(token_key) = hex_key("STRONGBOX_TOKEN_KEY", true)? else {
            return Err(ConfigError("STRONGBOX_TOKEN_KEY is required".into()));
        };
        let token_ttl = Duration::from_secs(parse_var(
            "STRONGBOX_TOKEN_TTL_SECS",
            DEFAULT_TOKEN_TTL_SECS,
        )?);

        let dev_kms = var("STRONGBOX_DEV_KMS").map(|v| v == "true").unwrap_or(false);
        let dev_kek = hex_key_fixed32("STRONGBOX_DEV_KEK", dev_kms)?;
        let kms_endpoint = var("STRONGBOX_KMS_ENDPOINT");
        let kms_key_path = var("STRONGBOX_KMS_KEY_PATH");
        if !dev_kms {
            if kms_endpoint.is_none() {
                return Err(ConfigError("STRONGBOX_KMS_ENDPOINT is required (or set STRONGBOX_DEV_KMS=true)".into()));
            }
            if kms_key_path.is_none() {
                return Err(ConfigError("STRONGBOX_KMS_KEY_PATH is required (or set STRONGBOX_DEV_KMS=true)".into()));
            }
        }
        let kms_timeout = Duration::from_secs(parse_var(
            "STRONGBOX_KMS_TIMEOUT_SECS",
            DEFAULT_KMS_TIMEOUT_SECS,
        )?);

        let (admin_secret, admin_secret_is_default) = match var("STRONGBOX_ADMIN_SECRET") {
            Some(s) => (s, false),
            None => (DEFAULT_ADMIN_SECRET.into(), true),
        };

        Ok(Self {
            port,
            data_dir,
            token_key,
            token_ttl,
            dev_kms,
            dev_kek,
            kms_endpoint,
            kms_key_path,
            kms_timeout,
            admin_secret,
            admin_secret_is_default,
            rotation_workers: parse_var("STRONGBOX_ROTATION_WORKERS", DEFAULT_ROTATION_WORKERS)?,
            rotation_queue: parse_var("STRONGBOX_ROTATION_QUEUE", DEFAULT_ROTATION_QUEUE)?,
            log_format: var("STRONGBOX_LOG_FORMAT").unwrap_or_else(|| "pretty".into()),
        })
    }
}

/// Read a trimmed, non-empty environment variable.
fn var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match var(name) {
        None => Ok(default),
        Some(v) => v
            .parse()
            .map_err(|_| ConfigError(format!("{} has invalid value '{}'", name, v))),
    }
}

fn hex_key(name: &str, required: bool) -> Result<Option<Vec<u8>>, ConfigError> {
    match var(name) {
        None if required => Err(ConfigError(format!("{} is required", name))),
        None => Ok(None),
        Some(v) => {
            let bytes = hex::decode(&v)
                .map_err(|_| ConfigError(format!("{} is not valid hex", name)))?;
            if bytes.len() != 32 {
                return Err(ConfigError(format!(
                    "{} must be 32 hex-encoded bytes, got {}",
                    name,
                    bytes.len()
                )));
            }
            Ok(Some(bytes))
        }
    }
}

fn hex_key_fixed32(name: &str, required: bool) -> Result<Option<[u8; 32]>, ConfigError> {
    Ok(hex_key(name, required)?.map(|v| {
        let mut out = [0u8; 32];
        out.copy_from_slice(&v);
        out
    }))
}

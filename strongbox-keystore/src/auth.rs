//! Auth state machine: registration, credential verification, token
//! issuance, and bearer resolution.
//!
//! Login failures are uniform: unknown name, inactive client, and wrong
//! secret all surface as `InvalidCredentials`, so callers cannot probe
//! which names exist.

use std::collections::BTreeSet;
use std::sync::Arc;

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Utc;
use uuid::Uuid;

use crate::audit::{AuditAction, AuditEvent, AuditSink};
use crate::error::{ErrorKind, Result};
use crate::guard::WILDCARD;
use crate::storage::DurableStore;
use crate::token::{Claims, TokenSigner};
use crate::types::ClientRecord;

/// Result of a successful login.
#[derive(Debug)]
pub struct LoginOutcome {
    pub client: ClientRecord,
    pub token: String,
}

/// A verified caller: the token's claims plus the live client row.
#[derive(Clone, Debug)]
pub struct AuthContext {
    pub claims: Claims,
    pub client: ClientRecord,
}

pub struct AuthService {
    store: Arc<dyn DurableStore>,
    signer: TokenSigner,
    audit: Arc<dyn AuditSink>,
}

impl AuthService {
    pub fn new(store: Arc<dyn DurableStore>, signer: TokenSigner, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, signer, audit }
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Register a new client. The secret is hashed with argon2id and a
    /// per-password random salt; the plaintext is dropped immediately.
    pub fn register(
        &self,
        name: &str,
        secret: &str,
        roles: BTreeSet<String>,
        permissions: BTreeSet<String>,
    ) -> Result<ClientRecord> {
        let hashed = hash_secret(secret)?;
        let client = ClientRecord::new(name, hashed, roles, permissions);
        self.store.insert_client(&client)?;
        self.audit.record(AuditEvent::new(AuditAction::ClientRegistered {
            client_id: client.id,
        }));
        tracing::info!(client_id = %client.id, name = %client.name, "registered client");
        Ok(client)
    }

    /// Seed the `admin` client when the client table is empty.
    pub fn bootstrap_admin(&self, secret: &str) -> Result<Option<ClientRecord>> {
        if self.store.client_count()? > 0 {
            return Ok(None);
        }
        let wildcard: BTreeSet<String> = BTreeSet::from([WILDCARD.to_string()]);
        let admin = self.register("admin", secret, wildcard.clone(), wildcard)?;
        tracing::info!(client_id = %admin.id, "seeded bootstrap admin client");
        Ok(Some(admin))
    }

    // -----------------------------------------------------------------------
    // Login
    // -----------------------------------------------------------------------

    pub fn login(&self, name: &str, secret: &str) -> Result<LoginOutcome> {
        let client = match self.store.find_client_by_name(name)? {
            Some(c) if c.active => c,
            _ => return self.login_failed(name),
        };
        if !verify_secret(&client.hashed_secret, secret)? {
            return self.login_failed(name);
        }

        let mut client = client;
        client.last_used_at = Some(Utc::now());
        client.updated_at = Utc::now();
        self.store.update_client(&client)?;

        let token = self.signer.issue(&client)?;
        self.audit.record(AuditEvent::new(AuditAction::LoginSucceeded {
            client_id: client.id,
        }));
        Ok(LoginOutcome { client, token })
    }

    fn login_failed(&self, name: &str) -> Result<LoginOutcome> {
        self.audit.record(AuditEvent::new(AuditAction::LoginFailed {
            name: name.to_string(),
        }));
        tracing::warn!(name, "login failed");
        Err(ErrorKind::InvalidCredentials)
    }

    // -----------------------------------------------------------------------
    // Bearer resolution
    // -----------------------------------------------------------------------

    /// Resolve an `Authorization` header value into a verified caller.
    pub fn authenticate_bearer(&self, header: Option<&str>) -> Result<AuthContext> {
        let token = match header {
            Some(v) if v.starts_with("Bearer ") => &v[7..],
            _ => return Err(ErrorKind::AuthenticationRequired),
        };
        let claims = self.signer.verify(token)?;
        let client = self
            .store
            .get_client(&claims.sub)?
            .ok_or(ErrorKind::InvalidToken)?;
        if !client.active {
            return Err(ErrorKind::InactiveClient);
        }
        Ok(AuthContext { claims, client })
    }

    // -----------------------------------------------------------------------
    // Client management
    // -----------------------------------------------------------------------

    pub fn client_info(&self, id: &Uuid) -> Result<ClientRecord> {
        self.store
            .get_client(id)?
            .ok_or_else(|| ErrorKind::not_found(format!("client {}", id)))
    }

    /// Deactivate a client. Its outstanding tokens stop working at the
    /// next bearer resolution.
    pub fn revoke(&self, id: &Uuid) -> Result<ClientRecord> {
        let mut client = self.client_info(id)?;
        client.active = false;
        client.updated_at = Utc::now();
        self.store.update_client(&client)?;
        self.audit.record(AuditEvent::new(AuditAction::ClientRevoked {
            client_id: client.id,
        }));
        tracing::info!(client_id = %client.id, "revoked client");
        Ok(client)
    }
}

// ---------------------------------------------------------------------------
// Password hashing
// ---------------------------------------------------------------------------

/// Argon2id with the crate's recommended parameters and a fresh salt.
pub fn hash_secret(secret: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ErrorKind::internal(format!("password hashing failed: {}", e)))
}

/// Verify a candidate secret against a stored PHC string.
pub fn verify_secret(hashed: &str, candidate: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hashed)
        .map_err(|e| ErrorKind::internal(format!("stored hash unparseable: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed)
        .is_ok())
}

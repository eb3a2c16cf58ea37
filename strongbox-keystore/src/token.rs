//! Signed bearer tokens: HMAC-SHA-256, compact JWT form.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::error::{ErrorKind, Result};
use crate::types::ClientRecord;

/// Claims carried by an issued token.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Client id.
    pub sub: Uuid,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies tokens with a process-held HMAC key.
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenSigner {
    pub fn new(key: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(key),
            decoding: DecodingKey::from_secret(key),
            ttl,
        }
    }

    /// Sign a token for `client` with the configured lifetime.
    pub fn issue(&self, client: &ClientRecord) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: client.id,
            roles: client.roles.iter().cloned().collect(),
            permissions: client.permissions.iter().cloned().collect(),
            iat: now,
            exp: now + self.ttl.as_secs() as i64,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ErrorKind::internal(format!("token signing failed: {}", e)))
    }

    /// Verify a token. Rejects unknown algorithms, bad signatures, a
    /// missing `exp`, and anything at or past expiry (zero leeway).
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|_| ErrorKind::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn client() -> ClientRecord {
        ClientRecord::new(
            "tester",
            "unused-hash".into(),
            BTreeSet::from(["reader".to_string()]),
            BTreeSet::from(["secrets:read".to_string()]),
        )
    }

    fn signer() -> TokenSigner {
        TokenSigner::new(b"0123456789abcdef0123456789abcdef", Duration::from_secs(3600))
    }

    #[test]
    fn issue_verify_roundtrip() {
        let s = signer();
        let c = client();
        let token = s.issue(&c).unwrap();
        let claims = s.verify(&token).unwrap();
        assert_eq!(claims.sub, c.id);
        assert_eq!(claims.roles, vec!["reader"]);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn tampered_token_rejected() {
        let s = signer();
        let mut token = s.issue(&client()).unwrap();
        // Corrupt the signature segment.
        let flipped = if token.ends_with('A') { 'B' } else { 'A' };
        token.pop();
        token.push(flipped);
        assert_eq!(s.verify(&token).unwrap_err(), ErrorKind::InvalidToken);
    }

    #[test]
    fn wrong_key_rejected() {
        let s = signer();
        let other = TokenSigner::new(b"another-signing-key-entirely!!!!", Duration::from_secs(3600));
        let token = s.issue(&client()).unwrap();
        assert_eq!(other.verify(&token).unwrap_err(), ErrorKind::InvalidToken);
    }

    #[test]
    fn expired_token_rejected() {
        let s = signer();
        let c = client();
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: c.id,
            roles: vec![],
            permissions: vec![],
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"0123456789abcdef0123456789abcdef"),
        )
        .unwrap();
        assert_eq!(s.verify(&token).unwrap_err(), ErrorKind::InvalidToken);
    }

    #[test]
    fn foreign_algorithm_rejected() {
        let s = signer();
        let c = client();
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: c.id,
            roles: vec![],
            permissions: vec![],
            iat: now,
            exp: now + 3600,
        };
        let token = encode(
            &Header::new(Algorithm::HS384),
            &claims,
            &EncodingKey::from_secret(b"0123456789abcdef0123456789abcdef"),
        )
        .unwrap();
        assert_eq!(s.verify(&token).unwrap_err(), ErrorKind::InvalidToken);
    }
}

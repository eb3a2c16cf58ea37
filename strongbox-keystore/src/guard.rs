//! Authorization guard: role/permission gating for protected operations.

use crate::error::{ErrorKind, Result};
use crate::types::ClientRecord;

/// Grants every role or permission check it appears in.
pub const WILDCARD: &str = "*";

/// What an operation demands of the calling client.
#[derive(Clone, Debug, Default)]
pub struct AccessCheck {
    /// Client must hold at least one of these (or the wildcard role).
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    /// `false`: any listed permission suffices. `true`: all are required.
    pub require_all_permissions: bool,
}

impl AccessCheck {
    /// No requirements beyond a valid token.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    pub fn all_permissions(mut self) -> Self {
        self.require_all_permissions = true;
        self
    }
}

/// Check a client against an operation's requirements.
pub fn authorize(client: &ClientRecord, check: &AccessCheck) -> Result<()> {
    if !check.roles.is_empty() {
        let wildcard = client.roles.contains(WILDCARD);
        let intersects = check.roles.iter().any(|r| client.roles.contains(r));
        if !wildcard && !intersects {
            return Err(ErrorKind::Forbidden(format!(
                "requires one of roles: {}",
                check.roles.join(", ")
            )));
        }
    }

    if !check.permissions.is_empty() {
        let wildcard = client.permissions.contains(WILDCARD);
        let granted = if check.require_all_permissions {
            check.permissions.iter().all(|p| client.permissions.contains(p))
        } else {
            check.permissions.iter().any(|p| client.permissions.contains(p))
        };
        if !wildcard && !granted {
            let mode = if check.require_all_permissions { "all of" } else { "one of" };
            return Err(ErrorKind::Forbidden(format!(
                "requires {} permissions: {}",
                mode,
                check.permissions.join(", ")
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn client(roles: &[&str], permissions: &[&str]) -> ClientRecord {
        ClientRecord::new(
            "c",
            "h".into(),
            roles.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            permissions.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
        )
    }

    #[test]
    fn wildcard_role_passes_any_check() {
        let admin = client(&["*"], &[]);
        assert!(authorize(&admin, &AccessCheck::roles(["operator"])).is_ok());
    }

    #[test]
    fn role_intersection_suffices() {
        let c = client(&["reader", "auditor"], &[]);
        assert!(authorize(&c, &AccessCheck::roles(["auditor", "operator"])).is_ok());
    }

    #[test]
    fn missing_role_is_forbidden() {
        let c = client(&["reader"], &[]);
        let err = authorize(&c, &AccessCheck::roles(["operator"])).unwrap_err();
        assert!(matches!(err, ErrorKind::Forbidden(msg) if msg.contains("operator")));
    }

    #[test]
    fn any_permission_mode() {
        let c = client(&[], &["secrets:read"]);
        let check = AccessCheck::none().with_permissions(["secrets:read", "secrets:write"]);
        assert!(authorize(&c, &check).is_ok());
    }

    #[test]
    fn all_permissions_mode_requires_containment() {
        let c = client(&[], &["secrets:read"]);
        let check = AccessCheck::none()
            .with_permissions(["secrets:read", "secrets:write"])
            .all_permissions();
        assert!(authorize(&c, &check).is_err());

        let c2 = client(&[], &["secrets:read", "secrets:write", "deks:manage"]);
        assert!(authorize(&c2, &check).is_ok());
    }

    #[test]
    fn wildcard_permission_passes_all_mode() {
        let admin = client(&[], &["*"]);
        let check = AccessCheck::none()
            .with_permissions(["secrets:read", "secrets:write"])
            .all_permissions();
        assert!(authorize(&admin, &check).is_ok());
    }

    #[test]
    fn empty_check_allows_anyone() {
        let c = client(&[], &[]);
        assert!(authorize(&c, &AccessCheck::none()).is_ok());
    }
}

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Role carried by a verified identity.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Vendor,
    Driver,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Client => "Client",
            Role::Vendor => "Vendor",
            Role::Driver => "Driver",
            Role::Admin => "Admin",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "Client" => Some(Role::Client),
            "Vendor" => Some(Role::Vendor),
            "Driver" => Some(Role::Driver),
            "Admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// The verified identity a request runs under.
///
/// Handlers receive this as an explicit parameter, there is no ambient
/// request state.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: String,
    pub user_type: Role,
    pub email: String,
}

/// Whether a principal with `role` may use a route restricted to `required`.
///
/// An empty list means any authenticated caller; Admin passes every guard.
pub fn role_permits(required: &[Role], role: Role) -> bool {
    role == Role::Admin || required.is_empty() || required.contains(&role)
}

/// Trait hiding the identity collaborator.
///
/// The real deployment sits behind a gateway that verifies the JWT; all this
/// layer needs is bearer token in, `{id, userType, email}` out. The static
/// table implementation below serves development and tests.
pub trait Identity: Send + Sync {
    /// Resolve a bearer token to the principal it was issued to.
    ///
    /// Unknown or expired tokens fail with Unauthorized.
    fn verify_bearer(&self, token: &str) -> Result<Principal>;
}

/// Identity backed by a fixed token table.
pub struct StaticIdentity {
    tokens: HashMap<String, Principal>,
}

impl StaticIdentity {
    pub fn new() -> StaticIdentity {
        StaticIdentity {
            tokens: HashMap::new(),
        }
    }

    pub fn insert(&mut self, token: &str, principal: Principal) {
        self.tokens.insert(token.to_string(), principal);
    }

    /// Load a token table from its JSON form, a map of token to principal:
    /// `{"token-1": {"id": "u1", "userType": "Client", "email": "..."}}`
    pub fn from_json(json: &str) -> Result<StaticIdentity> {
        let tokens: HashMap<String, Principal> =
            serde_json::from_str(json).map_err(|err| Error::Validation(err.to_string()))?;
        Ok(StaticIdentity { tokens })
    }

    /// Well-known tokens for local development, one per role.
    pub fn dev_tokens() -> StaticIdentity {
        let mut identity = StaticIdentity::new();
        for (token, id, role) in [
            ("dev-client", "dev-client-user", Role::Client),
            ("dev-vendor", "dev-vendor-user", Role::Vendor),
            ("dev-driver", "dev-driver-user", Role::Driver),
            ("dev-admin", "dev-admin-user", Role::Admin),
        ] {
            identity.insert(
                token,
                Principal {
                    id: id.to_string(),
                    user_type: role,
                    email: format!("{}@example.com", id),
                },
            );
        }
        identity
    }
}

impl Identity for StaticIdentity {
    fn verify_bearer(&self, token: &str) -> Result<Principal> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| Error::Unauthorized("unknown bearer token".to_string()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_static_identity_lookup() {
        let mut identity = StaticIdentity::new();
        identity.insert(
            "tok-1",
            Principal {
                id: "u1".to_string(),
                user_type: Role::Client,
                email: "u1@example.com".to_string(),
            },
        );

        let principal = identity.verify_bearer("tok-1").unwrap();
        assert_eq!(principal.id, "u1");
        assert_eq!(principal.user_type, Role::Client);

        assert!(matches!(
            identity.verify_bearer("tok-2"),
            Err(Error::Unauthorized(_))
        ));
    }

    #[test]
    fn test_token_table_from_json() {
        let identity = StaticIdentity::from_json(
            r#"{"abc": {"id": "u9", "userType": "Driver", "email": "d@example.com"}}"#,
        )
        .unwrap();
        let principal = identity.verify_bearer("abc").unwrap();
        assert_eq!(principal.user_type, Role::Driver);
    }

    #[test]
    fn test_role_guards() {
        assert!(role_permits(&[], Role::Client));
        assert!(role_permits(&[Role::Vendor], Role::Vendor));
        assert!(!role_permits(&[Role::Vendor], Role::Client));
        assert!(!role_permits(&[Role::Driver], Role::Vendor));
        // Admin passes everything
        assert!(role_permits(&[Role::Driver], Role::Admin));
        assert!(role_permits(&[Role::Vendor], Role::Admin));
    }
}

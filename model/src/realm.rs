use crate::constants::REALM;
use crate::error::{self, Result};

/// The realm shipped with the controller, used when no realm file is configured. The client
/// secret is filled in by Keycloak from `HORREUM_CLIENT_SECRET` during the import.
pub const BUILTIN_REALM: &str = include_str!("../resources/keycloak-horreum.json");

/// Provides the Keycloak realm document imported at startup. The document is opaque to the
/// synthesizer, it is copied into the realm config map as is.
pub trait RealmSource: Send + Sync {
    fn realm(&self) -> Result<String>;
}

/// A realm document held in memory.
#[derive(Debug, Clone)]
pub struct StaticRealm {
    document: String,
}

impl StaticRealm {
    /// Checks that `document` is a JSON object describing the `horreum` realm.
    pub fn new<S: Into<String>>(document: S) -> Result<Self> {
        let document = document.into();
        let value: serde_json::Value =
            serde_json::from_str(&document).map_err(|e| error::Error::Realm {
                message: format!("not valid JSON: {}", e),
            })?;
        match value.get("realm").and_then(serde_json::Value::as_str) {
            Some(REALM) => Ok(Self { document }),
            Some(other) => error::RealmSnafu {
                message: format!("expected realm '{}' but found '{}'", REALM, other),
            }
            .fail(),
            None => error::RealmSnafu {
                message: "the document has no 'realm' field",
            }
            .fail(),
        }
    }

    pub fn builtin() -> Self {
        Self {
            document: BUILTIN_REALM.to_owned(),
        }
    }
}

impl Default for StaticRealm {
    fn default() -> Self {
        Self::builtin()
    }
}

impl RealmSource for StaticRealm {
    fn realm(&self) -> Result<String> {
        Ok(self.document.clone())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn builtin_realm_is_valid() {
        let realm = StaticRealm::new(BUILTIN_REALM).unwrap();
        assert!(realm.realm().unwrap().contains("HORREUM_CLIENT_SECRET"));
    }

    #[test]
    fn rejects_other_documents() {
        assert!(StaticRealm::new("not json").is_err());
        assert!(StaticRealm::new(r#"{"realm": "master"}"#).is_err());
        assert!(StaticRealm::new(r#"{"clients": []}"#).is_err());
    }
}

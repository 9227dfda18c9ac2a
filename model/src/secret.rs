use crate::constants::{SECRET_PASSWORD_KEY, SECRET_USERNAME_KEY, SECRET_VALUE_KEY};
use crate::naming::owned_meta;
use crate::{CrdExt, Horreum, Tier};
use k8s_openapi::api::core::v1::Secret;
use rand::distributions::Alphanumeric;
use rand::Rng;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_plain::{derive_display_from_serialize, derive_fromstr_from_deserialize};
use std::collections::BTreeMap;

/// Length of generated passwords and client secrets.
pub const GENERATED_PASSWORD_LENGTH: usize = 24;

/// A credential that one of the deployed components needs. Each role maps to exactly one secret.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, JsonSchema,
)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialRole {
    DbAdmin,
    DbAppUser,
    KeycloakAdmin,
    KeycloakDbUser,
    AppOidcClient,
    AppAdmin,
    AppDbSecret,
}

derive_display_from_serialize!(CredentialRole);
derive_fromstr_from_deserialize!(CredentialRole);

impl CredentialRole {
    /// Opaque roles hold a single `secret` value instead of a username and password.
    pub fn is_opaque(self) -> bool {
        matches!(self, CredentialRole::AppOidcClient | CredentialRole::AppDbSecret)
    }

    /// The username written into a generated secret.
    pub fn default_username(self) -> Option<&'static str> {
        match self {
            CredentialRole::DbAdmin => Some("dbadmin"),
            CredentialRole::DbAppUser => Some("horreum"),
            CredentialRole::KeycloakAdmin | CredentialRole::AppAdmin => Some("admin"),
            CredentialRole::KeycloakDbUser => Some("keycloak"),
            CredentialRole::AppOidcClient | CredentialRole::AppDbSecret => None,
        }
    }

    /// The tier that provisions the secret. The OIDC client secret belongs to Keycloak because the
    /// realm references it before the application exists.
    pub fn owner(self) -> Tier {
        match self {
            CredentialRole::DbAdmin => Tier::Database,
            CredentialRole::KeycloakAdmin
            | CredentialRole::KeycloakDbUser
            | CredentialRole::AppOidcClient => Tier::Keycloak,
            CredentialRole::DbAppUser | CredentialRole::AppAdmin | CredentialRole::AppDbSecret => {
                Tier::App
            }
        }
    }

    fn override_name(self, horreum: &Horreum) -> Option<&str> {
        let spec = &horreum.spec;
        match self {
            CredentialRole::DbAdmin => spec.database.admin_secret.as_deref(),
            CredentialRole::DbAppUser => spec.app.database.secret.as_deref(),
            CredentialRole::KeycloakAdmin => spec.keycloak.admin_secret.as_deref(),
            CredentialRole::KeycloakDbUser => spec.keycloak.database.secret.as_deref(),
            CredentialRole::AppOidcClient => spec.app.oidc_secret.as_deref(),
            CredentialRole::AppAdmin => spec.app.admin_secret.as_deref(),
            CredentialRole::AppDbSecret => None,
        }
        .filter(|name| !name.is_empty())
    }
}

/// Where the value of a credential role lives.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SecretRef {
    pub role: CredentialRole,
    pub name: String,
    /// `true` when the controller creates the secret, `false` when the spec names an existing one.
    pub generated: bool,
}

impl SecretRef {
    pub fn username_key(&self) -> Option<&'static str> {
        (!self.role.is_opaque()).then(|| SECRET_USERNAME_KEY)
    }

    pub fn password_key(&self) -> Option<&'static str> {
        (!self.role.is_opaque()).then(|| SECRET_PASSWORD_KEY)
    }

    pub fn value_key(&self) -> Option<&'static str> {
        self.role.is_opaque().then(|| SECRET_VALUE_KEY)
    }
}

/// Find the secret holding `role`. Without an override in the spec the secret is generated and
/// named `<name>-<role>`.
pub fn resolve(role: CredentialRole, horreum: &Horreum) -> SecretRef {
    match role.override_name(horreum) {
        Some(name) => SecretRef {
            role,
            name: name.to_owned(),
            generated: false,
        },
        None => SecretRef {
            role,
            name: format!("{}-{}", horreum.object_name(), role),
            generated: true,
        },
    }
}

/// The roles provisioned before `tier` is synthesized. An external database is administered
/// elsewhere, so nothing needs its admin credentials.
pub fn owned_roles(tier: Tier, horreum: &Horreum) -> Vec<CredentialRole> {
    let roles: &[CredentialRole] = match tier {
        Tier::Database if horreum.has_external_database() => &[],
        Tier::Database => &[CredentialRole::DbAdmin],
        Tier::Keycloak => &[
            CredentialRole::KeycloakAdmin,
            CredentialRole::KeycloakDbUser,
            CredentialRole::AppOidcClient,
        ],
        Tier::App => &[
            CredentialRole::DbAppUser,
            CredentialRole::AppAdmin,
            CredentialRole::AppDbSecret,
        ],
    };
    roles.to_vec()
}

/// Every role whose secret the workloads of `tier` read. Roles provisioned by an earlier tier are
/// included, an explicitly named secret that does not exist blocks the tier.
pub fn referenced_roles(tier: Tier, horreum: &Horreum) -> Vec<CredentialRole> {
    let in_cluster = !horreum.has_external_database();
    let mut roles = match tier {
        Tier::Database => vec![],
        Tier::Keycloak => vec![
            CredentialRole::KeycloakAdmin,
            CredentialRole::KeycloakDbUser,
            CredentialRole::AppOidcClient,
        ],
        Tier::App => vec![
            CredentialRole::KeycloakAdmin,
            CredentialRole::AppAdmin,
            CredentialRole::DbAppUser,
            CredentialRole::AppDbSecret,
            CredentialRole::AppOidcClient,
        ],
    };
    if in_cluster || (tier == Tier::App && migration_role(horreum) == CredentialRole::DbAdmin) {
        roles.push(CredentialRole::DbAdmin);
    }
    roles.sort();
    roles
}

/// The credentials the application runs schema migrations with. An external database only has an
/// administrator when one is named explicitly, otherwise the application user migrates.
pub fn migration_role(horreum: &Horreum) -> CredentialRole {
    if !horreum.has_external_database() || CredentialRole::DbAdmin.override_name(horreum).is_some()
    {
        CredentialRole::DbAdmin
    } else {
        CredentialRole::DbAppUser
    }
}

/// A random alphanumeric password.
pub fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}

/// The secret created for a generated reference, holding `password` as the password or the opaque
/// value.
pub fn generated_secret(reference: &SecretRef, horreum: &Horreum, password: &str) -> Secret {
    let mut data = BTreeMap::new();
    match reference.role.default_username() {
        Some(username) => {
            data.insert(SECRET_USERNAME_KEY.to_owned(), username.to_owned());
            data.insert(SECRET_PASSWORD_KEY.to_owned(), password.to_owned());
        }
        None => {
            data.insert(SECRET_VALUE_KEY.to_owned(), password.to_owned());
        }
    }
    Secret {
        metadata: owned_meta(&reference.name, horreum),
        string_data: Some(data),
        type_: Some("Opaque".to_owned()),
        ..Secret::default()
    }
}

/// The secret the cluster issues the serving certificate of `tier` into.
pub fn certificate_secret_name(tier: Tier, horreum: &Horreum) -> Option<String> {
    match tier {
        Tier::Database => None,
        Tier::Keycloak => Some(format!("{}-keycloak-certs", horreum.object_name())),
        Tier::App => Some(format!("{}-app-certs", horreum.object_name())),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::horreum;

    #[test]
    fn generated_names_follow_role() {
        let h = horreum("perf", "hr");
        let reference = resolve(CredentialRole::KeycloakDbUser, &h);
        assert_eq!(reference.name, "perf-keycloak-db-user");
        assert!(reference.generated);
        assert_eq!(reference.username_key(), Some("username"));
        assert_eq!(reference.value_key(), None);

        let oidc = resolve(CredentialRole::AppOidcClient, &h);
        assert_eq!(oidc.name, "perf-app-oidc-client");
        assert_eq!(oidc.value_key(), Some("secret"));
        assert_eq!(oidc.password_key(), None);
    }

    #[test]
    fn overrides_are_not_generated() {
        let mut h = horreum("perf", "hr");
        h.spec.database.admin_secret = Some("pg-admin".into());
        h.spec.app.oidc_secret = Some(String::new());
        let admin = resolve(CredentialRole::DbAdmin, &h);
        assert_eq!(admin.name, "pg-admin");
        assert!(!admin.generated);
        assert!(resolve(CredentialRole::AppOidcClient, &h).generated);
    }

    #[test]
    fn every_role_has_one_owner() {
        let h = horreum("perf", "hr");
        let mut all: Vec<_> = Tier::ALL
            .iter()
            .flat_map(|tier| owned_roles(*tier, &h))
            .collect();
        all.sort();
        assert_eq!(all.len(), 7);
        all.dedup();
        assert_eq!(all.len(), 7);
        for tier in Tier::ALL {
            for role in owned_roles(tier, &h) {
                assert_eq!(role.owner(), tier);
            }
        }
    }

    #[test]
    fn external_database_needs_no_admin() {
        let mut h = horreum("perf", "hr");
        h.spec.database.host = Some("db.example.com".into());
        assert!(owned_roles(Tier::Database, &h).is_empty());
    }

    #[test]
    fn external_database_migrates_as_app_user() {
        let mut h = horreum("perf", "hr");
        assert_eq!(migration_role(&h), CredentialRole::DbAdmin);
        assert!(referenced_roles(Tier::Keycloak, &h).contains(&CredentialRole::DbAdmin));

        h.spec.database.host = Some("db.example.com".into());
        assert_eq!(migration_role(&h), CredentialRole::DbAppUser);
        assert!(!referenced_roles(Tier::App, &h).contains(&CredentialRole::DbAdmin));
        assert!(referenced_roles(Tier::Database, &h).is_empty());

        h.spec.database.admin_secret = Some("pg-admin".into());
        assert_eq!(migration_role(&h), CredentialRole::DbAdmin);
        assert!(referenced_roles(Tier::App, &h).contains(&CredentialRole::DbAdmin));
        assert!(!referenced_roles(Tier::Keycloak, &h).contains(&CredentialRole::DbAdmin));
    }

    #[test]
    fn generated_secret_contents() {
        let h = horreum("perf", "hr");
        let password = generate_password();
        assert_eq!(password.len(), GENERATED_PASSWORD_LENGTH);
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));

        let secret = generated_secret(&resolve(CredentialRole::DbAdmin, &h), &h, &password);
        let data = secret.string_data.unwrap();
        assert_eq!(data.get("username").unwrap(), "dbadmin");
        assert_eq!(data.get("password").unwrap(), &password);
        assert_eq!(secret.metadata.namespace.as_deref(), Some("hr"));

        let opaque = generated_secret(&resolve(CredentialRole::AppDbSecret, &h), &h, "x");
        assert_eq!(opaque.string_data.unwrap().keys().collect::<Vec<_>>(), vec!["secret"]);
    }
}

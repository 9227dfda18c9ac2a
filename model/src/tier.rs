use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_plain::{derive_display_from_serialize, derive_fromstr_from_deserialize};

/// One of the three dependency-ordered parts of a Horreum deployment. The declaration order is the
/// dependency order: the database must be ready before Keycloak is created, and Keycloak (with the
/// OIDC client configuration) must be ready before the application starts.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub enum Tier {
    /// PostgreSQL, either run in-cluster or provided externally.
    Database,
    /// The Keycloak identity provider.
    Keycloak,
    /// The Horreum application server.
    App,
}

derive_display_from_serialize!(Tier);
derive_fromstr_from_deserialize!(Tier);

impl Tier {
    /// All tiers in the order they must be converged.
    pub const ALL: [Tier; 3] = [Tier::Database, Tier::Keycloak, Tier::App];

    /// The value of the `service` pod label for workloads of this tier.
    pub fn component(self) -> &'static str {
        match self {
            Tier::Database => "postgres",
            Tier::Keycloak => "keycloak",
            Tier::App => "app",
        }
    }
}

#[test]
fn tiers_are_ordered_by_dependency() {
    let mut sorted = vec![Tier::App, Tier::Database, Tier::Keycloak];
    sorted.sort();
    assert_eq!(sorted, Tier::ALL.to_vec());
    assert_eq!(Tier::Keycloak.to_string(), "keycloak");
}

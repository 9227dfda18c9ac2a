/*!

Canonical names, hosts, images and labels of everything the controller creates. All functions are
total and depend only on the `Horreum` object, so the same spec always yields the same names. The
names double as the identity of the desired resources when comparing them with the cluster.

!*/

use crate::constants::{
    APP_INSTANCE, APP_MANAGED_BY, APP_PART_OF, DEFAULT_APPS_DOMAIN, DEFAULT_APP_DB_NAME,
    DEFAULT_APP_IMAGE, DEFAULT_KEYCLOAK_DB_NAME, DEFAULT_KEYCLOAK_IMAGE, DEFAULT_POSTGRES_IMAGE,
    LABEL_APP, LABEL_SERVICE, OPERATOR, PART_OF, POSTGRES_PORT,
};
use crate::{CrdExt, Horreum, RoutingSpec, Tier};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;
use maplit::btreemap;
use std::collections::BTreeMap;

/// The name of the tier's workload.
pub fn canonical_name(tier: Tier, horreum: &Horreum) -> String {
    format!("{}-{}", horreum.object_name(), tier.component())
}

/// The name of the tier's service. The application's service carries the bare object name since
/// it is the one users reach.
pub fn service_name(tier: Tier, horreum: &Horreum) -> String {
    match tier {
        Tier::Database | Tier::Keycloak => canonical_name(tier, horreum),
        Tier::App => horreum.object_name().to_owned(),
    }
}

/// Routes are named after the service they expose.
pub fn route_name(tier: Tier, horreum: &Horreum) -> String {
    service_name(tier, horreum)
}

pub fn realm_config_map_name(horreum: &Horreum) -> String {
    format!("{}-keycloak-horreum-realm", horreum.object_name())
}

pub fn app_init_config_map_name(horreum: &Horreum) -> String {
    format!("{}-app-init", horreum.object_name())
}

pub fn service_ca_config_map_name(horreum: &Horreum) -> String {
    format!("{}-service-ca", horreum.object_name())
}

pub fn default_image(tier: Tier) -> &'static str {
    match tier {
        Tier::Database => DEFAULT_POSTGRES_IMAGE,
        Tier::Keycloak => DEFAULT_KEYCLOAK_IMAGE,
        Tier::App => DEFAULT_APP_IMAGE,
    }
}

/// The image of the tier, from the spec or the default one.
pub fn image(tier: Tier, horreum: &Horreum) -> String {
    let spec = &horreum.spec;
    let configured = match tier {
        Tier::Database => spec.database.image.as_deref(),
        Tier::Keycloak => spec.keycloak.image.as_deref(),
        Tier::App => spec.app.image.as_deref(),
    };
    with_default(configured, default_image(tier))
}

/// The routing spec of the tier. The database is never exposed.
pub fn routing(tier: Tier, horreum: &Horreum) -> Option<&RoutingSpec> {
    match tier {
        Tier::Database => None,
        Tier::Keycloak => Some(&horreum.spec.keycloak.route),
        Tier::App => Some(&horreum.spec.app.route),
    }
}

/// `<service>.<namespace>.svc`, the name other tiers use to reach this one.
pub fn internal_host(tier: Tier, horreum: &Horreum) -> String {
    format!(
        "{}.{}.svc",
        service_name(tier, horreum),
        horreum.namespace_or_empty()
    )
}

/// The host a route gets when the spec does not name one. The database has no route and gets its
/// internal host.
pub fn default_host(tier: Tier, horreum: &Horreum) -> String {
    match tier {
        Tier::Database => internal_host(tier, horreum),
        Tier::Keycloak | Tier::App => format!(
            "{}-{}.{}",
            route_name(tier, horreum),
            horreum.namespace_or_empty(),
            with_default(horreum.spec.apps_domain.as_deref(), DEFAULT_APPS_DOMAIN)
        ),
    }
}

/// The public host of the tier.
pub fn host(tier: Tier, horreum: &Horreum) -> String {
    let configured = routing(tier, horreum).and_then(|route| route.host.as_deref());
    match configured {
        Some(host) if !host.is_empty() => host.to_owned(),
        _ => default_host(tier, horreum),
    }
}

pub fn database_host(horreum: &Horreum) -> String {
    match horreum.spec.database.host.as_deref() {
        Some(host) if !host.is_empty() => host.to_owned(),
        _ => internal_host(Tier::Database, horreum),
    }
}

pub fn database_port(horreum: &Horreum) -> i32 {
    horreum.spec.database.port.unwrap_or(POSTGRES_PORT)
}

/// The name of the database used by the Keycloak or App tier.
pub fn database_name(tier: Tier, horreum: &Horreum) -> String {
    match tier {
        Tier::Keycloak => with_default(
            horreum.spec.keycloak.database.name.as_deref(),
            DEFAULT_KEYCLOAK_DB_NAME,
        ),
        Tier::Database | Tier::App => with_default(
            horreum.spec.app.database.name.as_deref(),
            DEFAULT_APP_DB_NAME,
        ),
    }
}

pub fn jdbc_url(horreum: &Horreum, database: &str) -> String {
    format!(
        "jdbc:postgresql://{}:{}/{}",
        database_host(horreum),
        database_port(horreum),
        database
    )
}

/// The labels every generated resource carries. Deleting by these labels removes everything
/// belonging to one `Horreum` object.
pub fn owner_labels(horreum: &Horreum) -> BTreeMap<String, String> {
    let name = horreum.object_name();
    btreemap! {
        LABEL_APP => name,
        APP_INSTANCE => name,
        APP_PART_OF => PART_OF,
        APP_MANAGED_BY => OPERATOR,
    }
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// The labels selecting the pods of a tier.
pub fn selector_labels(tier: Tier, horreum: &Horreum) -> BTreeMap<String, String> {
    btreemap! {
        LABEL_APP.to_string() => horreum.object_name().to_string(),
        LABEL_SERVICE.to_string() => tier.component().to_string(),
    }
}

/// The label selector matching every resource generated for `horreum`.
pub fn owned_selector(horreum: &Horreum) -> String {
    format!(
        "{}={},{}={}",
        APP_INSTANCE,
        horreum.object_name(),
        APP_MANAGED_BY,
        OPERATOR
    )
}

/// Metadata shared by every generated resource: the namespace of `horreum`, the owner labels and
/// an owner reference when `horreum` has a uid.
pub fn owned_meta(name: &str, horreum: &Horreum) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_owned()),
        namespace: horreum.metadata.namespace.clone(),
        labels: Some(owner_labels(horreum)),
        owner_references: horreum.controller_owner_ref(&()).map(|owner| vec![owner]),
        ..ObjectMeta::default()
    }
}

fn with_default(value: Option<&str>, default: &str) -> String {
    match value {
        Some(value) if !value.is_empty() => value.to_owned(),
        _ => default.to_owned(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::horreum;

    #[test]
    fn names_follow_object_name() {
        let h = horreum("perf", "hr");
        assert_eq!(canonical_name(Tier::Database, &h), "perf-postgres");
        assert_eq!(canonical_name(Tier::Keycloak, &h), "perf-keycloak");
        assert_eq!(canonical_name(Tier::App, &h), "perf-app");
        assert_eq!(service_name(Tier::App, &h), "perf");
        assert_eq!(internal_host(Tier::Keycloak, &h), "perf-keycloak.hr.svc");
        assert_eq!(realm_config_map_name(&h), "perf-keycloak-horreum-realm");
    }

    #[test]
    fn hosts_default_from_route_name() {
        let mut h = horreum("perf", "hr");
        assert_eq!(
            default_host(Tier::Keycloak, &h),
            "perf-keycloak-hr.apps.cluster.local"
        );
        h.spec.apps_domain = Some("apps.example.com".into());
        assert_eq!(host(Tier::App, &h), "perf-hr.apps.example.com");
        h.spec.app.route.host = Some("horreum.example.com".into());
        assert_eq!(host(Tier::App, &h), "horreum.example.com");
        h.spec.app.route.host = Some(String::new());
        assert_eq!(host(Tier::App, &h), "perf-hr.apps.example.com");
        assert_eq!(host(Tier::Database, &h), "perf-postgres.hr.svc");
    }

    #[test]
    fn images_and_databases_default() {
        let mut h = horreum("perf", "hr");
        assert_eq!(image(Tier::Keycloak, &h), DEFAULT_KEYCLOAK_IMAGE);
        h.spec.app.image = Some("example.com/horreum:dev".into());
        assert_eq!(image(Tier::App, &h), "example.com/horreum:dev");
        assert_eq!(
            jdbc_url(&h, &database_name(Tier::App, &h)),
            "jdbc:postgresql://perf-postgres.hr.svc:5432/horreum"
        );
        h.spec.database.host = Some("db.example.com".into());
        h.spec.database.port = Some(6543);
        h.spec.keycloak.database.name = Some("kc".into());
        assert_eq!(
            jdbc_url(&h, &database_name(Tier::Keycloak, &h)),
            "jdbc:postgresql://db.example.com:6543/kc"
        );
    }

    #[test]
    fn labels_are_shared() {
        let h = horreum("perf", "hr");
        let labels = owner_labels(&h);
        assert_eq!(labels.get("app").map(String::as_str), Some("perf"));
        assert_eq!(
            owned_selector(&h),
            "app.kubernetes.io/instance=perf,app.kubernetes.io/managed-by=horreum-operator"
        );
        assert_eq!(
            selector_labels(Tier::Keycloak, &h)
                .get("service")
                .map(String::as_str),
            Some("keycloak")
        );
    }

    #[test]
    fn owner_reference_needs_uid() {
        let mut h = horreum("perf", "hr");
        let meta = owned_meta("perf-app", &h);
        let owner = &meta.owner_references.unwrap()[0];
        assert_eq!(owner.kind, "Horreum");
        assert_eq!(owner.api_version, "hyperfoil.io/v1alpha1");
        assert_eq!(owner.controller, Some(true));

        h.metadata.uid = None;
        assert!(owned_meta("perf-app", &h).owner_references.is_none());
    }
}

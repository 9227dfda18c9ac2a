use crate::constants::ANNOTATION_JAVA_OPTIONS;
use crate::{CrdExt, Tier};
use chrono::{DateTime, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{CustomResource, Resource as Kresource};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_plain::{derive_display_from_serialize, derive_fromstr_from_deserialize};

/// The declarative description of one Horreum deployment: a database, a Keycloak identity
/// provider and the Horreum application. The `CustomResource` derive also produces a struct named
/// `Horreum` which represents the CRD object in the k8s API.
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "hyperfoil.io",
    kind = "Horreum",
    namespaced,
    plural = "horreums",
    singular = "horreum",
    status = "HorreumStatus",
    version = "v1alpha1",
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Tier", "type":"string", "jsonPath":".status.reachedTier"}"#,
    printcolumn = r#"{"name":"URL", "type":"string", "jsonPath":".status.publicUrl"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct HorreumSpec {
    /// DNS suffix used for route hosts that are not given explicitly.
    pub apps_domain: Option<String>,
    /// The PostgreSQL database.
    #[serde(default)]
    pub database: DatabaseSpec,
    /// The Keycloak identity provider.
    #[serde(default)]
    pub keycloak: KeycloakSpec,
    /// The Horreum application server.
    #[serde(default)]
    pub app: AppSpec,
}

/// How a tier is exposed outside of the cluster.
#[derive(Serialize, Deserialize, Debug, Default, Eq, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoutingSpec {
    /// One of `none`, `edge`, `passthrough` or `reencrypt`. An empty value means `reencrypt`.
    #[serde(default, rename = "type")]
    pub route_type: String,
    /// The public host name. Derived from the route name, namespace and apps domain when missing.
    pub host: Option<String>,
    /// Name of the secret holding `tls.crt` and `tls.key`. Required for `passthrough`.
    pub tls: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default, Eq, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSpec {
    /// PostgreSQL image used by the in-cluster database and by the database init steps.
    pub image: Option<String>,
    /// Host of an external database. When set, no database workload is deployed.
    pub host: Option<String>,
    /// Port of an external database.
    pub port: Option<i32>,
    /// Secret with `username` and `password` of the database administrator.
    pub admin_secret: Option<String>,
    /// Claim holding the database files. An `emptyDir` is used when missing.
    pub persistent_volume_claim: Option<String>,
    /// User id for the database containers, for clusters that require a specific one.
    pub run_as_user: Option<i64>,
}

/// Which database a tier uses inside the shared PostgreSQL instance.
#[derive(Serialize, Deserialize, Debug, Default, Eq, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseRef {
    /// Name of the database.
    pub name: Option<String>,
    /// Secret with `username` and `password` of the database user.
    pub secret: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default, Eq, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KeycloakSpec {
    pub image: Option<String>,
    #[serde(default)]
    pub route: RoutingSpec,
    #[serde(default, deserialize_with = "crate::schema_utils::null_to_default")]
    #[schemars(schema_with = "crate::schema_utils::nullable_enum::<ServiceType>")]
    pub service_type: ServiceType,
    /// Secret with `username` and `password` of the Keycloak administrator.
    pub admin_secret: Option<String>,
    #[serde(default)]
    pub database: DatabaseRef,
}

#[derive(Serialize, Deserialize, Debug, Default, Eq, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppSpec {
    pub image: Option<String>,
    #[serde(default)]
    pub route: RoutingSpec,
    #[serde(default, deserialize_with = "crate::schema_utils::null_to_default")]
    #[schemars(schema_with = "crate::schema_utils::nullable_enum::<ServiceType>")]
    pub service_type: ServiceType,
    /// Secret with `username` and `password` of the Horreum administrator.
    pub admin_secret: Option<String>,
    /// Secret with the OIDC client secret under the `secret` key.
    pub oidc_secret: Option<String>,
    #[serde(default)]
    pub database: DatabaseRef,
    /// User id for the init step, for clusters that require a specific one.
    pub run_as_user: Option<i64>,
}

#[derive(Serialize, Deserialize, Debug, Eq, PartialEq, Clone, Copy, JsonSchema)]
pub enum ServiceType {
    ClusterIP,
    NodePort,
}

impl Default for ServiceType {
    fn default() -> Self {
        Self::ClusterIP
    }
}

derive_display_from_serialize!(ServiceType);
derive_fromstr_from_deserialize!(ServiceType);

/// The status written by the controller after each convergence cycle.
#[derive(Serialize, Deserialize, Debug, Default, Eq, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HorreumStatus {
    pub phase: StatusPhase,
    /// The most advanced tier that is done.
    pub reached_tier: Option<Tier>,
    /// Why the deployment is not ready, empty when it is.
    pub reason: String,
    #[serde(default)]
    pub tiers: Vec<TierStatus>,
    /// The public URL of the Horreum application.
    pub public_url: Option<String>,
    /// The public URL of Keycloak.
    pub keycloak_url: Option<String>,
    /// RFC 3339 timestamp of the last status update.
    pub last_update: Option<String>,
    /// Number of cycles in a row that ended with a failed tier.
    #[serde(default)]
    pub consecutive_failures: u32,
    /// The `metadata.generation` the last cycle converged.
    pub observed_generation: Option<i64>,
    /// RFC 3339 timestamp of the next planned cycle. Missing when the controller waits for a
    /// change.
    pub next_attempt: Option<String>,
}

impl HorreumStatus {
    /// When the next cycle is planned, `None` if it is not planned or the timestamp is invalid.
    pub fn next_attempt(&self) -> Option<DateTime<Utc>> {
        self.next_attempt
            .as_deref()
            .and_then(|value| DateTime::parse_from_rfc3339(value).ok())
            .map(|value| value.with_timezone(&Utc))
    }

    /// Whether `other` reports the same state, ignoring when it was written and when the next
    /// cycle is planned.
    pub fn same_state(&self, other: &HorreumStatus) -> bool {
        let untimed = |status: &HorreumStatus| HorreumStatus {
            last_update: None,
            next_attempt: None,
            ..status.clone()
        };
        untimed(self) == untimed(other)
    }
}

#[derive(Serialize, Deserialize, Debug, Eq, PartialEq, Clone, Copy, JsonSchema)]
pub enum StatusPhase {
    Pending,
    Ready,
    Blocked,
    Failed,
}

impl Default for StatusPhase {
    fn default() -> Self {
        Self::Pending
    }
}

derive_display_from_serialize!(StatusPhase);

#[derive(Serialize, Deserialize, Debug, Eq, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TierStatus {
    pub tier: Tier,
    pub phase: TierPhase,
    pub reason: Option<String>,
}

/// Where a tier got to in a convergence cycle. `Blocked` and `Failed` are terminal for the tier
/// in that cycle but not for the whole cycle.
#[derive(Serialize, Deserialize, Debug, Eq, PartialEq, Clone, Copy, JsonSchema)]
pub enum TierPhase {
    Pending,
    Synthesizing,
    Diffing,
    Applying,
    WaitingReady,
    Done,
    Blocked,
    Failed,
}

impl Default for TierPhase {
    fn default() -> Self {
        Self::Pending
    }
}

derive_display_from_serialize!(TierPhase);

impl Horreum {
    /// The namespace of the object, `""` in the impossible case that it is missing.
    pub fn namespace_or_empty(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or("")
    }

    /// Extra JVM options for the application, from the `java-options` annotation.
    pub fn java_options(&self) -> Option<&str> {
        self.metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(ANNOTATION_JAVA_OPTIONS))
            .map(String::as_str)
    }

    /// Whether the database is provided outside of the cluster.
    pub fn has_external_database(&self) -> bool {
        self.spec
            .database
            .host
            .as_deref()
            .map(|host| !host.is_empty())
            .unwrap_or(false)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.status
            .as_ref()
            .map(|s| s.consecutive_failures)
            .unwrap_or_default()
    }
}

impl CrdExt for Horreum {
    fn object_meta(&self) -> &ObjectMeta {
        self.meta()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn deserialize_minimal() {
        let horreum: Horreum = serde_yaml::from_str(
            r#"
apiVersion: hyperfoil.io/v1alpha1
kind: Horreum
metadata:
  name: example
  namespace: perf
  annotations:
    java-options: -Xmx1g
spec:
  keycloak:
    route:
      type: passthrough
      tls: kc-tls
  app:
    serviceType: null
"#,
        )
        .unwrap();
        assert_eq!(horreum.object_name(), "example");
        assert_eq!(horreum.namespace_or_empty(), "perf");
        assert_eq!(horreum.java_options(), Some("-Xmx1g"));
        assert_eq!(horreum.spec.keycloak.route.route_type, "passthrough");
        assert_eq!(horreum.spec.app.route, RoutingSpec::default());
        assert_eq!(horreum.spec.app.service_type, ServiceType::ClusterIP);
        assert!(!horreum.has_external_database());
    }

    #[test]
    fn next_attempt_timestamp() {
        let status = HorreumStatus {
            next_attempt: Some("2026-10-19T10:00:00+02:00".to_string()),
            ..Default::default()
        };
        assert_eq!(
            status.next_attempt().unwrap().to_rfc3339(),
            "2026-10-19T08:00:00+00:00"
        );
        let status = HorreumStatus {
            next_attempt: Some("soon".to_string()),
            ..Default::default()
        };
        assert_eq!(status.next_attempt(), None);
    }

    #[test]
    fn timestamps_do_not_change_the_state() {
        let ready = HorreumStatus {
            phase: StatusPhase::Ready,
            reached_tier: Some(Tier::App),
            last_update: Some("2026-10-19T08:00:00+00:00".to_string()),
            next_attempt: Some("2026-10-19T08:05:00+00:00".to_string()),
            ..Default::default()
        };
        let later = HorreumStatus {
            last_update: Some("2026-10-19T08:05:00+00:00".to_string()),
            next_attempt: Some("2026-10-19T08:10:00+00:00".to_string()),
            ..ready.clone()
        };
        assert!(ready.same_state(&later));
        let failed = HorreumStatus {
            phase: StatusPhase::Failed,
            consecutive_failures: 1,
            ..later
        };
        assert!(!ready.same_state(&failed));
    }
}

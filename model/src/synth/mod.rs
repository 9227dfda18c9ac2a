/*!

The resource synthesizer turns a `Horreum` object into the desired cluster resources of one tier.
Synthesis is pure: the same object and realm always yield the same resources with the same content
hashes, so the controller can tell whether a live object is up to date by comparing hashes alone.

!*/

mod app;
mod common;
mod database;
mod keycloak;

use crate::constants::ANNOTATION_CONTENT_HASH;
use crate::error::{self, Result};
use crate::route::Route;
use crate::secret::{generated_secret, SecretRef};
use crate::{Horreum, Tier};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, EnvVar, Secret, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::Serialize;
use serde_plain::derive_display_from_serialize;
use sha2::{Digest, Sha256};
use snafu::ResultExt;
use std::fmt::{Display, Formatter};

/// The kinds of resources the controller manages. The declaration order is the apply order inside
/// a tier.
#[derive(Serialize, Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ResourceKind {
    Secret,
    ConfigMap,
    Service,
    Deployment,
    Route,
}

derive_display_from_serialize!(ResourceKind);

/// The identity of a resource in the cluster.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ResourceId {
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
}

impl Display for ResourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} '{}/{}'", self.kind, self.namespace, self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DesiredObject {
    Secret(Secret),
    ConfigMap(ConfigMap),
    Service(Service),
    Workload(Deployment),
    Route(Route),
}

impl DesiredObject {
    pub fn kind(&self) -> ResourceKind {
        match self {
            DesiredObject::Secret(_) => ResourceKind::Secret,
            DesiredObject::ConfigMap(_) => ResourceKind::ConfigMap,
            DesiredObject::Service(_) => ResourceKind::Service,
            DesiredObject::Workload(_) => ResourceKind::Deployment,
            DesiredObject::Route(_) => ResourceKind::Route,
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            DesiredObject::Secret(o) => &o.metadata,
            DesiredObject::ConfigMap(o) => &o.metadata,
            DesiredObject::Service(o) => &o.metadata,
            DesiredObject::Workload(o) => &o.metadata,
            DesiredObject::Route(o) => &o.metadata,
        }
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        match self {
            DesiredObject::Secret(o) => &mut o.metadata,
            DesiredObject::ConfigMap(o) => &mut o.metadata,
            DesiredObject::Service(o) => &mut o.metadata,
            DesiredObject::Workload(o) => &mut o.metadata,
            DesiredObject::Route(o) => &mut o.metadata,
        }
    }

    fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        match self {
            DesiredObject::Secret(o) => serde_json::to_vec(o),
            DesiredObject::ConfigMap(o) => serde_json::to_vec(o),
            DesiredObject::Service(o) => serde_json::to_vec(o),
            DesiredObject::Workload(o) => serde_json::to_vec(o),
            DesiredObject::Route(o) => serde_json::to_vec(o),
        }
    }
}

/// One resource the controller wants to exist, with the hash of its content.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredResource {
    pub id: ResourceId,
    pub tier: Tier,
    /// Hex SHA-256 of the object before the hash annotation was added to it.
    pub hash: String,
    pub object: DesiredObject,
}

impl DesiredResource {
    /// Hashes `object` and records the hash in its `hyperfoil.io/content-hash` annotation.
    pub fn new(tier: Tier, mut object: DesiredObject) -> Result<Self> {
        let meta = object.metadata();
        let id = ResourceId {
            kind: object.kind(),
            namespace: meta.namespace.clone().unwrap_or_default(),
            name: meta.name.clone().unwrap_or_default(),
        };
        let json = object.to_json().context(error::HashSnafu {
            kind: id.kind.to_string(),
            name: id.name.clone(),
        })?;
        let hash = hex::encode(Sha256::digest(&json));
        object
            .metadata_mut()
            .annotations
            .get_or_insert_with(Default::default)
            .insert(ANNOTATION_CONTENT_HASH.to_string(), hash.clone());
        Ok(Self {
            id,
            tier,
            hash,
            object,
        })
    }

    /// The secret for a generated credential. It is only ever created, never updated, so a
    /// secret that already exists keeps its value.
    pub fn generated_secret(
        reference: &SecretRef,
        horreum: &Horreum,
        password: &str,
    ) -> Result<Self> {
        Self::new(
            reference.role.owner(),
            DesiredObject::Secret(generated_secret(reference, horreum, password)),
        )
    }
}

/// What synthesis needs besides the `Horreum` object itself.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisInput<'a> {
    pub horreum: &'a Horreum,
    /// The Keycloak realm document.
    pub realm: &'a str,
}

/// The desired resources of `tier`. Generated secrets are not included, they are provisioned
/// before synthesis.
pub fn synthesize(tier: Tier, input: SynthesisInput<'_>) -> Result<Vec<DesiredResource>> {
    let objects = match tier {
        Tier::Database => database::synthesize(input.horreum),
        Tier::Keycloak => keycloak::synthesize(input.horreum, input.realm)?,
        Tier::App => app::synthesize(input.horreum)?,
    };
    check_invariants(tier, &objects)?;
    objects
        .into_iter()
        .map(|object| DesiredResource::new(tier, object))
        .collect()
}

/// Every workload container needs an image and every environment variable a value or a source
/// naming both a secret and a key.
fn check_invariants(tier: Tier, objects: &[DesiredObject]) -> Result<()> {
    for object in objects {
        let meta = object.metadata();
        if meta.name.as_deref().unwrap_or_default().is_empty() {
            return error::SynthesisInvariantSnafu {
                tier,
                what: format!("a {} has no name", object.kind()),
            }
            .fail();
        }
        if let DesiredObject::Workload(deployment) = object {
            let pod = deployment
                .spec
                .as_ref()
                .and_then(|spec| spec.template.spec.as_ref());
            let containers = pod
                .iter()
                .flat_map(|pod| pod.containers.iter().chain(pod.init_containers.iter().flatten()));
            for container in containers {
                if container.image.as_deref().unwrap_or_default().is_empty() {
                    return error::SynthesisInvariantSnafu {
                        tier,
                        what: format!("container '{}' has no image", container.name),
                    }
                    .fail();
                }
                for env in container.env.iter().flatten() {
                    if let Some(what) = env_problem(env) {
                        return error::SynthesisInvariantSnafu {
                            tier,
                            what: format!("container '{}': {}", container.name, what),
                        }
                        .fail();
                    }
                }
            }
        }
    }
    Ok(())
}

fn env_problem(env: &EnvVar) -> Option<String> {
    match (&env.value, &env.value_from) {
        (Some(_), None) => None,
        (None, Some(source)) => match &source.secret_key_ref {
            Some(selector)
                if selector.key.is_empty()
                    || selector.name.as_deref().unwrap_or_default().is_empty() =>
            {
                Some(format!("'{}' references a secret without name or key", env.name))
            }
            _ => None,
        },
        (None, None) => Some(format!("'{}' has neither a value nor a source", env.name)),
        (Some(_), Some(_)) => Some(format!("'{}' has both a value and a source", env.name)),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::horreum;
    use k8s_openapi::api::core::v1::{EnvVarSource, SecretKeySelector};

    const REALM: &str = r#"{"realm": "horreum"}"#;

    fn input(h: &Horreum) -> SynthesisInput<'_> {
        SynthesisInput {
            horreum: h,
            realm: REALM,
        }
    }

    #[test]
    fn synthesis_is_idempotent() {
        let h = horreum("perf", "hr");
        for tier in Tier::ALL {
            let first = synthesize(tier, input(&h)).unwrap();
            let second = synthesize(tier, input(&h)).unwrap();
            assert!(!first.is_empty());
            assert_eq!(first, second);
        }
    }

    #[test]
    fn hash_is_annotated() {
        let h = horreum("perf", "hr");
        for resource in synthesize(Tier::Database, input(&h)).unwrap() {
            let annotations = resource.object.metadata().annotations.clone().unwrap();
            assert_eq!(
                annotations.get(ANNOTATION_CONTENT_HASH),
                Some(&resource.hash)
            );
            assert_eq!(resource.hash.len(), 64);
            assert_eq!(resource.id.namespace, "hr");
        }
    }

    #[test]
    fn identities_are_unique() {
        let h = horreum("perf", "hr");
        let mut ids: Vec<_> = Tier::ALL
            .iter()
            .flat_map(|tier| synthesize(*tier, input(&h)).unwrap())
            .map(|resource| resource.id)
            .collect();
        let count = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), count);
    }

    #[test]
    fn env_without_source_is_rejected() {
        assert!(env_problem(&EnvVar {
            name: "A".to_string(),
            ..Default::default()
        })
        .is_some());
        assert!(env_problem(&EnvVar {
            name: "A".to_string(),
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    name: Some("s".to_string()),
                    key: String::new(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        })
        .is_some());
    }
}

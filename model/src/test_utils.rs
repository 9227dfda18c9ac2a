use crate::synth::DesiredObject;
use crate::{Horreum, HorreumSpec, Route};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Container, EnvVar, Service};
use std::collections::BTreeMap;

/// A `Horreum` object as the API server returns it, with a uid.
pub(crate) fn horreum(name: &str, namespace: &str) -> Horreum {
    let mut horreum = Horreum::new(name, HorreumSpec::default());
    horreum.metadata.namespace = Some(namespace.to_string());
    horreum.metadata.uid = Some(format!("{}-uid", name));
    horreum
}

pub(crate) fn workload(objects: &[DesiredObject]) -> &Deployment {
    objects
        .iter()
        .find_map(|o| match o {
            DesiredObject::Workload(d) => Some(d),
            _ => None,
        })
        .unwrap()
}

pub(crate) fn service_of(objects: &[DesiredObject]) -> Service {
    objects
        .iter()
        .find_map(|o| match o {
            DesiredObject::Service(s) => Some(s.clone()),
            _ => None,
        })
        .unwrap()
}

pub(crate) fn route_of(objects: &[DesiredObject]) -> Route {
    objects
        .iter()
        .find_map(|o| match o {
            DesiredObject::Route(r) => Some(r.clone()),
            _ => None,
        })
        .unwrap()
}

pub(crate) fn config_map_data(objects: &[DesiredObject], name: &str) -> BTreeMap<String, String> {
    objects
        .iter()
        .find_map(|o| match o {
            DesiredObject::ConfigMap(c) if c.metadata.name.as_deref() == Some(name) => {
                c.data.clone()
            }
            _ => None,
        })
        .unwrap()
}

pub(crate) fn env_of(container: &Container, name: &str) -> EnvVar {
    container
        .env
        .iter()
        .flatten()
        .find(|e| e.name == name)
        .cloned()
        .unwrap_or_else(|| panic!("no {} in {}", name, container.name))
}

pub(crate) fn env_value(container: &Container, name: &str) -> String {
    env_of(container, name).value.unwrap()
}

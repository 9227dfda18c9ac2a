/*!

An in-memory [`Cluster`] and a few helpers to run convergence cycles without Kubernetes.

!*/

pub(crate) mod cluster;

use horreum_controller::converge::{Converger, CycleReport, ReadySettings};
use horreum_model::{DesiredObject, Horreum, HorreumSpec, HorreumStatus, StaticRealm};
use k8s_openapi::api::core::v1::{Container, PodSpec};
use std::time::Duration;

pub(crate) use cluster::FakeCluster;

/// A `Horreum` as the API server returns it, with a namespace, uid and generation.
pub(crate) fn horreum(name: &str, namespace: &str) -> Horreum {
    let mut horreum = Horreum::new(name, HorreumSpec::default());
    horreum.metadata.namespace = Some(namespace.to_string());
    horreum.metadata.uid = Some(format!("{}-uid", name));
    horreum.metadata.generation = Some(1);
    horreum
}

/// Short waits so that readiness timeouts do not slow the tests down.
pub(crate) fn ready_settings() -> ReadySettings {
    ReadySettings {
        timeout: Duration::from_millis(50),
        poll_interval: Duration::from_millis(10),
    }
}

/// Run one cycle and store its status in `horreum`, as the reconcile loop does.
pub(crate) async fn cycle(cluster: &FakeCluster, horreum: &mut Horreum) -> CycleReport {
    let realm = StaticRealm::builtin();
    let report = Converger::new(cluster, &realm, ready_settings())
        .converge(horreum)
        .await;
    let status: HorreumStatus = report.status(horreum);
    horreum.status = Some(status);
    report
}

pub(crate) fn pod(object: Option<DesiredObject>) -> PodSpec {
    match object {
        Some(DesiredObject::Workload(deployment)) => deployment
            .spec
            .and_then(|spec| spec.template.spec)
            .unwrap(),
        other => panic!("expected a workload, got {:?}", other),
    }
}

pub(crate) fn env_value(container: &Container, name: &str) -> Option<String> {
    container
        .env
        .iter()
        .flatten()
        .find(|env| env.name == name)
        .and_then(|env| env.value.clone())
}

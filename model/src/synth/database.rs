use super::common::{
    container_port, credential_env, deployment, env, mount, run_as, service, service_port,
};
use super::DesiredObject;
use crate::constants::{POSTGRES_DATA_PATH, POSTGRES_PORT};
use crate::naming::image;
use crate::secret::{resolve, CredentialRole};
use crate::{Horreum, ServiceType, Tier};
use k8s_openapi::api::core::v1::{
    Container, EmptyDirVolumeSource, ExecAction, PersistentVolumeClaimVolumeSource, PodSpec,
    Probe, Volume,
};
use std::collections::BTreeMap;

/// The in-cluster PostgreSQL instance. Nothing is deployed for an external database.
pub(super) fn synthesize(horreum: &Horreum) -> Vec<DesiredObject> {
    if horreum.has_external_database() {
        return vec![];
    }
    let admin = resolve(CredentialRole::DbAdmin, horreum);
    let mut vars = credential_env("POSTGRES_USER", "POSTGRES_PASSWORD", &admin).to_vec();
    vars.push(env("PGDATA", format!("{}/pgdata", POSTGRES_DATA_PATH)));

    let data = match horreum.spec.database.persistent_volume_claim.as_deref() {
        Some(claim) if !claim.is_empty() => Volume {
            name: "data".to_string(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: claim.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        },
        _ => Volume {
            name: "data".to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        },
    };

    let pod = PodSpec {
        containers: vec![Container {
            name: "postgres".to_string(),
            image: Some(image(Tier::Database, horreum)),
            env: Some(vars),
            ports: Some(vec![container_port("postgres", POSTGRES_PORT)]),
            readiness_probe: Some(Probe {
                exec: Some(ExecAction {
                    command: Some(vec![
                        "sh".to_string(),
                        "-c".to_string(),
                        r#"pg_isready -U "$POSTGRES_USER""#.to_string(),
                    ]),
                }),
                initial_delay_seconds: Some(5),
                period_seconds: Some(5),
                ..Default::default()
            }),
            volume_mounts: Some(vec![mount("data", POSTGRES_DATA_PATH, None)]),
            security_context: run_as(horreum.spec.database.run_as_user),
            ..Default::default()
        }],
        volumes: Some(vec![data]),
        ..Default::default()
    };

    vec![
        DesiredObject::Service(service(
            Tier::Database,
            horreum,
            ServiceType::ClusterIP,
            service_port("postgres", POSTGRES_PORT, POSTGRES_PORT),
            BTreeMap::new(),
        )),
        DesiredObject::Workload(deployment(Tier::Database, horreum, pod)),
    ]
}

use crate::naming::{
    canonical_name, database_host, database_port, host, image, owned_meta, owner_labels,
    route_name, selector_labels, service_name,
};
use crate::route::{OpenShiftRouteSpec, Route, RoutePort, RouteTarget, RouteTls};
use crate::secret::{resolve, CredentialRole, SecretRef};
use crate::topology::{ResolvedTopology, RouteType};
use crate::{Horreum, ServiceType, Tier};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, DeploymentStrategy};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, ContainerPort, EnvVar, EnvVarSource, PodSpec,
    PodTemplateSpec, Probe, SecretKeySelector, SecretVolumeSource, SecurityContext, Service,
    ServicePort, ServiceSpec, TCPSocketAction, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

pub(super) fn env<S: Into<String>>(name: &str, value: S) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.into()),
        ..Default::default()
    }
}

/// An environment variable read from `key` of the referenced secret. A missing key leaves the
/// selector empty, which the invariant check rejects.
pub(super) fn secret_env(name: &str, reference: &SecretRef, key: Option<&str>) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: Some(reference.name.clone()),
                key: key.unwrap_or_default().to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// The username and password of `reference` as the variables `username` and `password`.
pub(super) fn credential_env(
    username: &str,
    password: &str,
    reference: &SecretRef,
) -> [EnvVar; 2] {
    [
        secret_env(username, reference, reference.username_key()),
        secret_env(password, reference, reference.password_key()),
    ]
}

pub(super) fn config_map(
    name: &str,
    horreum: &Horreum,
    data: Option<BTreeMap<String, String>>,
    annotations: Option<BTreeMap<String, String>>,
) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            annotations,
            ..owned_meta(name, horreum)
        },
        data,
        ..Default::default()
    }
}

/// The service of `tier` exposing one port named after its scheme or component.
pub(super) fn service(
    tier: Tier,
    horreum: &Horreum,
    service_type: ServiceType,
    port: ServicePort,
    annotations: BTreeMap<String, String>,
) -> Service {
    Service {
        metadata: ObjectMeta {
            annotations: (!annotations.is_empty()).then(|| annotations),
            ..owned_meta(&service_name(tier, horreum), horreum)
        },
        spec: Some(ServiceSpec {
            type_: Some(service_type.to_string()),
            ports: Some(vec![port]),
            selector: Some(selector_labels(tier, horreum)),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub(super) fn service_port(name: &str, port: i32, target_port: i32) -> ServicePort {
    ServicePort {
        name: Some(name.to_string()),
        port,
        target_port: Some(IntOrString::Int(target_port)),
        ..Default::default()
    }
}

/// The route of `tier`, `None` when the tier is not routed.
pub(super) fn route(tier: Tier, horreum: &Horreum, topology: &ResolvedTopology) -> Option<Route> {
    let termination = topology.route_type.termination()?;
    Some(Route::with_meta(
        owned_meta(&route_name(tier, horreum), horreum),
        OpenShiftRouteSpec {
            host: Some(host(tier, horreum)),
            to: RouteTarget {
                kind: "Service".to_string(),
                name: service_name(tier, horreum),
            },
            port: Some(RoutePort {
                target_port: topology.scheme.as_str().to_string(),
            }),
            tls: Some(RouteTls {
                termination: termination.to_string(),
                insecure_edge_termination_policy: (topology.route_type == RouteType::Edge)
                    .then(|| "Redirect".to_string()),
            }),
        },
    ))
}

/// A single replica deployment of `tier`, replaced rather than rolled on update.
pub(super) fn deployment(tier: Tier, horreum: &Horreum, pod: PodSpec) -> Deployment {
    let mut pod_labels = owner_labels(horreum);
    pod_labels.extend(selector_labels(tier, horreum));
    Deployment {
        metadata: owned_meta(&canonical_name(tier, horreum), horreum),
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(selector_labels(tier, horreum)),
                ..Default::default()
            },
            strategy: Some(DeploymentStrategy {
                type_: Some("Recreate".to_string()),
                ..Default::default()
            }),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(pod_labels),
                    ..Default::default()
                }),
                spec: Some(pod),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub(super) fn container_port(name: &str, port: i32) -> ContainerPort {
    ContainerPort {
        name: Some(name.to_string()),
        container_port: port,
        ..Default::default()
    }
}

pub(super) fn tcp_readiness(port: i32) -> Probe {
    Probe {
        tcp_socket: Some(TCPSocketAction {
            port: IntOrString::Int(port),
            ..Default::default()
        }),
        initial_delay_seconds: Some(5),
        period_seconds: Some(10),
        ..Default::default()
    }
}

pub(super) fn run_as(user: Option<i64>) -> Option<SecurityContext> {
    user.map(|user| SecurityContext {
        run_as_user: Some(user),
        ..Default::default()
    })
}

pub(super) fn secret_volume(name: &str, secret: &str) -> Volume {
    Volume {
        name: name.to_string(),
        secret: Some(SecretVolumeSource {
            secret_name: Some(secret.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub(super) fn config_map_volume(
    name: &str,
    config_map: &str,
    default_mode: Option<i32>,
    optional: bool,
) -> Volume {
    Volume {
        name: name.to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: Some(config_map.to_string()),
            default_mode,
            optional: optional.then(|| true),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub(super) fn mount(name: &str, path: &str, sub_path: Option<&str>) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: path.to_string(),
        sub_path: sub_path.map(str::to_string),
        ..Default::default()
    }
}

/// The volume and mount of the serving certificate, when the pod uses one.
pub(super) fn cert_volume(topology: &ResolvedTopology) -> Option<(Volume, VolumeMount)> {
    topology
        .mounted_cert()
        .map(|(secret, path)| (secret_volume("certs", secret), mount("certs", path, None)))
}

/// `psql` connection settings of the database administrator.
fn database_admin_env(horreum: &Horreum) -> Vec<EnvVar> {
    let admin = resolve(CredentialRole::DbAdmin, horreum);
    let [user, password] = credential_env("PGUSER", "PGPASSWORD", &admin);
    vec![
        env("PGHOST", database_host(horreum)),
        env("PGPORT", database_port(horreum).to_string()),
        user,
        password,
    ]
}

/// An init step creating the role of `user` and the database `database` owned by it, skipping
/// whatever already exists.
pub(super) fn init_db_container(horreum: &Horreum, user: &SecretRef, database: &str) -> Container {
    let script = format!(
        r#"psql -c "SELECT 1;" || exit 1
if psql -t -c "SELECT 1 FROM pg_roles WHERE rolname = '$(DB_USER)';" | grep -q 1; then
  echo "Database role $(DB_USER) already exists."
else
  psql -c "CREATE ROLE $(DB_USER) noinherit login password '$(DB_PASSWORD)';"
fi
if psql -t -c "SELECT 1 FROM pg_database WHERE datname = '{db}';" | grep -q 1; then
  echo "Database {db} already exists."
else
  psql -c "CREATE DATABASE {db} WITH OWNER = $(DB_USER);"
fi
"#,
        db = database
    );
    let mut env = database_admin_env(horreum);
    env.extend(credential_env("DB_USER", "DB_PASSWORD", user));
    Container {
        name: "init-db".to_string(),
        image: Some(image(Tier::Database, horreum)),
        command: Some(vec![
            "bash".to_string(),
            "-x".to_string(),
            "-c".to_string(),
            script,
        ]),
        env: Some(env),
        security_context: run_as(horreum.spec.database.run_as_user),
        ..Default::default()
    }
}

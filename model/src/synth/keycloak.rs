use super::common::{
    cert_volume, config_map, config_map_volume, container_port, credential_env, deployment, env,
    init_db_container, mount, route, secret_env, service, service_port, tcp_readiness,
};
use super::DesiredObject;
use crate::constants::{ANNOTATION_SERVING_CERT, KEYCLOAK_IMPORT_PATH, REALM_FILE};
use crate::error::Result;
use crate::naming::{
    database_host, database_name, database_port, host, image, jdbc_url, realm_config_map_name,
};
use crate::secret::{resolve, CredentialRole};
use crate::topology::{self, ResolvedTopology, RouteType, Scheme};
use crate::{Horreum, Tier};
use k8s_openapi::api::core::v1::{Container, EnvVar, PodSpec};
use maplit::btreemap;
use std::collections::BTreeMap;

pub(super) fn synthesize(horreum: &Horreum, realm: &str) -> Result<Vec<DesiredObject>> {
    let topology = topology::resolve(Tier::Keycloak, horreum)?;
    let realm_map = realm_config_map_name(horreum);
    let vars = keycloak_env(horreum, &topology);

    let mut volumes = vec![config_map_volume("realm", &realm_map, None, false)];
    let mut mounts = vec![mount("realm", KEYCLOAK_IMPORT_PATH, None)];
    if let Some((volume, cert_mount)) = cert_volume(&topology) {
        volumes.push(volume);
        mounts.push(cert_mount);
    }

    let mut init_containers = Vec::new();
    if !horreum.has_external_database() {
        init_containers.push(init_db_container(
            horreum,
            &resolve(CredentialRole::KeycloakDbUser, horreum),
            &database_name(Tier::Keycloak, horreum),
        ));
    }
    init_containers.push(Container {
        name: "init".to_string(),
        image: Some(image(Tier::Keycloak, horreum)),
        args: Some(vec!["build".to_string()]),
        env: Some(vars.clone()),
        volume_mounts: Some(mounts.clone()),
        ..Default::default()
    });

    let scheme = topology.scheme.as_str();
    let pod = PodSpec {
        termination_grace_period_seconds: Some(0),
        init_containers: Some(init_containers),
        containers: vec![Container {
            name: "keycloak".to_string(),
            image: Some(image(Tier::Keycloak, horreum)),
            args: Some(
                ["start", "--optimized", "--import-realm"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            ),
            env: Some(vars),
            ports: Some(vec![container_port(scheme, topology.container_port())]),
            readiness_probe: Some(tcp_readiness(topology.container_port())),
            volume_mounts: Some(mounts),
            ..Default::default()
        }],
        volumes: Some(volumes),
        ..Default::default()
    };

    let annotations: BTreeMap<String, String> = topology
        .serving_cert_secret()
        .map(|secret| btreemap! { ANNOTATION_SERVING_CERT.to_string() => secret.to_string() })
        .unwrap_or_default();

    let mut objects = vec![
        DesiredObject::ConfigMap(config_map(
            &realm_map,
            horreum,
            Some(btreemap! { REALM_FILE.to_string() => realm.to_string() }),
            None,
        )),
        DesiredObject::Service(service(
            Tier::Keycloak,
            horreum,
            horreum.spec.keycloak.service_type,
            service_port(scheme, topology.service_port(), topology.container_port()),
            annotations,
        )),
        DesiredObject::Workload(deployment(Tier::Keycloak, horreum, pod)),
    ];
    objects.extend(route(Tier::Keycloak, horreum, &topology).map(DesiredObject::Route));
    Ok(objects)
}

/// Keycloak serving TLS itself always runs in `passthrough` proxy mode, whether or not the router
/// re-encrypts.
fn proxy_mode(topology: &ResolvedTopology) -> &'static str {
    match (topology.scheme, topology.route_type) {
        (Scheme::Https, _) => "passthrough",
        (Scheme::Http, RouteType::Edge) => "edge",
        (Scheme::Http, _) => "none",
    }
}

/// The environment shared by the Keycloak build step and server.
fn keycloak_env(horreum: &Horreum, topology: &ResolvedTopology) -> Vec<EnvVar> {
    let admin = resolve(CredentialRole::KeycloakAdmin, horreum);
    let db_user = resolve(CredentialRole::KeycloakDbUser, horreum);
    let client = resolve(CredentialRole::AppOidcClient, horreum);
    let database = database_name(Tier::Keycloak, horreum);

    let mut vars = credential_env("KEYCLOAK_ADMIN", "KEYCLOAK_ADMIN_PASSWORD", &admin).to_vec();
    vars.extend([
        env("DB_ADDR", database_host(horreum)),
        env("DB_PORT", database_port(horreum).to_string()),
        env("DB_DATABASE", database.clone()),
        env("KC_DB", "postgres"),
        env("KC_DB_URL", jdbc_url(horreum, &database)),
    ]);
    vars.extend(credential_env("KC_DB_USERNAME", "KC_DB_PASSWORD", &db_user));
    vars.extend([
        env("KC_HOSTNAME", host(Tier::Keycloak, horreum)),
        env("KC_PROXY", proxy_mode(topology)),
    ]);
    match (topology.scheme, topology.cert_file(), topology.key_file()) {
        (Scheme::Https, Some(cert), Some(key)) => vars.extend([
            env("KC_HTTP_ENABLED", "false"),
            env("KC_HTTPS_PORT", topology.container_port().to_string()),
            env("KC_HTTPS_CERTIFICATE_FILE", cert),
            env("KC_HTTPS_CERTIFICATE_KEY_FILE", key),
        ]),
        _ => vars.extend([
            env("KC_HTTP_ENABLED", "true"),
            env("KC_HTTP_PORT", topology.container_port().to_string()),
        ]),
    }
    vars.push(secret_env(
        "HORREUM_CLIENT_SECRET",
        &client,
        client.value_key(),
    ));
    vars
}

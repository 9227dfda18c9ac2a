use super::common::{
    cert_volume, config_map, config_map_volume, container_port, credential_env, deployment, env,
    init_db_container, mount, route, run_as, secret_env, service, service_port, tcp_readiness,
};
use super::DesiredObject;
use crate::constants::{
    ANNOTATION_INJECT_CA_BUNDLE, ANNOTATION_PUBLIC_URL, ANNOTATION_SERVING_CERT, APP_IMPORTS_PATH,
    APP_INIT_PATH, APP_INIT_SCRIPT, REALM, SERVICE_CA_FILE, SERVICE_CA_PATH,
};
use crate::error::Result;
use crate::naming::{
    app_init_config_map_name, database_name, image, jdbc_url, service_ca_config_map_name,
};
use crate::secret::{migration_role, resolve, CredentialRole};
use crate::topology::{self, internal_url, public_url, ResolvedTopology};
use crate::{Horreum, Tier};
use k8s_openapi::api::core::v1::{Container, EmptyDirVolumeSource, EnvVar, PodSpec, Volume};
use maplit::btreemap;

/// Imports the cluster CA into the JVM trust store when Keycloak uses a cluster issued
/// certificate, then runs the image's setup script until Keycloak accepts it.
const APP_INIT: &str = r#"if [ -n "$CA_CERT_ARG" ]; then
  echo 'Injecting service-ca certificate ...'
  keytool -noprompt -import -alias service-ca -file /etc/ssl/certs/service-ca.crt -cacerts -storepass changeit
fi
until sh -x /deployments/k8s-setup.sh
do
  echo 'Re-trying init ...'
  sleep 10
done
"#;

/// URLs the application is wired with.
struct Urls {
    keycloak_internal: String,
    keycloak_public: String,
    app_internal: String,
    app_public: String,
}

pub(super) fn synthesize(horreum: &Horreum) -> Result<Vec<DesiredObject>> {
    let topology = topology::resolve(Tier::App, horreum)?;
    let keycloak = topology::resolve(Tier::Keycloak, horreum)?;
    let urls = Urls {
        keycloak_internal: internal_url(Tier::Keycloak, horreum, &keycloak),
        keycloak_public: public_url(Tier::Keycloak, horreum, &keycloak),
        app_internal: internal_url(Tier::App, horreum, &topology),
        app_public: public_url(Tier::App, horreum, &topology),
    };
    let init_map = app_init_config_map_name(horreum);
    let ca_map = service_ca_config_map_name(horreum);

    let mut volumes = vec![
        config_map_volume("app-init", &init_map, Some(0o555), false),
        config_map_volume("service-ca", &ca_map, None, true),
        Volume {
            name: "imports".to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        },
    ];
    let mut mounts = vec![
        mount("imports", APP_IMPORTS_PATH, None),
        mount("service-ca", SERVICE_CA_PATH, Some(SERVICE_CA_FILE)),
    ];
    if let Some((volume, cert_mount)) = cert_volume(&topology) {
        volumes.push(volume);
        mounts.push(cert_mount);
    }

    let mut init_containers = Vec::new();
    if !horreum.has_external_database() {
        init_containers.push(init_db_container(
            horreum,
            &resolve(CredentialRole::DbAppUser, horreum),
            &database_name(Tier::App, horreum),
        ));
    }
    init_containers.push(Container {
        name: "init".to_string(),
        image: Some(image(Tier::App, horreum)),
        command: Some(
            ["sh", "-x", "-c", APP_INIT_PATH]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        ),
        env: Some(init_env(horreum, &keycloak, &urls)),
        volume_mounts: Some(vec![
            mount("app-init", APP_INIT_PATH, Some(APP_INIT_SCRIPT)),
            mount("imports", APP_IMPORTS_PATH, None),
            mount("service-ca", SERVICE_CA_PATH, Some(SERVICE_CA_FILE)),
        ]),
        security_context: run_as(horreum.spec.app.run_as_user),
        ..Default::default()
    });

    let scheme = topology.scheme.as_str();
    let pod = PodSpec {
        termination_grace_period_seconds: Some(0),
        init_containers: Some(init_containers),
        containers: vec![Container {
            name: "horreum".to_string(),
            image: Some(image(Tier::App, horreum)),
            env: Some(main_env(horreum, &topology, &urls)),
            ports: Some(vec![container_port(scheme, topology.container_port())]),
            readiness_probe: Some(tcp_readiness(topology.container_port())),
            volume_mounts: Some(mounts),
            ..Default::default()
        }],
        volumes: Some(volumes),
        ..Default::default()
    };

    let mut annotations = btreemap! {
        ANNOTATION_PUBLIC_URL.to_string() => urls.app_public.clone(),
    };
    if let Some(secret) = topology.serving_cert_secret() {
        annotations.insert(ANNOTATION_SERVING_CERT.to_string(), secret.to_string());
    }

    let mut objects = vec![
        DesiredObject::ConfigMap(config_map(
            &init_map,
            horreum,
            Some(btreemap! { APP_INIT_SCRIPT.to_string() => APP_INIT.to_string() }),
            None,
        )),
        DesiredObject::ConfigMap(config_map(
            &ca_map,
            horreum,
            None,
            Some(btreemap! { ANNOTATION_INJECT_CA_BUNDLE.to_string() => "true".to_string() }),
        )),
        DesiredObject::Service(service(
            Tier::App,
            horreum,
            horreum.spec.app.service_type,
            service_port(scheme, topology.service_port(), topology.container_port()),
            annotations,
        )),
        DesiredObject::Workload(deployment(Tier::App, horreum, pod)),
    ];
    objects.extend(route(Tier::App, horreum, &topology).map(DesiredObject::Route));
    Ok(objects)
}

/// The environment of the setup step. Trusting Keycloak follows Keycloak's topology, not the
/// application's.
fn init_env(horreum: &Horreum, keycloak: &ResolvedTopology, urls: &Urls) -> Vec<EnvVar> {
    let keycloak_admin = resolve(CredentialRole::KeycloakAdmin, horreum);
    let app_admin = resolve(CredentialRole::AppAdmin, horreum);
    let client = resolve(CredentialRole::AppOidcClient, horreum);

    let mut vars = credential_env("KEYCLOAK_USER", "KEYCLOAK_PASSWORD", &keycloak_admin).to_vec();
    vars.extend(credential_env("ADMIN_USERNAME", "ADMIN_PASSWORD", &app_admin));
    vars.extend([
        env("KC_URL", urls.keycloak_internal.clone()),
        env("CA_CERT_ARG", keycloak.ca_cert_arg.clone().unwrap_or_default()),
        env("APP_URL", urls.app_public.clone()),
        secret_env(
            "QUARKUS_OIDC_CREDENTIALS_SECRET",
            &client,
            client.value_key(),
        ),
    ]);
    vars
}

fn main_env(horreum: &Horreum, topology: &ResolvedTopology, urls: &Urls) -> Vec<EnvVar> {
    let user = resolve(CredentialRole::DbAppUser, horreum);
    let migration = resolve(migration_role(horreum), horreum);
    let db_secret = resolve(CredentialRole::AppDbSecret, horreum);
    let client = resolve(CredentialRole::AppOidcClient, horreum);
    let jdbc = jdbc_url(horreum, &database_name(Tier::App, horreum));

    let mut vars = vec![env("QUARKUS_DATASOURCE_JDBC_URL", jdbc.clone())];
    vars.extend(credential_env(
        "QUARKUS_DATASOURCE_USERNAME",
        "QUARKUS_DATASOURCE_PASSWORD",
        &user,
    ));
    vars.push(env("QUARKUS_DATASOURCE_MIGRATION_JDBC_URL", jdbc));
    vars.extend(credential_env(
        "QUARKUS_DATASOURCE_MIGRATION_USERNAME",
        "QUARKUS_DATASOURCE_MIGRATION_PASSWORD",
        &migration,
    ));
    vars.extend([
        secret_env("HORREUM_DB_SECRET", &db_secret, db_secret.value_key()),
        env(
            "QUARKUS_OIDC_AUTH_SERVER_URL",
            format!("{}/realms/{}", urls.keycloak_internal, REALM),
        ),
        env(
            "QUARKUS_OIDC_TOKEN_ISSUER",
            format!("{}/realms/{}", urls.keycloak_public, REALM),
        ),
        // Quarkus cannot be given a custom CA for OIDC.
        env("QUARKUS_OIDC_TLS_VERIFICATION", "none"),
        secret_env(
            "QUARKUS_OIDC_CREDENTIALS_SECRET",
            &client,
            client.value_key(),
        ),
        env("HORREUM_URL", urls.app_public.clone()),
        env("HORREUM_INTERNAL_URL", urls.app_internal.clone()),
        env("HORREUM_KEYCLOAK_URL", format!("{}/", urls.keycloak_public)),
    ]);
    if let Some(java_options) = horreum.java_options() {
        vars.push(env("JAVA_OPTIONS", java_options));
    }
    if let (Some(cert), Some(key)) = (topology.cert_file(), topology.key_file()) {
        vars.extend([
            env("QUARKUS_HTTP_SSL_CERTIFICATE_FILE", cert),
            env("QUARKUS_HTTP_SSL_CERTIFICATE_KEY_FILE", key),
        ]);
    }
    vars
}

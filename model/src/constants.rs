/// Helper macro to avoid retyping the API group of the operator when creating further string
/// constants from it. When given no parameters, this returns the API group. When given a string
/// literal parameter it adds `/parameter` to the end.
macro_rules! hyperfoil {
    () => {
        "hyperfoil.io"
    };
    ($s:literal) => {
        concat!(hyperfoil!(), "/", $s)
    };
}

// System identifiers
pub const API_GROUP: &str = hyperfoil!();
pub const API_VERSION: &str = hyperfoil!("v1alpha1");
pub const OPERATOR: &str = "horreum-operator";
pub const FIELD_MANAGER: &str = "horreum-operator";
pub const PART_OF: &str = "horreum";

// Label keys
pub const LABEL_APP: &str = "app";
pub const LABEL_SERVICE: &str = "service";

// Standard tags https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
pub const APP_INSTANCE: &str = "app.kubernetes.io/instance";
pub const APP_PART_OF: &str = "app.kubernetes.io/part-of";
pub const APP_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

// Annotation keys
pub const ANNOTATION_CONTENT_HASH: &str = hyperfoil!("content-hash");
pub const ANNOTATION_PUBLIC_URL: &str = hyperfoil!("public-url");
pub const ANNOTATION_JAVA_OPTIONS: &str = "java-options";
pub const ANNOTATION_SERVING_CERT: &str = "service.beta.openshift.io/serving-cert-secret-name";
pub const ANNOTATION_INJECT_CA_BUNDLE: &str = "service.beta.openshift.io/inject-cabundle";

// Finalizers
pub const FINALIZER_MAIN: &str = hyperfoil!("owned-resources");

// Secret keys. These are part of the contract with the deployed images and must not change.
pub const SECRET_USERNAME_KEY: &str = "username";
pub const SECRET_PASSWORD_KEY: &str = "password";
pub const SECRET_VALUE_KEY: &str = "secret";

// Ports
pub const POSTGRES_PORT: i32 = 5432;
pub const HTTP_PORT: i32 = 8080;
pub const HTTPS_PORT: i32 = 8443;
pub const HTTP_SERVICE_PORT: i32 = 80;
pub const HTTPS_SERVICE_PORT: i32 = 443;

// Default images
pub const DEFAULT_POSTGRES_IMAGE: &str = "docker.io/postgres:16";
pub const DEFAULT_KEYCLOAK_IMAGE: &str = "quay.io/keycloak/keycloak:latest";
pub const DEFAULT_APP_IMAGE: &str = "quay.io/hyperfoil/horreum:latest";

// Defaults
pub const DEFAULT_APPS_DOMAIN: &str = "apps.cluster.local";
pub const DEFAULT_KEYCLOAK_DB_NAME: &str = "keycloak";
pub const DEFAULT_APP_DB_NAME: &str = "horreum";
pub const REALM: &str = "horreum";

// Config map keys
pub const REALM_FILE: &str = "keycloak-horreum.json";
pub const APP_INIT_SCRIPT: &str = "app_init.sh";
pub const SERVICE_CA_FILE: &str = "service-ca.crt";

// Paths
pub const KEYCLOAK_CERTS_PATH: &str = "/etc/x509/https";
pub const KEYCLOAK_IMPORT_PATH: &str = "/opt/keycloak/data/import";
pub const APP_CERTS_PATH: &str = "/opt/certs";
pub const APP_IMPORTS_PATH: &str = "/etc/horreum/imports";
pub const APP_INIT_PATH: &str = "/deployments/app_init.sh";
pub const SERVICE_CA_PATH: &str = "/etc/ssl/certs/service-ca.crt";
pub const POSTGRES_DATA_PATH: &str = "/var/lib/postgresql/data";
pub const TLS_CERT_FILE: &str = "tls.crt";
pub const TLS_KEY_FILE: &str = "tls.key";

#[test]
fn hyperfoil_constants_macro_test() {
    assert_eq!("hyperfoil.io", hyperfoil!());
    assert_eq!("hyperfoil.io/v1alpha1", API_VERSION);
    assert_eq!("hyperfoil.io/content-hash", ANNOTATION_CONTENT_HASH);
}

/*!

Resolution of the routing spec of a public facing tier into the facts the synthesizers need: the
scheme and ports the pod listens on, where its certificate comes from, whether a route exists and
what callers need to trust it.

| type                  | scheme | certificate                              | CA flag |
|-----------------------|--------|------------------------------------------|---------|
| `none`                | http   | none                                     | no      |
| `edge`                | http   | cluster issued, annotated on the service | no      |
| `passthrough`         | https  | the `tls` secret mounted into the pod    | no      |
| `reencrypt` or `""`   | https  | cluster issued, mounted into the pod     | yes     |

!*/

use crate::constants::{
    APP_CERTS_PATH, HTTPS_PORT, HTTPS_SERVICE_PORT, HTTP_PORT, HTTP_SERVICE_PORT,
    KEYCLOAK_CERTS_PATH, SERVICE_CA_PATH, TLS_CERT_FILE, TLS_KEY_FILE,
};
use crate::error::{self, Result};
use crate::naming::{host, internal_host, routing};
use crate::secret::certificate_secret_name;
use crate::{Horreum, Tier};
use snafu::OptionExt;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RouteType {
    None,
    Edge,
    Passthrough,
    Reencrypt,
}

impl RouteType {
    /// Parse the `type` of a routing spec. The empty string means `reencrypt`.
    pub fn parse(tier: Tier, value: &str) -> Result<Self> {
        match value {
            "none" => Ok(RouteType::None),
            "edge" => Ok(RouteType::Edge),
            "passthrough" => Ok(RouteType::Passthrough),
            "reencrypt" | "" => Ok(RouteType::Reencrypt),
            other => error::UnknownRouteTypeSnafu {
                tier,
                route_type: other,
            }
            .fail(),
        }
    }

    /// The TLS termination of the route, `None` when there is no route.
    pub fn termination(self) -> Option<&'static str> {
        match self {
            RouteType::None => None,
            RouteType::Edge => Some("edge"),
            RouteType::Passthrough => Some("passthrough"),
            RouteType::Reencrypt => Some("reencrypt"),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    /// Port the container listens on.
    pub fn container_port(self) -> i32 {
        match self {
            Scheme::Http => HTTP_PORT,
            Scheme::Https => HTTPS_PORT,
        }
    }

    /// Port the service exposes.
    pub fn service_port(self) -> i32 {
        match self {
            Scheme::Http => HTTP_SERVICE_PORT,
            Scheme::Https => HTTPS_SERVICE_PORT,
        }
    }
}

/// Where the serving certificate of a tier comes from.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum CertPlan {
    None,
    /// The cluster issues a certificate into `secret` for the service but the pod does not use it.
    ServiceOnly { secret: String },
    /// The cluster issues a certificate into `secret` which the pod mounts at `path`.
    ClusterIssued { secret: String, path: &'static str },
    /// A certificate supplied by the user in `secret`, mounted at `path`.
    External { secret: String, path: &'static str },
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ResolvedTopology {
    pub route_type: RouteType,
    pub scheme: Scheme,
    pub certificate: CertPlan,
    /// Arguments for callers that must trust the cluster issued certificate.
    pub ca_cert_arg: Option<String>,
}

impl ResolvedTopology {
    /// The internal topology of a tier that is never exposed.
    fn internal() -> Self {
        Self {
            route_type: RouteType::None,
            scheme: Scheme::Http,
            certificate: CertPlan::None,
            ca_cert_arg: None,
        }
    }

    pub fn has_route(&self) -> bool {
        self.route_type != RouteType::None
    }

    pub fn container_port(&self) -> i32 {
        self.scheme.container_port()
    }

    pub fn service_port(&self) -> i32 {
        self.scheme.service_port()
    }

    /// The secret the service asks the cluster to issue a certificate into.
    pub fn serving_cert_secret(&self) -> Option<&str> {
        match &self.certificate {
            CertPlan::ServiceOnly { secret } | CertPlan::ClusterIssued { secret, .. } => {
                Some(secret)
            }
            CertPlan::None | CertPlan::External { .. } => None,
        }
    }

    /// The secret and path of the certificate mounted into the pod.
    pub fn mounted_cert(&self) -> Option<(&str, &'static str)> {
        match &self.certificate {
            CertPlan::ClusterIssued { secret, path } | CertPlan::External { secret, path } => {
                Some((secret, *path))
            }
            CertPlan::None | CertPlan::ServiceOnly { .. } => None,
        }
    }

    pub fn cert_file(&self) -> Option<String> {
        self.mounted_cert()
            .map(|(_, path)| format!("{}/{}", path, TLS_CERT_FILE))
    }

    pub fn key_file(&self) -> Option<String> {
        self.mounted_cert()
            .map(|(_, path)| format!("{}/{}", path, TLS_KEY_FILE))
    }
}

/// Resolve the routing spec of `tier`. `passthrough` without a `tls` secret is an error rather
/// than silently using a cluster issued certificate.
pub fn resolve(tier: Tier, horreum: &Horreum) -> Result<ResolvedTopology> {
    let (route, cert_dir, issued) = match (
        routing(tier, horreum),
        cert_path(tier),
        certificate_secret_name(tier, horreum),
    ) {
        (Some(route), Some(dir), Some(issued)) => (route, dir, issued),
        _ => return Ok(ResolvedTopology::internal()),
    };
    let route_type = RouteType::parse(tier, &route.route_type)?;
    let topology = match route_type {
        RouteType::None => ResolvedTopology::internal(),
        RouteType::Edge => ResolvedTopology {
            route_type,
            scheme: Scheme::Http,
            certificate: CertPlan::ServiceOnly { secret: issued },
            ca_cert_arg: None,
        },
        RouteType::Passthrough => {
            let secret = route
                .tls
                .as_deref()
                .filter(|tls| !tls.is_empty())
                .context(error::PassthroughWithoutTlsSnafu { tier })?;
            ResolvedTopology {
                route_type,
                scheme: Scheme::Https,
                certificate: CertPlan::External {
                    secret: secret.to_owned(),
                    path: cert_dir,
                },
                ca_cert_arg: None,
            }
        }
        RouteType::Reencrypt => ResolvedTopology {
            route_type,
            scheme: Scheme::Https,
            certificate: CertPlan::ClusterIssued {
                secret: issued,
                path: cert_dir,
            },
            ca_cert_arg: Some(format!("--cacert {}", SERVICE_CA_PATH)),
        },
    };
    Ok(topology)
}

/// `<scheme>://<service>.<namespace>.svc`, the URL other tiers call.
pub fn internal_url(tier: Tier, horreum: &Horreum, topology: &ResolvedTopology) -> String {
    format!(
        "{}://{}",
        topology.scheme.as_str(),
        internal_host(tier, horreum)
    )
}

/// The URL users reach the tier at. Routes always terminate TLS, a tier without a route is only
/// reachable inside the cluster.
pub fn public_url(tier: Tier, horreum: &Horreum, topology: &ResolvedTopology) -> String {
    if topology.has_route() {
        format!("https://{}", host(tier, horreum))
    } else {
        internal_url(tier, horreum, topology)
    }
}

fn cert_path(tier: Tier) -> Option<&'static str> {
    match tier {
        Tier::Database => None,
        Tier::Keycloak => Some(KEYCLOAK_CERTS_PATH),
        Tier::App => Some(APP_CERTS_PATH),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::horreum;
    use crate::Error;

    fn with_app_route(route_type: &str, tls: Option<&str>) -> Horreum {
        let mut h = horreum("perf", "hr");
        h.spec.app.route.route_type = route_type.to_owned();
        h.spec.app.route.tls = tls.map(str::to_owned);
        h
    }

    #[test]
    fn topology_table() {
        let cases = [
            ("none", Scheme::Http, None, None, false),
            ("edge", Scheme::Http, Some("perf-app-certs"), None, false),
            ("passthrough", Scheme::Https, None, Some("user-tls"), false),
            (
                "reencrypt",
                Scheme::Https,
                Some("perf-app-certs"),
                Some("perf-app-certs"),
                true,
            ),
            (
                "",
                Scheme::Https,
                Some("perf-app-certs"),
                Some("perf-app-certs"),
                true,
            ),
        ];
        for (route_type, scheme, serving, mounted, ca) in cases {
            let topology = resolve(Tier::App, &with_app_route(route_type, Some("user-tls")))
                .unwrap_or_else(|e| panic!("'{}' failed: {}", route_type, e));
            assert_eq!(topology.scheme, scheme, "{}", route_type);
            assert_eq!(topology.serving_cert_secret(), serving, "{}", route_type);
            assert_eq!(
                topology.mounted_cert().map(|(secret, _)| secret),
                mounted,
                "{}",
                route_type
            );
            assert_eq!(topology.ca_cert_arg.is_some(), ca, "{}", route_type);
            assert_eq!(topology.has_route(), route_type != "none");
        }
    }

    #[test]
    fn reencrypt_ports_and_files() {
        let topology = resolve(Tier::Keycloak, &horreum("perf", "hr")).unwrap();
        assert_eq!(topology.container_port(), 8443);
        assert_eq!(topology.service_port(), 443);
        assert_eq!(topology.cert_file().unwrap(), "/etc/x509/https/tls.crt");
        assert_eq!(topology.key_file().unwrap(), "/etc/x509/https/tls.key");
        assert_eq!(
            topology.ca_cert_arg.as_deref(),
            Some("--cacert /etc/ssl/certs/service-ca.crt")
        );
        assert_eq!(topology.route_type.termination(), Some("reencrypt"));
    }

    #[test]
    fn passthrough_requires_tls() {
        for tls in [None, Some("")] {
            let err = resolve(Tier::App, &with_app_route("passthrough", tls)).unwrap_err();
            assert!(matches!(err, Error::PassthroughWithoutTls { tier: Tier::App }));
            assert!(err.is_configuration_error());
        }
    }

    #[test]
    fn unknown_route_type() {
        let err = resolve(Tier::App, &with_app_route("mystery", None)).unwrap_err();
        assert!(err.is_configuration_error());
        assert!(err.to_string().contains("mystery"));
    }

    #[test]
    fn urls_follow_route() {
        let mut h = with_app_route("edge", None);
        let topology = resolve(Tier::App, &h).unwrap();
        assert_eq!(internal_url(Tier::App, &h, &topology), "http://perf.hr.svc");
        assert_eq!(
            public_url(Tier::App, &h, &topology),
            "https://perf-hr.apps.cluster.local"
        );
        h.spec.app.route.route_type = "none".to_owned();
        let topology = resolve(Tier::App, &h).unwrap();
        assert_eq!(public_url(Tier::App, &h, &topology), "http://perf.hr.svc");
    }

    #[test]
    fn database_is_internal() {
        let topology = resolve(Tier::Database, &horreum("perf", "hr")).unwrap();
        assert!(!topology.has_route());
        assert_eq!(topology.scheme, Scheme::Http);
    }
}

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The subset of the OpenShift `route.openshift.io/v1` `Route` used to expose the public tiers.
/// The `CustomResource` derive also produces a struct named `Route`.
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "route.openshift.io",
    kind = "Route",
    namespaced,
    version = "v1"
)]
#[serde(rename_all = "camelCase")]
pub struct OpenShiftRouteSpec {
    pub host: Option<String>,
    pub to: RouteTarget,
    pub port: Option<RoutePort>,
    pub tls: Option<RouteTls>,
}

#[derive(Serialize, Deserialize, Debug, Default, Eq, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteTarget {
    pub kind: String,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Default, Eq, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoutePort {
    /// Name of the service port.
    pub target_port: String,
}

#[derive(Serialize, Deserialize, Debug, Default, Eq, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteTls {
    pub termination: String,
    pub insecure_edge_termination_policy: Option<String>,
}

impl Route {
    pub fn with_meta(metadata: ObjectMeta, spec: OpenShiftRouteSpec) -> Self {
        Self {
            metadata,
            spec,
        }
    }
}

use super::error::{self, ClusterError, ClusterResult};
use super::http_status_code::HttpStatusCode;
use super::{Cluster, LiveObject, Readiness};
use async_trait::async_trait;
use horreum_model::constants::{ANNOTATION_CONTENT_HASH, FIELD_MANAGER};
use horreum_model::{DesiredObject, DesiredResource, ResourceId, ResourceKind, Route};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Endpoints, Secret, Service};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client, Resource};
use log::trace;
use serde::de::DeserializeOwned;
use serde::Serialize;
use snafu::ResultExt;
use std::fmt::Debug;

/// The kinds removed when a `Horreum` is deleted, most dependent first.
const OWNED_KINDS: [ResourceKind; 5] = [
    ResourceKind::Route,
    ResourceKind::Deployment,
    ResourceKind::Service,
    ResourceKind::ConfigMap,
    ResourceKind::Secret,
];

/// A `Cluster` backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn deployment_readiness(&self, id: &ResourceId) -> ClusterResult<Readiness> {
        let deployment = match self
            .api::<Deployment>(&id.namespace)
            .get_opt(&id.name)
            .await
            .context(error::ApiSnafu {
                id: id.clone(),
                action: "get",
            })? {
            Some(deployment) => deployment,
            None => return Ok(Readiness::NotReady("it does not exist".to_string())),
        };
        let wanted = deployment
            .spec
            .as_ref()
            .and_then(|spec| spec.replicas)
            .unwrap_or(1);
        let status = deployment.status.unwrap_or_default();
        if status.observed_generation < deployment.metadata.generation {
            return Ok(Readiness::NotReady(
                "its latest generation is not observed yet".to_string(),
            ));
        }
        let updated = status.updated_replicas.unwrap_or_default();
        let available = status.available_replicas.unwrap_or_default();
        if updated >= wanted && available >= wanted {
            Ok(Readiness::Ready)
        } else {
            Ok(Readiness::NotReady(format!(
                "{}/{} replicas are available",
                available, wanted
            )))
        }
    }

    async fn service_readiness(&self, id: &ResourceId) -> ClusterResult<Readiness> {
        let endpoints = self
            .api::<Endpoints>(&id.namespace)
            .get_opt(&id.name)
            .await
            .context(error::ApiSnafu {
                id: id.clone(),
                action: "get endpoints of",
            })?;
        let ready = endpoints
            .and_then(|endpoints| endpoints.subsets)
            .unwrap_or_default()
            .iter()
            .any(|subset| {
                subset
                    .addresses
                    .as_ref()
                    .map(|addresses| !addresses.is_empty())
                    .unwrap_or(false)
            });
        if ready {
            Ok(Readiness::Ready)
        } else {
            Ok(Readiness::NotReady("it has no ready endpoints".to_string()))
        }
    }
}

#[async_trait]
impl Cluster for KubeCluster {
    async fn get(&self, id: &ResourceId) -> ClusterResult<Option<LiveObject>> {
        let ns = id.namespace.as_str();
        match id.kind {
            ResourceKind::Secret => get_live(self.api::<Secret>(ns), id).await,
            ResourceKind::ConfigMap => get_live(self.api::<ConfigMap>(ns), id).await,
            ResourceKind::Service => get_live(self.api::<Service>(ns), id).await,
            ResourceKind::Deployment => get_live(self.api::<Deployment>(ns), id).await,
            ResourceKind::Route => get_live(self.api::<Route>(ns), id).await,
        }
    }

    async fn apply(&self, resource: &DesiredResource) -> ClusterResult<()> {
        let ns = resource.id.namespace.as_str();
        let id = &resource.id;
        match &resource.object {
            DesiredObject::Secret(o) => apply_object(self.api(ns), id, o).await,
            DesiredObject::ConfigMap(o) => apply_object(self.api(ns), id, o).await,
            DesiredObject::Service(o) => apply_object(self.api(ns), id, o).await,
            DesiredObject::Workload(o) => apply_object(self.api(ns), id, o).await,
            DesiredObject::Route(o) => apply_object(self.api(ns), id, o).await,
        }
    }

    async fn create(&self, resource: &DesiredResource) -> ClusterResult<()> {
        let ns = resource.id.namespace.as_str();
        let id = &resource.id;
        match &resource.object {
            DesiredObject::Secret(o) => create_object(self.api(ns), id, o).await,
            DesiredObject::ConfigMap(o) => create_object(self.api(ns), id, o).await,
            DesiredObject::Service(o) => create_object(self.api(ns), id, o).await,
            DesiredObject::Workload(o) => create_object(self.api(ns), id, o).await,
            DesiredObject::Route(o) => create_object(self.api(ns), id, o).await,
        }
    }

    async fn readiness(&self, id: &ResourceId) -> ClusterResult<Readiness> {
        match id.kind {
            ResourceKind::Deployment => self.deployment_readiness(id).await,
            ResourceKind::Service => self.service_readiness(id).await,
            _ => Ok(match self.get(id).await? {
                Some(_) => Readiness::Ready,
                None => Readiness::NotReady("it does not exist".to_string()),
            }),
        }
    }

    async fn delete_owned(&self, namespace: &str, selector: &str) -> ClusterResult<()> {
        for kind in OWNED_KINDS {
            trace!(
                "Deleting {} objects matching '{}' in '{}'",
                kind,
                selector,
                namespace
            );
            let result = match kind {
                ResourceKind::Route => {
                    delete_matching(self.api::<Route>(namespace), selector).await
                }
                ResourceKind::Deployment => {
                    delete_matching(self.api::<Deployment>(namespace), selector).await
                }
                ResourceKind::Service => {
                    delete_matching(self.api::<Service>(namespace), selector).await
                }
                ResourceKind::ConfigMap => {
                    delete_matching(self.api::<ConfigMap>(namespace), selector).await
                }
                ResourceKind::Secret => {
                    delete_matching(self.api::<Secret>(namespace), selector).await
                }
            };
            match result {
                // Clusters without OpenShift routes have nothing to delete.
                Err(e) if e.is_not_found() => {}
                other => other.context(error::DeleteOwnedSnafu {
                    kind,
                    namespace,
                    selector,
                })?,
            }
        }
        Ok(())
    }
}

async fn get_live<K>(api: Api<K>, id: &ResourceId) -> ClusterResult<Option<LiveObject>>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    let object = api.get_opt(&id.name).await.context(error::ApiSnafu {
        id: id.clone(),
        action: "get",
    })?;
    Ok(object.map(|object| LiveObject {
        content_hash: object
            .meta()
            .annotations
            .as_ref()
            .and_then(|annotations| annotations.get(ANNOTATION_CONTENT_HASH))
            .cloned(),
    }))
}

async fn apply_object<K>(api: Api<K>, id: &ResourceId, object: &K) -> ClusterResult<()>
where
    K: Resource + Clone + DeserializeOwned + Serialize + Debug,
{
    let params = PatchParams::apply(FIELD_MANAGER).force();
    let _ = api
        .patch(&id.name, &params, &Patch::Apply(object))
        .await
        .context(error::ApiSnafu {
            id: id.clone(),
            action: "apply",
        })?;
    Ok(())
}

async fn create_object<K>(api: Api<K>, id: &ResourceId, object: &K) -> ClusterResult<()>
where
    K: Resource + Clone + DeserializeOwned + Serialize + Debug,
{
    let _ = api
        .create(&PostParams::default(), object)
        .await
        .map_err(|e| ClusterError::create(id, e))?;
    Ok(())
}

async fn delete_matching<K>(api: Api<K>, selector: &str) -> Result<(), kube::Error>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    let _ = api
        .delete_collection(
            &DeleteParams::background(),
            &ListParams::default().labels(selector),
        )
        .await?;
    Ok(())
}

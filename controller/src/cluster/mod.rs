/*!

The `Cluster` trait is everything the convergence loop needs from Kubernetes. `KubeCluster`
implements it with a `kube::Client`, tests implement it in memory.

!*/

mod error;
mod http_status_code;
mod kube_cluster;

pub use error::{ClusterError, ClusterResult};
pub use http_status_code::{HttpStatusCode, StatusCode};
pub use kube_cluster::KubeCluster;

use async_trait::async_trait;
use horreum_model::{DesiredResource, ResourceId};

/// What the convergence loop needs to know about an object that exists in the cluster.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct LiveObject {
    /// The `hyperfoil.io/content-hash` annotation, `None` for objects we did not write.
    pub content_hash: Option<String>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Readiness {
    Ready,
    /// Not ready yet, with a description of what is missing, like `it has no ready endpoints`.
    NotReady(String),
}

#[async_trait]
pub trait Cluster: Send + Sync {
    /// Get the object identified by `id`, `None` if it does not exist.
    async fn get(&self, id: &ResourceId) -> ClusterResult<Option<LiveObject>>;

    /// Create or update the object with server-side apply. Fields we do not own are left alone.
    async fn apply(&self, resource: &DesiredResource) -> ClusterResult<()>;

    /// Create the object. Fails with `ClusterError::AlreadyExists` when an object of the same name
    /// exists, which is never overwritten.
    async fn create(&self, resource: &DesiredResource) -> ClusterResult<()>;

    /// Deployments are ready when their replicas are available, services when they have ready
    /// endpoints. Anything else is ready as soon as it exists.
    async fn readiness(&self, id: &ResourceId) -> ClusterResult<Readiness>;

    /// Delete every object of a managed kind that matches the label `selector`.
    async fn delete_owned(&self, namespace: &str, selector: &str) -> ClusterResult<()>;
}

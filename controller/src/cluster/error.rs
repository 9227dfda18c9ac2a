use super::http_status_code::HttpStatusCode;
use horreum_model::{ResourceId, ResourceKind};
use snafu::Snafu;

pub type ClusterResult<T> = std::result::Result<T, ClusterError>;

/// Errors talking to the cluster. Everything except `AlreadyExists` is transient from the point of
/// view of the convergence loop.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ClusterError {
    #[snafu(display("{} already exists: {}", id, source))]
    AlreadyExists { id: ResourceId, source: kube::Error },

    #[snafu(display("Unable to {} {}: {}", action, id, source))]
    Api {
        id: ResourceId,
        action: String,
        source: kube::Error,
    },

    #[snafu(display(
        "Unable to delete {} objects matching '{}' in namespace '{}': {}",
        kind,
        selector,
        namespace,
        source
    ))]
    DeleteOwned {
        kind: ResourceKind,
        namespace: String,
        selector: String,
        source: kube::Error,
    },
}

impl ClusterError {
    /// Check if the error is a 409 (`conflict`, which happens when the object already exists),
    /// otherwise return an `Api` error for the create.
    pub fn create(id: &ResourceId, e: kube::Error) -> Self {
        if e.is_conflict() {
            ClusterError::AlreadyExists {
                id: id.clone(),
                source: e,
            }
        } else {
            ClusterError::Api {
                id: id.clone(),
                action: "create".to_string(),
                source: e,
            }
        }
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, ClusterError::AlreadyExists { .. })
    }
}

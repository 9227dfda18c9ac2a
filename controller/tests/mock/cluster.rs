use async_trait::async_trait;
use horreum_controller::cluster::{Cluster, ClusterError, ClusterResult, LiveObject, Readiness};
use horreum_model::constants::ANNOTATION_CONTENT_HASH;
use horreum_model::{DesiredObject, DesiredResource, ResourceId, ResourceKind};
use kube::error::ErrorResponse;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

/// An in-memory cluster. Every object exists as soon as it is applied, and deployments and services
/// are ready unless told otherwise.
#[derive(Default)]
pub(crate) struct FakeCluster {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<ResourceId, DesiredResource>,
    /// Every successful apply and create, in order.
    writes: Vec<ResourceId>,
    never_ready: BTreeSet<String>,
    failing_applies: BTreeSet<String>,
}

fn api_error(code: u16, message: &str) -> kube::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: message.to_string(),
        reason: "Mock".to_string(),
        code,
    })
}

impl FakeCluster {
    /// Deployments and services named `name` never become ready.
    pub(crate) fn never_ready(&self, name: &str) {
        self.state.lock().unwrap().never_ready.insert(name.to_string());
    }

    /// The next apply of an object named `name` fails with a server error.
    pub(crate) fn fail_next_apply(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_applies
            .insert(name.to_string());
    }

    /// Put an object into the cluster without recording a write, as if a user had created it.
    pub(crate) fn insert(&self, resource: DesiredResource) {
        self.state
            .lock()
            .unwrap()
            .objects
            .insert(resource.id.clone(), resource);
    }

    pub(crate) fn writes(&self) -> Vec<ResourceId> {
        self.state.lock().unwrap().writes.clone()
    }

    pub(crate) fn object(&self, kind: ResourceKind, name: &str) -> Option<DesiredObject> {
        self.state
            .lock()
            .unwrap()
            .objects
            .iter()
            .find(|(id, _)| id.kind == kind && id.name == name)
            .map(|(_, resource)| resource.object.clone())
    }

    pub(crate) fn names(&self, kind: ResourceKind) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .objects
            .keys()
            .filter(|id| id.kind == kind)
            .map(|id| id.name.clone())
            .collect()
    }
}

#[async_trait]
impl Cluster for FakeCluster {
    async fn get(&self, id: &ResourceId) -> ClusterResult<Option<LiveObject>> {
        let live = self.state.lock().unwrap().objects.get(id).map(|resource| LiveObject {
            content_hash: resource
                .object
                .metadata()
                .annotations
                .as_ref()
                .and_then(|annotations| annotations.get(ANNOTATION_CONTENT_HASH))
                .cloned(),
        });
        // Let other cycles run between reading and acting on what was read.
        tokio::task::yield_now().await;
        Ok(live)
    }

    async fn apply(&self, resource: &DesiredResource) -> ClusterResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.failing_applies.remove(&resource.id.name) {
            return Err(ClusterError::Api {
                id: resource.id.clone(),
                action: "apply".to_string(),
                source: api_error(500, "etcd is unavailable"),
            });
        }
        state.objects.insert(resource.id.clone(), resource.clone());
        state.writes.push(resource.id.clone());
        Ok(())
    }

    async fn create(&self, resource: &DesiredResource) -> ClusterResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.objects.contains_key(&resource.id) {
            return Err(ClusterError::create(
                &resource.id,
                api_error(409, "already exists"),
            ));
        }
        state.objects.insert(resource.id.clone(), resource.clone());
        state.writes.push(resource.id.clone());
        Ok(())
    }

    async fn readiness(&self, id: &ResourceId) -> ClusterResult<Readiness> {
        let state = self.state.lock().unwrap();
        if !state.objects.contains_key(id) {
            Ok(Readiness::NotReady("it does not exist".to_string()))
        } else if state.never_ready.contains(&id.name) {
            Ok(Readiness::NotReady("0/1 replicas are available".to_string()))
        } else {
            Ok(Readiness::Ready)
        }
    }

    async fn delete_owned(&self, namespace: &str, selector: &str) -> ClusterResult<()> {
        let wanted: Vec<(&str, &str)> = selector
            .split(',')
            .filter_map(|pair| pair.split_once('='))
            .collect();
        self.state.lock().unwrap().objects.retain(|id, resource| {
            let labels = resource.object.metadata().labels.clone().unwrap_or_default();
            let owned = wanted
                .iter()
                .all(|(key, value)| labels.get(*key).map(String::as_str) == Some(*value));
            id.namespace != namespace || !owned
        });
        Ok(())
    }
}

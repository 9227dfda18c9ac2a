use crate::action::StatusWrites;
use crate::cluster::Cluster;
use crate::converge::{Converger, CycleReport, ReadySettings};
use crate::error::Result;
use anyhow::Context as AnyhowContext;
use horreum_model::constants::FINALIZER_MAIN;
use horreum_model::naming::owned_selector;
use horreum_model::{CrdExt, Horreum, HorreumStatus, RealmSource};
use kube::api::{Patch, PatchParams};
use kube::{Api, Client};
use log::trace;
use serde_json::{json, Value};
use std::sync::Arc;

/// This is used by `kube-runtime` to pass any custom information we need when `reconcile` is
/// called.
pub(crate) struct Context {
    client: Client,
    cluster: Arc<dyn Cluster>,
    realm: Arc<dyn RealmSource>,
    ready: ReadySettings,
    status_writes: StatusWrites,
}

impl Context {
    pub(crate) fn new(
        client: Client,
        cluster: Arc<dyn Cluster>,
        realm: Arc<dyn RealmSource>,
        ready: ReadySettings,
    ) -> Self {
        Self {
            client,
            cluster,
            realm,
            ready,
            status_writes: StatusWrites::default(),
        }
    }
}

/// The `reconcile` function has `Horreum` and `Context` as its inputs. For convenience, we
/// combine these and provide accessor and helper functions.
pub(crate) struct HorreumInterface {
    /// The cached `Horreum` object.
    horreum: Arc<Horreum>,
    context: Arc<Context>,
}

impl HorreumInterface {
    pub(crate) fn new(horreum: Arc<Horreum>, context: Arc<Context>) -> Self {
        Self { horreum, context }
    }

    pub(crate) fn horreum(&self) -> &Horreum {
        &self.horreum
    }

    pub(crate) fn name(&self) -> &str {
        self.horreum.object_name()
    }

    /// Whether this reconcile was triggered by our own last status write.
    pub(crate) async fn is_own_status_write(&self) -> bool {
        self.context
            .status_writes
            .is_own_write(&self.horreum)
            .await
    }

    fn api(&self) -> Api<Horreum> {
        Api::namespaced(
            self.context.client.clone(),
            self.horreum.namespace_or_empty(),
        )
    }

    /// Give a new `Horreum` an empty status, unless someone else did so first.
    pub(crate) async fn initialize_status(&self) -> Result<()> {
        trace!("initializing status for '{}'", self.name());
        let patch = json_patch(json!([
            { "op": "test", "path": "/status", "value": Value::Null },
            { "op": "add", "path": "/status", "value": HorreumStatus::default() },
        ]))?;
        let _ = self
            .api()
            .patch_status(self.name(), &PatchParams::default(), &Patch::<()>::Json(patch))
            .await
            .with_context(|| format!("Unable to initialize status of '{}'", self.name()))?;
        Ok(())
    }

    /// Add the main finalizer. The patch fails if the finalizers changed since we read them.
    pub(crate) async fn add_main_finalizer(&self) -> Result<()> {
        trace!("adding finalizer {} for '{}'", FINALIZER_MAIN, self.name());
        let patch = if self.horreum.has_finalizers() {
            json!([
                { "op": "test", "path": "/metadata/finalizers", "value": self.horreum.metadata.finalizers },
                { "op": "add", "path": "/metadata/finalizers/-", "value": FINALIZER_MAIN },
            ])
        } else {
            json!([
                { "op": "test", "path": "/metadata/finalizers", "value": Value::Null },
                { "op": "add", "path": "/metadata/finalizers", "value": [FINALIZER_MAIN] },
            ])
        };
        let _ = self
            .api()
            .patch(
                self.name(),
                &PatchParams::default(),
                &Patch::<()>::Json(json_patch(patch)?),
            )
            .await
            .with_context(|| format!("Unable to add main finalizer to '{}'", self.name()))?;
        Ok(())
    }

    pub(crate) async fn remove_main_finalizer(&self) -> Result<()> {
        trace!("removing finalizer {} for '{}'", FINALIZER_MAIN, self.name());
        let index = self
            .horreum
            .finalizer_position(FINALIZER_MAIN)
            .with_context(|| format!("'{}' does not have the main finalizer", self.name()))?;
        let path = format!("/metadata/finalizers/{}", index);
        let patch = json_patch(json!([
            { "op": "test", "path": path, "value": FINALIZER_MAIN },
            { "op": "remove", "path": path },
        ]))?;
        let _ = self
            .api()
            .patch(self.name(), &PatchParams::default(), &Patch::<()>::Json(patch))
            .await
            .with_context(|| format!("Unable to remove main finalizer from '{}'", self.name()))?;
        Ok(())
    }

    /// Write `status` and remember the resulting resource version, so the watch event it causes
    /// can be told apart from other triggers.
    pub(crate) async fn set_status(&self, status: &HorreumStatus) -> Result<()> {
        let patch = json!({ "status": status });
        let written = self
            .api()
            .patch_status(self.name(), &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .with_context(|| format!("Unable to set status of '{}'", self.name()))?;
        self.context.status_writes.record(&written).await;
        Ok(())
    }

    /// Run one convergence cycle.
    pub(crate) async fn converge(&self) -> CycleReport {
        let context = &self.context;
        Converger::new(context.cluster.as_ref(), context.realm.as_ref(), context.ready)
            .converge(&self.horreum)
            .await
    }

    /// Delete everything carrying the ownership labels of this `Horreum`.
    pub(crate) async fn delete_owned(&self) -> Result<()> {
        let selector = owned_selector(&self.horreum);
        self.context
            .cluster
            .delete_owned(self.horreum.namespace_or_empty(), &selector)
            .await
            .with_context(|| format!("Unable to delete resources owned by '{}'", self.name()))
    }
}

fn json_patch(value: Value) -> Result<json_patch::Patch> {
    serde_json::from_value(value).context("Unable to build JSON patch")
}

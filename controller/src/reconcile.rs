use crate::action::{determine_action, Action};
use crate::cluster::KubeCluster;
use crate::config::Args;
use crate::constants::{delay, no_requeue, requeue, requeue_after};
use crate::context::{Context, HorreumInterface};
use crate::error::{ReconciliationError, ReconciliationResult, Result};
use chrono::Utc;
use futures::StreamExt;
use horreum_model::constants::{APP_MANAGED_BY, OPERATOR};
use horreum_model::Horreum;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service};
use k8s_openapi::NamespaceResourceScope;
use kube::runtime::controller::Action as RequeueAction;
use kube::runtime::{controller, watcher, Controller};
use kube::{Api, Client, Resource};
use log::{debug, error, info, trace};
use std::sync::Arc;

/// Watch `Horreum` objects and the resources they own, and converge each of them until the
/// process is stopped.
pub async fn run_controller(client: Client, args: &Args) -> Result<()> {
    let realm = args.realm()?;
    let context = Arc::new(Context::new(
        client.clone(),
        Arc::new(KubeCluster::new(client.clone())),
        Arc::new(realm),
        args.ready_settings(),
    ));
    let namespace = args.watch_namespace.as_deref();
    let owned = watcher::Config::default().labels(&format!("{}={}", APP_MANAGED_BY, OPERATOR));
    match namespace {
        Some(namespace) => info!("Watching namespace '{}'", namespace),
        None => info!("Watching all namespaces"),
    }

    Controller::new(api::<Horreum>(&client, namespace), watcher::Config::default())
        .owns(api::<Deployment>(&client, namespace), owned.clone())
        .owns(api::<Service>(&client, namespace), owned.clone())
        .owns(api::<ConfigMap>(&client, namespace), owned.clone())
        .owns(api::<Secret>(&client, namespace), owned)
        .run(reconcile, handle_reconciliation_error, context)
        .for_each(|reconciliation_result| async move {
            if let Err(reconciliation_err) = reconciliation_result {
                match &reconciliation_err {
                    controller::Error::ObjectNotFound { .. } => {
                        debug!("Object is gone: {}", reconciliation_err)
                    }
                    _ => error!("Error during reconciliation: {}", reconciliation_err),
                }
            }
        })
        .await;
    Ok(())
}

fn api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope>,
    <K as Resource>::DynamicType: Default,
{
    match namespace {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    }
}

/// `reconcile` is called when a `Horreum` or something it owns changes, or when a `Horreum` has
/// been re-queued. This is the entrypoint to the controller logic.
pub(crate) async fn reconcile(
    h: Arc<Horreum>,
    context: Arc<Context>,
) -> ReconciliationResult<RequeueAction> {
    let horreum = HorreumInterface::new(h, context);
    trace!("Reconciling horreum: {}", horreum.name());

    let own_write = horreum.is_own_status_write().await;
    let action = determine_action(horreum.horreum(), own_write, Utc::now());
    trace!("Action: {:?}", action);
    match action {
        Action::Initialize => horreum.initialize_status().await?,
        Action::AddMainFinalizer => horreum.add_main_finalizer().await?,
        Action::Converge => return Ok(converge(&horreum).await?),
        Action::Wait(remaining) => return Ok(requeue_after(remaining)),
        Action::Cleanup => {
            horreum.delete_owned().await?;
            horreum.remove_main_finalizer().await?;
            info!("Deleted resources owned by '{}'", horreum.name());
            return Ok(no_requeue());
        }
        Action::Done => return Ok(no_requeue()),
    }
    Ok(requeue())
}

/// Run a convergence cycle, write its status and plan the next one. A status that only differs in
/// its timestamps is not written, so a cycle that changed nothing does not trigger another one.
async fn converge(horreum: &HorreumInterface) -> Result<RequeueAction> {
    let report = horreum.converge().await;
    let next = delay(report.requeue());
    let mut status = report.status(horreum.horreum());
    status.next_attempt = next
        .and_then(|next| chrono::Duration::from_std(next).ok())
        .map(|next| (Utc::now() + next).to_rfc3339());
    debug!(
        "'{}' is {}, reached {:?}{}",
        horreum.name(),
        status.phase,
        status.reached_tier,
        if status.reason.is_empty() {
            String::new()
        } else {
            format!(": {}", status.reason)
        }
    );
    let unchanged = horreum
        .horreum()
        .status
        .as_ref()
        .map(|current| current.same_state(&status))
        .unwrap_or(false);
    if unchanged {
        trace!("Status of '{}' is unchanged", horreum.name());
    } else {
        horreum.set_status(&status).await?;
    }
    Ok(requeue_after(next))
}

/// `handle_reconciliation_error` is called when `reconcile` returns an error.
pub(crate) fn handle_reconciliation_error(
    _: Arc<Horreum>,
    e: &ReconciliationError,
    _: Arc<Context>,
) -> RequeueAction {
    error!("Reconciliation error: {}", e);
    requeue()
}

use super::report::{ResourceOutcome, TierReport};
use super::Stop;
use crate::cluster::Cluster;
use horreum_model::secret::{generate_password, owned_roles, referenced_roles, resolve};
use horreum_model::{DesiredResource, Horreum, ResourceId, ResourceKind, Tier};
use log::info;

/// Create the generated secrets of the roles `tier` owns and make sure every explicitly named
/// secret the tier reads exists. A generated secret that already exists is never touched, so a
/// create that loses a race keeps the winner's value.
pub(super) async fn provision(
    cluster: &dyn Cluster,
    tier: Tier,
    horreum: &Horreum,
    report: &mut TierReport,
) -> Result<(), Stop> {
    for role in owned_roles(tier, horreum) {
        let reference = resolve(role, horreum);
        if !reference.generated {
            continue;
        }
        let resource = DesiredResource::generated_secret(&reference, horreum, &generate_password())
            .map_err(|e| Stop::Failed(e.to_string()))?;
        let exists = cluster
            .get(&resource.id)
            .await
            .map_err(|e| Stop::Failed(e.to_string()))?
            .is_some();
        let outcome = if exists {
            ResourceOutcome::Unchanged
        } else {
            match cluster.create(&resource).await {
                Ok(()) => {
                    info!("Generated {} credentials in {}", role, resource.id);
                    ResourceOutcome::Created
                }
                Err(e) if e.is_already_exists() => ResourceOutcome::Unchanged,
                Err(e) => {
                    let reason = e.to_string();
                    report.record(resource.id, ResourceOutcome::Failed(reason.clone()));
                    return Err(Stop::Failed(reason));
                }
            }
        };
        report.record(resource.id, outcome);
    }

    for role in referenced_roles(tier, horreum) {
        let reference = resolve(role, horreum);
        if reference.generated {
            continue;
        }
        let id = ResourceId {
            kind: ResourceKind::Secret,
            namespace: horreum.namespace_or_empty().to_string(),
            name: reference.name.clone(),
        };
        let exists = cluster
            .get(&id)
            .await
            .map_err(|e| Stop::Failed(e.to_string()))?
            .is_some();
        if !exists {
            let reason = format!(
                "secret '{}' given for {} does not exist",
                reference.name, role
            );
            report.record(id, ResourceOutcome::Blocked(reason.clone()));
            return Err(Stop::Blocked(reason));
        }
    }
    Ok(())
}

/*!

One convergence cycle brings the cluster closer to what a `Horreum` describes. The tiers are
visited in dependency order and each one walks through
`Pending -> Synthesizing -> Diffing -> Applying -> WaitingReady -> Done`. A tier that ends
`Blocked` or `Failed` stops the cycle: later tiers stay `Pending` and nothing of theirs is applied.
There is no rollback, the next cycle starts over and skips through whatever is already done.

!*/

mod report;
mod secrets;

pub use report::{CycleReport, Requeue, ResourceOutcome, TierReport};

use crate::cluster::{Cluster, Readiness};
use horreum_model::ordering::{gate, sort_for_apply};
use horreum_model::synth::{synthesize, SynthesisInput};
use horreum_model::{
    CrdExt, DesiredResource, Horreum, RealmSource, ResourceId, ResourceKind, Tier, TierPhase,
};
use log::{error, info, trace, warn};
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// How long the convergence loop waits for a tier to become ready.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ReadySettings {
    /// The longest a tier may take to become ready in one cycle.
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ReadySettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(2),
        }
    }
}

/// Why a tier stopped before reaching `Done`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) enum Stop {
    Blocked(String),
    Failed(String),
}

pub struct Converger<'a> {
    cluster: &'a dyn Cluster,
    realm: &'a dyn RealmSource,
    settings: ReadySettings,
}

impl<'a> Converger<'a> {
    pub fn new(
        cluster: &'a dyn Cluster,
        realm: &'a dyn RealmSource,
        settings: ReadySettings,
    ) -> Self {
        Self {
            cluster,
            realm,
            settings,
        }
    }

    /// Run one cycle over all tiers.
    pub async fn converge(&self, horreum: &Horreum) -> CycleReport {
        let mut cycle = CycleReport::new(horreum.consecutive_failures());
        for tier in Tier::ALL {
            if !gate(tier, |earlier| cycle.phase(earlier)) {
                trace!(
                    "'{}' {} tier waits for earlier tiers",
                    horreum.object_name(),
                    tier
                );
                cycle.push(TierReport::new(tier));
                continue;
            }
            let mut report = TierReport::new(tier);
            match self.converge_tier(horreum, &mut report).await {
                Ok(()) => report.enter(TierPhase::Done),
                Err(Stop::Blocked(reason)) => {
                    info!("'{}' {} tier is blocked: {}", horreum.object_name(), tier, reason);
                    report.stop(TierPhase::Blocked, reason)
                }
                Err(Stop::Failed(reason)) => {
                    warn!("'{}' {} tier failed: {}", horreum.object_name(), tier, reason);
                    report.stop(TierPhase::Failed, reason)
                }
            }
            cycle.push(report);
        }
        cycle
    }

    async fn converge_tier(&self, horreum: &Horreum, report: &mut TierReport) -> Result<(), Stop> {
        let tier = report.tier;
        report.enter(TierPhase::Synthesizing);
        // Nothing is written for a tier that cannot be synthesized.
        let mut resources = self.synthesize(tier, horreum)?;
        sort_for_apply(&mut resources);
        secrets::provision(self.cluster, tier, horreum, report).await?;

        report.enter(TierPhase::Diffing);
        let mut changes = Vec::new();
        for resource in resources.iter() {
            let live = self
                .cluster
                .get(&resource.id)
                .await
                .map_err(|e| Stop::Failed(e.to_string()))?;
            match live {
                None => changes.push((resource, ResourceOutcome::Created)),
                Some(live) if live.content_hash.as_deref() == Some(resource.hash.as_str()) => {
                    report.record(resource.id.clone(), ResourceOutcome::Unchanged)
                }
                Some(_) => changes.push((resource, ResourceOutcome::Updated)),
            }
        }

        report.enter(TierPhase::Applying);
        for (resource, outcome) in changes {
            if let Err(e) = self.cluster.apply(resource).await {
                let reason = e.to_string();
                report.record(resource.id.clone(), ResourceOutcome::Failed(reason.clone()));
                return Err(Stop::Failed(reason));
            }
            info!("{} {}", outcome_verb(&outcome), resource.id);
            report.record(resource.id.clone(), outcome);
        }

        report.enter(TierPhase::WaitingReady);
        let waits: Vec<&ResourceId> = resources
            .iter()
            .map(|resource| &resource.id)
            .filter(|id| matches!(id.kind, ResourceKind::Deployment | ResourceKind::Service))
            .collect();
        self.wait_ready(&waits).await
    }

    fn synthesize(&self, tier: Tier, horreum: &Horreum) -> Result<Vec<DesiredResource>, Stop> {
        let realm = match tier {
            Tier::Keycloak => self
                .realm
                .realm()
                .map_err(|e| Stop::Failed(e.to_string()))?,
            _ => String::new(),
        };
        synthesize(
            tier,
            SynthesisInput {
                horreum,
                realm: &realm,
            },
        )
        .map_err(|e| {
            if e.is_configuration_error() {
                Stop::Blocked(e.to_string())
            } else {
                error!(
                    "Unable to synthesize the {} tier of '{}': {}",
                    tier,
                    horreum.object_name(),
                    e
                );
                Stop::Failed(e.to_string())
            }
        })
    }

    /// Poll until every resource in `ids` is ready, giving up when the ready timeout expires.
    async fn wait_ready(&self, ids: &[&ResourceId]) -> Result<(), Stop> {
        let deadline = Instant::now() + self.settings.timeout;
        for id in ids {
            loop {
                let readiness = self
                    .cluster
                    .readiness(id)
                    .await
                    .map_err(|e| Stop::Failed(e.to_string()))?;
                match readiness {
                    Readiness::Ready => break,
                    Readiness::NotReady(reason) if Instant::now() >= deadline => {
                        return Err(Stop::Failed(format!(
                            "{} is not ready after {:?}, {}",
                            id, self.settings.timeout, reason
                        )));
                    }
                    Readiness::NotReady(reason) => {
                        trace!("Waiting for {}, {}", id, reason);
                        sleep(self.settings.poll_interval).await;
                    }
                }
            }
        }
        Ok(())
    }
}

fn outcome_verb(outcome: &ResourceOutcome) -> &'static str {
    match outcome {
        ResourceOutcome::Created => "Created",
        ResourceOutcome::Updated => "Updated",
        _ => "Applied",
    }
}

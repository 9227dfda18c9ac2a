use chrono::Utc;
use horreum_model::topology::{self, public_url};
use horreum_model::{
    Horreum, HorreumStatus, ResourceId, StatusPhase, Tier, TierPhase, TierStatus,
};
use log::trace;

/// What happened to one resource during a convergence cycle.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ResourceOutcome {
    Unchanged,
    Created,
    Updated,
    Blocked(String),
    Failed(String),
}

/// The phase one tier reached in a cycle, and the outcome of each of its resources.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TierReport {
    pub tier: Tier,
    pub phase: TierPhase,
    /// Why the tier is `Blocked` or `Failed`.
    pub reason: Option<String>,
    pub resources: Vec<(ResourceId, ResourceOutcome)>,
}

impl TierReport {
    pub fn new(tier: Tier) -> Self {
        Self {
            tier,
            phase: TierPhase::Pending,
            reason: None,
            resources: Vec::new(),
        }
    }

    pub(crate) fn enter(&mut self, phase: TierPhase) {
        trace!("{} tier: {} -> {}", self.tier, self.phase, phase);
        self.phase = phase;
    }

    pub(crate) fn record(&mut self, id: ResourceId, outcome: ResourceOutcome) {
        trace!("{}: {:?}", id, outcome);
        self.resources.push((id, outcome));
    }

    pub(crate) fn stop(&mut self, phase: TierPhase, reason: String) {
        self.enter(phase);
        self.reason = Some(reason);
    }

    /// The outcome recorded for the resource named `name`, if any.
    pub fn outcome(&self, name: &str) -> Option<&ResourceOutcome> {
        self.resources
            .iter()
            .find(|(id, _)| id.name == name)
            .map(|(_, outcome)| outcome)
    }

    /// Blocked by a missing secret rather than by the `Horreum` spec itself.
    fn waits_for_secret(&self) -> bool {
        self.resources
            .iter()
            .any(|(_, outcome)| matches!(outcome, ResourceOutcome::Blocked(_)))
    }
}

/// When the controller should look at a `Horreum` again after a cycle.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Requeue {
    /// Everything is done.
    Resync,
    /// Only a change of the object can help.
    AwaitChange,
    /// Waiting for something we do not watch.
    Poll,
    /// A tier failed this many cycles in a row.
    Backoff(u32),
}

/// The result of one convergence cycle over all tiers.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct CycleReport {
    pub tiers: Vec<TierReport>,
    /// The number of failed cycles in a row before this one.
    pub previous_failures: u32,
}

impl CycleReport {
    pub(crate) fn new(previous_failures: u32) -> Self {
        Self {
            tiers: Vec::new(),
            previous_failures,
        }
    }

    pub(crate) fn push(&mut self, report: TierReport) {
        self.tiers.push(report);
    }

    pub fn tier(&self, tier: Tier) -> Option<&TierReport> {
        self.tiers.iter().find(|report| report.tier == tier)
    }

    pub fn phase(&self, tier: Tier) -> TierPhase {
        self.tier(tier)
            .map(|report| report.phase)
            .unwrap_or(TierPhase::Pending)
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &(ResourceId, ResourceOutcome)> {
        self.tiers.iter().flat_map(|report| report.resources.iter())
    }

    pub fn count(&self, outcome: &ResourceOutcome) -> usize {
        self.outcomes().filter(|(_, o)| o == outcome).count()
    }

    /// The most advanced tier that is done.
    pub fn reached_tier(&self) -> Option<Tier> {
        Tier::ALL
            .iter()
            .take_while(|tier| self.phase(**tier) == TierPhase::Done)
            .last()
            .copied()
    }

    fn stopped(&self) -> Option<&TierReport> {
        self.tiers
            .iter()
            .find(|report| matches!(report.phase, TierPhase::Blocked | TierPhase::Failed))
    }

    pub fn status_phase(&self) -> StatusPhase {
        match self.stopped().map(|report| report.phase) {
            Some(TierPhase::Failed) => StatusPhase::Failed,
            Some(_) => StatusPhase::Blocked,
            None if self.reached_tier() == Some(Tier::App) => StatusPhase::Ready,
            None => StatusPhase::Pending,
        }
    }

    /// The reason of the tier that stopped the cycle, empty when nothing did.
    pub fn reason(&self) -> String {
        self.stopped()
            .map(|report| {
                format!(
                    "{}: {}",
                    report.tier,
                    report.reason.as_deref().unwrap_or_default()
                )
            })
            .unwrap_or_default()
    }

    pub fn consecutive_failures(&self) -> u32 {
        if self.status_phase() == StatusPhase::Failed {
            self.previous_failures.saturating_add(1)
        } else {
            0
        }
    }

    pub fn requeue(&self) -> Requeue {
        match self.stopped() {
            Some(report) if report.phase == TierPhase::Failed => {
                Requeue::Backoff(self.consecutive_failures())
            }
            Some(report) if report.waits_for_secret() => Requeue::Poll,
            Some(_) => Requeue::AwaitChange,
            None if self.status_phase() == StatusPhase::Ready => Requeue::Resync,
            None => Requeue::Backoff(0),
        }
    }

    /// The status to write back to `horreum`. The caller plans the next attempt.
    pub fn status(&self, horreum: &Horreum) -> HorreumStatus {
        let url = |tier: Tier| {
            topology::resolve(tier, horreum)
                .ok()
                .map(|topology| public_url(tier, horreum, &topology))
        };
        HorreumStatus {
            phase: self.status_phase(),
            reached_tier: self.reached_tier(),
            reason: self.reason(),
            tiers: self
                .tiers
                .iter()
                .map(|report| TierStatus {
                    tier: report.tier,
                    phase: report.phase,
                    reason: report.reason.clone(),
                })
                .collect(),
            public_url: url(Tier::App),
            keycloak_url: url(Tier::Keycloak),
            last_update: Some(Utc::now().to_rfc3339()),
            consecutive_failures: self.consecutive_failures(),
            observed_generation: horreum.metadata.generation,
            next_attempt: None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn report(phases: &[(Tier, TierPhase)]) -> CycleReport {
        let mut cycle = CycleReport::new(2);
        for (tier, phase) in phases {
            let mut tier_report = TierReport::new(*tier);
            tier_report.enter(*phase);
            if !matches!(phase, TierPhase::Done | TierPhase::Pending) {
                tier_report.reason = Some("broken".to_string());
            }
            cycle.push(tier_report);
        }
        cycle
    }

    #[test]
    fn all_done() {
        let cycle = report(&[
            (Tier::Database, TierPhase::Done),
            (Tier::Keycloak, TierPhase::Done),
            (Tier::App, TierPhase::Done),
        ]);
        assert_eq!(cycle.status_phase(), StatusPhase::Ready);
        assert_eq!(cycle.reached_tier(), Some(Tier::App));
        assert_eq!(cycle.reason(), "");
        assert_eq!(cycle.requeue(), Requeue::Resync);
        assert_eq!(cycle.consecutive_failures(), 0);
    }

    #[test]
    fn failure_backs_off() {
        let cycle = report(&[
            (Tier::Database, TierPhase::Done),
            (Tier::Keycloak, TierPhase::Failed),
            (Tier::App, TierPhase::Pending),
        ]);
        assert_eq!(cycle.status_phase(), StatusPhase::Failed);
        assert_eq!(cycle.reached_tier(), Some(Tier::Database));
        assert_eq!(cycle.reason(), "keycloak: broken");
        assert_eq!(cycle.requeue(), Requeue::Backoff(3));
    }

    #[test]
    fn configuration_error_awaits_change() {
        let cycle = report(&[
            (Tier::Database, TierPhase::Blocked),
            (Tier::Keycloak, TierPhase::Pending),
            (Tier::App, TierPhase::Pending),
        ]);
        assert_eq!(cycle.status_phase(), StatusPhase::Blocked);
        assert_eq!(cycle.reached_tier(), None);
        assert_eq!(cycle.requeue(), Requeue::AwaitChange);
        assert_eq!(cycle.consecutive_failures(), 0);
    }
}

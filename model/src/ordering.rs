use crate::synth::DesiredResource;
use crate::{Tier, TierPhase};

/// Whether `tier` may be created or updated, given the phase each tier reached so far in the
/// cycle. Every earlier tier must be `Done`.
pub fn gate<F>(tier: Tier, phase_of: F) -> bool
where
    F: Fn(Tier) -> TierPhase,
{
    Tier::ALL
        .iter()
        .take_while(|earlier| **earlier < tier)
        .all(|earlier| phase_of(*earlier) == TierPhase::Done)
}

/// Sort the resources of one tier into apply order: secrets, config maps, services, workloads,
/// routes. Ties are broken by name so the order is stable.
pub fn sort_for_apply(resources: &mut [DesiredResource]) {
    resources.sort_by(|a, b| (a.tier, &a.id).cmp(&(b.tier, &b.id)));
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::synth::{synthesize, ResourceKind, SynthesisInput};
    use crate::test_utils::horreum;

    #[test]
    fn later_tiers_wait_for_earlier_ones() {
        let phases = |done: &'static [Tier]| move |tier: Tier| {
            if done.contains(&tier) {
                TierPhase::Done
            } else {
                TierPhase::Pending
            }
        };
        assert!(gate(Tier::Database, phases(&[])));
        assert!(!gate(Tier::Keycloak, phases(&[])));
        assert!(gate(Tier::Keycloak, phases(&[Tier::Database])));
        assert!(!gate(Tier::App, phases(&[Tier::Database])));
        assert!(!gate(Tier::App, phases(&[Tier::Keycloak])));
        assert!(gate(Tier::App, phases(&[Tier::Database, Tier::Keycloak])));
    }

    #[test]
    fn apply_order_within_tier() {
        let h = horreum("perf", "hr");
        let mut resources = synthesize(
            Tier::App,
            SynthesisInput {
                horreum: &h,
                realm: "{}",
            },
        )
        .unwrap();
        resources.reverse();
        sort_for_apply(&mut resources);
        let kinds: Vec<_> = resources.iter().map(|r| r.id.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ResourceKind::ConfigMap,
                ResourceKind::ConfigMap,
                ResourceKind::Service,
                ResourceKind::Deployment,
                ResourceKind::Route
            ]
        );
        assert_eq!(resources[0].id.name, "perf-app-init");
    }
}

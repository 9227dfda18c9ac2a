use chrono::{DateTime, Utc};
use horreum_model::constants::FINALIZER_MAIN;
use horreum_model::{CrdExt, Horreum};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

/// The action that the controller needs to take in order to reconcile the `Horreum`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum Action {
    /// A new `Horreum`, not yet seen, gets an empty status.
    Initialize,
    /// The main finalizer makes sure owned resources are cleaned up before the object goes away.
    AddMainFinalizer,
    /// Run a convergence cycle and write the status.
    Converge,
    /// The trigger is our own status write and the next cycle is not due. `None` means that only
    /// a change can make progress.
    Wait(Option<Duration>),
    /// The `Horreum` is being deleted: delete everything it owns and remove the main finalizer.
    Cleanup,
    /// The `Horreum` is being deleted and we have nothing left to do.
    Done,
}

/// The resource versions produced by our own status writes, one per `Horreum` uid. Each is
/// consumed by the first reconcile that sees it.
#[derive(Debug, Default)]
pub(crate) struct StatusWrites {
    versions: Mutex<HashMap<String, String>>,
}

impl StatusWrites {
    /// Remember the resource version returned by a status write.
    pub(crate) async fn record(&self, written: &Horreum) {
        if let (Some(uid), Some(version)) = (
            written.metadata.uid.as_ref(),
            written.metadata.resource_version.as_ref(),
        ) {
            let _ = self
                .versions
                .lock()
                .await
                .insert(uid.clone(), version.clone());
        }
    }

    /// Whether `horreum` is exactly what our last status write produced. Only the first call for
    /// a recorded write returns `true`, later triggers for the same version come from elsewhere.
    pub(crate) async fn is_own_write(&self, horreum: &Horreum) -> bool {
        let uid = match horreum.metadata.uid.as_ref() {
            Some(uid) => uid,
            None => return false,
        };
        let written = self.versions.lock().await.remove(uid);
        written.is_some() && written == horreum.metadata.resource_version
    }
}

/// Inspect `horreum` to determine which `Action` the controller should take at time `now`.
/// `own_write` tells whether the trigger is the watch event of our own status write.
pub(crate) fn determine_action(horreum: &Horreum, own_write: bool, now: DateTime<Utc>) -> Action {
    if horreum.is_delete_requested() {
        return if horreum.has_finalizer(FINALIZER_MAIN) {
            Action::Cleanup
        } else {
            Action::Done
        };
    }
    let status = match &horreum.status {
        None => return Action::Initialize,
        Some(status) => status,
    };
    if !horreum.has_finalizer(FINALIZER_MAIN) {
        return Action::AddMainFinalizer;
    }
    // Any other trigger, a spec or annotation edit or an event of an owned object, converges.
    if !own_write || status.observed_generation != horreum.metadata.generation {
        return Action::Converge;
    }
    match (status.next_attempt.as_ref(), status.next_attempt()) {
        (None, _) => Action::Wait(None),
        (Some(_), Some(next)) if next > now => Action::Wait((next - now).to_std().ok()),
        _ => Action::Converge,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use horreum_model::constants::ANNOTATION_JAVA_OPTIONS;
    use horreum_model::{HorreumSpec, HorreumStatus, StatusPhase, Tier};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

    fn horreum(status: Option<HorreumStatus>, finalizer: bool) -> Horreum {
        let mut horreum = Horreum::new("perf", HorreumSpec::default());
        horreum.metadata.uid = Some("6e1d".to_string());
        horreum.metadata.resource_version = Some("100".to_string());
        horreum.metadata.generation = Some(3);
        horreum.status = status;
        if finalizer {
            horreum.metadata.finalizers = Some(vec![FINALIZER_MAIN.to_string()]);
        }
        horreum
    }

    fn converged(next_attempt: Option<DateTime<Utc>>) -> HorreumStatus {
        HorreumStatus {
            observed_generation: Some(3),
            next_attempt: next_attempt.map(|time| time.to_rfc3339()),
            ..Default::default()
        }
    }

    #[test]
    fn new_horreum() {
        let now = Utc::now();
        assert_eq!(
            determine_action(&horreum(None, false), false, now),
            Action::Initialize
        );
        assert_eq!(
            determine_action(&horreum(Some(HorreumStatus::default()), false), false, now),
            Action::AddMainFinalizer
        );
        assert_eq!(
            determine_action(&horreum(Some(HorreumStatus::default()), true), false, now),
            Action::Converge
        );
    }

    #[test]
    fn own_status_write_waits_for_next_attempt() {
        let now = Utc::now();
        let later = now + ChronoDuration::seconds(40);
        assert_eq!(
            determine_action(&horreum(Some(converged(Some(later))), true), true, now),
            Action::Wait(Some(Duration::from_secs(40)))
        );
        assert_eq!(
            determine_action(&horreum(Some(converged(None)), true), true, now),
            Action::Wait(None)
        );
        let earlier = now - ChronoDuration::seconds(1);
        assert_eq!(
            determine_action(&horreum(Some(converged(Some(earlier))), true), true, now),
            Action::Converge
        );
    }

    #[test]
    fn annotation_change_converges() {
        let now = Utc::now();
        let mut h = horreum(Some(converged(Some(now + ChronoDuration::seconds(300)))), true);
        h.metadata.annotations = Some(
            [(ANNOTATION_JAVA_OPTIONS.to_string(), "-Xmx2g".to_string())]
                .into_iter()
                .collect(),
        );
        h.metadata.resource_version = Some("101".to_string());
        assert_eq!(determine_action(&h, false, now), Action::Converge);
    }

    #[test]
    fn owned_object_event_while_blocked_converges() {
        let now = Utc::now();
        let blocked = HorreumStatus {
            phase: StatusPhase::Blocked,
            reached_tier: Some(Tier::Database),
            ..converged(None)
        };
        assert_eq!(
            determine_action(&horreum(Some(blocked), true), false, now),
            Action::Converge
        );
    }

    #[test]
    fn spec_change_converges_immediately() {
        let now = Utc::now();
        let mut h = horreum(Some(converged(None)), true);
        h.metadata.generation = Some(4);
        assert_eq!(determine_action(&h, true, now), Action::Converge);
    }

    #[test]
    fn deletion() {
        let now = Utc::now();
        let mut h = horreum(Some(converged(None)), true);
        h.metadata.deletion_timestamp = Some(Time(now));
        assert_eq!(determine_action(&h, false, now), Action::Cleanup);
        h.metadata.finalizers = None;
        assert_eq!(determine_action(&h, false, now), Action::Done);
    }

    #[tokio::test]
    async fn own_write_is_recognized_once() {
        let writes = StatusWrites::default();
        let written = horreum(Some(converged(None)), true);
        assert!(!writes.is_own_write(&written).await);

        writes.record(&written).await;
        assert!(writes.is_own_write(&written).await);
        // The next event for the same version comes from an owned object or a resync.
        assert!(!writes.is_own_write(&written).await);

        writes.record(&written).await;
        let mut edited = written.clone();
        edited.metadata.resource_version = Some("101".to_string());
        assert!(!writes.is_own_write(&edited).await);
        assert!(!writes.is_own_write(&written).await);
    }
}

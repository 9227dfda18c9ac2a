use crate::converge::Requeue;
use anyhow::{Context, Result};
use kube::runtime::controller::Action;
use std::collections::VecDeque;
use std::time::Duration;

const UNITS: [(char, u64); 3] = [('d', 86400), ('h', 3600), ('m', 60)];

/// The first backoff after a failed cycle. Doubles with every further failure.
const BACKOFF_BASE: Duration = Duration::from_secs(5);

/// Upper bound of the failure backoff and the interval of the slow resync.
const MAX_REQUEUE: Duration = Duration::from_secs(300);

/// How often a tier blocked on a missing secret looks for it again.
const BLOCKED_POLL: Duration = Duration::from_secs(30);

/// Tell the controller to reconcile the object again after some duration.
pub(crate) fn requeue() -> Action {
    Action::requeue(BACKOFF_BASE)
}

/// Requeue after `delay`, or wait for a change of the object when there is none.
pub(crate) fn requeue_after(delay: Option<Duration>) -> Action {
    match delay {
        Some(delay) => Action::requeue(delay),
        None => no_requeue(),
    }
}

/// Do not requeue the object.
pub(crate) fn no_requeue() -> Action {
    Action::await_change()
}

/// How long to wait before the next cycle.
pub(crate) fn delay(requeue: Requeue) -> Option<Duration> {
    match requeue {
        // Everything is done. Look again just in case something drifted without us noticing.
        Requeue::Resync => Some(MAX_REQUEUE),
        Requeue::Poll => Some(BLOCKED_POLL),
        Requeue::Backoff(failures) => Some(backoff(failures)),
        Requeue::AwaitChange => None,
    }
}

/// `5s * 2^failures`, capped at five minutes.
pub(crate) fn backoff(failures: u32) -> Duration {
    BACKOFF_BASE
        .checked_mul(2u32.saturating_pow(failures))
        .map(|delay| delay.min(MAX_REQUEUE))
        .unwrap_or(MAX_REQUEUE)
}

/// Parse a Duration string like `2m30s` into a Duration object.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let mut secs: u64 = 0;
    let mut duration_string = input;
    for unit in UNITS {
        let mut vec: VecDeque<&str> = duration_string.split(unit.0).collect();
        if vec.len() > 1 {
            secs += vec
                .pop_front()
                .context("Failed to parse input")?
                .parse::<u64>()?
                * unit.1;
        }
        duration_string = vec.pop_front().context("Failed to parse input")?;
    }
    let mut vec: VecDeque<&str> = duration_string.split('s').collect();
    let seconds = vec.pop_front().context("Failed to parse input")?;
    if !seconds.is_empty() {
        secs += seconds.parse::<u64>()?;
    }
    Ok(Duration::from_secs(secs))
}

#[test]
fn all_units() {
    assert_eq!(
        parse_duration("1d2h3m4s").unwrap(),
        Duration::from_secs(93784)
    )
}

#[test]
fn minutes_and_seconds() {
    assert_eq!(parse_duration("2m30s").unwrap(), Duration::from_secs(150))
}

#[test]
fn only_seconds() {
    assert_eq!(parse_duration("500s").unwrap(), Duration::from_secs(500))
}

#[test]
fn no_seconds() {
    assert_eq!(parse_duration("1h5m").unwrap(), Duration::from_secs(3900))
}

#[test]
fn no_units() {
    assert_eq!(parse_duration("5123").unwrap(), Duration::from_secs(5123))
}

#[test]
fn wrong_order() {
    assert!(parse_duration("10d5m3h2s").is_err())
}

#[test]
fn invalid_unit() {
    assert!(parse_duration("5y40s").is_err())
}

#[test]
fn missing_value() {
    assert!(parse_duration("5hm4s").is_err())
}

#[test]
fn backoff_doubles_until_capped() {
    assert_eq!(backoff(0), Duration::from_secs(5));
    assert_eq!(backoff(1), Duration::from_secs(10));
    assert_eq!(backoff(3), Duration::from_secs(40));
    assert_eq!(backoff(6), Duration::from_secs(300));
    assert_eq!(backoff(40), Duration::from_secs(300));
}

#[test]
fn delay_per_requeue() {
    assert_eq!(delay(Requeue::Resync), Some(Duration::from_secs(300)));
    assert_eq!(delay(Requeue::Backoff(1)), Some(Duration::from_secs(10)));
    assert_eq!(delay(Requeue::AwaitChange), None);
}

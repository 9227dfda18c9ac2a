use crate::constants::parse_duration;
use crate::converge::ReadySettings;
use crate::error::Result;
use anyhow::Context;
use clap::Parser;
use horreum_model::StaticRealm;
use log::info;
use std::path::PathBuf;
use std::time::Duration;

/// Runs Horreum deployments described by `Horreum` objects: a PostgreSQL database, Keycloak and
/// the Horreum application, brought up in that order.
#[derive(Debug, Parser)]
#[clap(author, version, about)]
pub struct Args {
    /// JSON file with the Keycloak realm imported on startup. A built-in realm is used when this
    /// is not given.
    #[clap(long = "realm-file", env = "HORREUM_REALM_FILE")]
    pub realm_file: Option<PathBuf>,

    /// How long one cycle waits for the workloads of a tier to become ready, e.g. `2m30s`.
    #[clap(
        long = "ready-timeout",
        env = "HORREUM_READY_TIMEOUT",
        default_value = "2m",
        parse(try_from_str = parse_duration)
    )]
    pub ready_timeout: Duration,

    /// How often readiness is checked while waiting.
    #[clap(
        long = "ready-poll-interval",
        env = "HORREUM_READY_POLL_INTERVAL",
        default_value = "2s",
        parse(try_from_str = parse_duration)
    )]
    pub ready_poll_interval: Duration,

    /// Only watch `Horreum` objects in this namespace. All namespaces are watched when missing.
    #[clap(long = "watch-namespace", env = "WATCH_NAMESPACE")]
    pub watch_namespace: Option<String>,
}

impl Args {
    pub fn ready_settings(&self) -> ReadySettings {
        ReadySettings {
            timeout: self.ready_timeout,
            poll_interval: self.ready_poll_interval,
        }
    }

    /// Load the realm document from `--realm-file`, or the built-in one.
    pub fn realm(&self) -> Result<StaticRealm> {
        let path = match &self.realm_file {
            None => return Ok(StaticRealm::builtin()),
            Some(path) => path,
        };
        info!("Loading realm from '{}'", path.display());
        let document = std::fs::read_to_string(path)
            .with_context(|| format!("Unable to read realm file '{}'", path.display()))?;
        StaticRealm::new(document)
            .with_context(|| format!("Invalid realm file '{}'", path.display()))
    }
}

/*!

This library provides the `Horreum` custom resource definition and everything needed to turn one
into the cluster resources of a running Horreum deployment. Nothing in here talks to a cluster:
names, secrets, routing topology and the desired resources of each tier are all computed from the
`Horreum` object alone.

!*/

#![deny(
    clippy::expect_used,
    clippy::get_unwrap,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::panicking_unwrap,
    clippy::unwrap_in_result,
    clippy::unwrap_used
)]

pub use crd_ext::CrdExt;
pub use error::{Error, Result};
pub use horreum::{
    AppSpec, DatabaseRef, DatabaseSpec, Horreum, HorreumSpec, HorreumStatus, KeycloakSpec,
    RoutingSpec, ServiceType, StatusPhase, TierPhase, TierStatus,
};
pub use realm::{RealmSource, StaticRealm};
pub use route::Route;
pub use synth::{DesiredObject, DesiredResource, ResourceId, ResourceKind, SynthesisInput};
pub use tier::Tier;

pub mod constants;
mod crd_ext;
mod error;
mod horreum;
pub mod naming;
pub mod ordering;
pub mod realm;
pub mod route;
mod schema_utils;
pub mod secret;
pub mod synth;
#[cfg(test)]
mod test_utils;
mod tier;
pub mod topology;

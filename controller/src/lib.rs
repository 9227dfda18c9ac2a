/*!

The Horreum [controller] brings up a database, Keycloak and the Horreum application, in that
order, for every `Horreum` object in the cluster. Each reconcile runs one convergence cycle over
the three tiers, see [`converge`], and writes the outcome to the object's status.

[controller]: https://kubernetes.io/docs/concepts/architecture/controller/

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

pub use config::Args;
pub use reconcile::run_controller;

mod action;
pub mod cluster;
mod config;
pub mod constants;
mod context;
pub mod converge;
pub mod error;
mod reconcile;

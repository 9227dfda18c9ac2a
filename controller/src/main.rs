#![deny(
    clippy::expect_used,
    clippy::get_unwrap,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::panicking_unwrap,
    clippy::unwrap_in_result,
    clippy::unwrap_used
)]

use clap::Parser;
use env_logger::Builder;
use horreum_controller::{run_controller, Args};
use kube::Client;
use log::{error, info, LevelFilter};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logger();
    info!("Starting");

    // Initialize the k8s client from in-cluster variables or KUBECONFIG.
    let client = match Client::try_default().await {
        Ok(client) => client,
        Err(e) => {
            error!("Unable to create k8s client: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run_controller(client, &args).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// The log level used when the `RUST_LOG` environment variable does not exist.
const DEFAULT_LEVEL_FILTER: LevelFilter = LevelFilter::Trace;

/// Extract the value of `RUST_LOG` if it exists, otherwise log this crate and the model at
/// `DEFAULT_LEVEL_FILTER`.
fn init_logger() {
    match std::env::var(env_logger::DEFAULT_FILTER_ENV).ok() {
        Some(_) => {
            // RUST_LOG exists; env_logger will use it.
            Builder::from_default_env().init();
        }
        None => {
            // RUST_LOG does not exist; use default log level for our crates only.
            Builder::new()
                .filter(Some(env!("CARGO_CRATE_NAME")), DEFAULT_LEVEL_FILTER)
                .filter(Some("horreum_controller"), DEFAULT_LEVEL_FILTER)
                .filter(Some("horreum_model"), DEFAULT_LEVEL_FILTER)
                .init();
        }
    }
}

use std::fmt::{Display, Formatter};

/// The result type used inside the reconcile loop. Errors carry `anyhow` context strings.
pub type Result<T> = anyhow::Result<T>;

pub type ReconciliationResult<T> = std::result::Result<T, ReconciliationError>;

/// The error `kube-runtime` receives from `reconcile`. It must implement `std::error::Error`,
/// which `anyhow::Error` does not.
#[derive(Debug)]
pub struct ReconciliationError {
    inner: anyhow::Error,
}

impl Display for ReconciliationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}", self.inner)
    }
}

impl std::error::Error for ReconciliationError {}

impl From<anyhow::Error> for ReconciliationError {
    fn from(inner: anyhow::Error) -> Self {
        Self { inner }
    }
}

#[test]
fn display_includes_context() {
    use anyhow::Context;
    let e: Result<()> =
        Err(anyhow::anyhow!("connection refused")).context("Unable to add finalizer");
    let e = ReconciliationError::from(e.unwrap_err());
    assert_eq!(e.to_string(), "Unable to add finalizer: connection refused");
}

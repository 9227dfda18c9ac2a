use crate::Tier;
use snafu::Snafu;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while turning a `Horreum` spec into desired resources.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display(
        "The {} route is 'passthrough' but no TLS secret is given in 'route.tls'",
        tier
    ))]
    PassthroughWithoutTls { tier: Tier },

    #[snafu(display(
        "Unknown route type '{}' for {}, expected one of 'none', 'edge', 'passthrough' or 'reencrypt'",
        route_type,
        tier
    ))]
    UnknownRouteType { tier: Tier, route_type: String },

    #[snafu(display("Unable to load the realm document: {}", message))]
    Realm { message: String },

    #[snafu(display("Unable to serialize {} '{}' for hashing: {}", kind, name, source))]
    Hash {
        kind: String,
        name: String,
        source: serde_json::Error,
    },

    #[snafu(display("Synthesized {} resources are inconsistent: {}", tier, what))]
    SynthesisInvariant { tier: Tier, what: String },
}

impl Error {
    /// Configuration errors are mistakes in the `Horreum` spec. Retrying will not help until the
    /// spec changes.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Error::PassthroughWithoutTls { .. } | Error::UnknownRouteType { .. }
        )
    }
}

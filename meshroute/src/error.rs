//! Error types surfaced by discovery and by the handler chain.

/// Boxed error used by transport services plugged into the chain.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures raised while building or walking the discovery tree.
///
/// These are configuration-level defects or an unready registry: they are never
/// retried by this crate and always fail the invocation that triggered them.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// The instance source has not received any data yet.
    #[error("service registry is not ready, cannot discover '{microservice_name}'")]
    Unready { microservice_name: String },

    /// A discovery filter failed while narrowing its parent node.
    #[error("discovery filter '{filter}' failed")]
    Filter {
        filter: String,
        #[source]
        source: anyhow::Error,
    },

    /// The filter chain finished on a node that does not hold endpoints.
    #[error("discovery group '{name}' does not hold endpoints, is the endpoint filter missing?")]
    UnexpectedLeaf { name: String },

    /// A filter was registered after the registry had been consumed.
    #[error("filter registry is frozen, cannot register '{filter}'")]
    RegistryFrozen { filter: String },

    #[error("invalid version rule '{rule}'")]
    InvalidVersionRule { rule: String },
}

/// Failures delivered through an [`AsyncResponse`](crate::AsyncResponse).
#[derive(Debug, thiserror::Error)]
pub enum InvocationError {
    /// Discovery succeeded but no endpoint survived filtering.
    #[error(
        "no available address found, microserviceName={microservice_name}, \
         version={version_rule}, discoveryGroupName={group}"
    )]
    NoAddressFound {
        microservice_name: String,
        version_rule: String,
        group: String,
    },

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("handler chain of '{operation}' ended without completing the response")]
    ChainExhausted { operation: String },

    #[error("an endpoint was already selected for '{operation}'")]
    EndpointAlreadySelected { operation: String },

    #[error("no endpoint was selected for '{operation}' before the transport stage")]
    NoEndpointSelected { operation: String },

    #[error("transport stage of '{operation}' must run inside a tokio runtime")]
    RuntimeUnavailable { operation: String },

    #[error("transport failed")]
    Transport(#[source] BoxError),
}

impl InvocationError {
    /// Whether this error means the service had nowhere to route to, as opposed
    /// to a broken pipeline or an unready registry.
    pub fn is_no_address_found(&self) -> bool {
        matches!(self, InvocationError::NoAddressFound { .. })
    }
}

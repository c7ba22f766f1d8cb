//! Defines the interface an [`EndpointProbe`](crate::EndpointProbe) requires in order
//! to find the running instances of a microservice.

use crate::{MicroserviceInstance, ServiceDefinition};

/// Interface that provides functionality to
/// acquire the instances of a microservice given its definition.
#[async_trait::async_trait]
pub trait LookupService {
    /// Return the instances currently backing the microservice described by
    /// [`ServiceDefinition`](crate::ServiceDefinition).
    /// If nothing was found, an empty list is returned.
    async fn resolve_service_instances(
        &self,
        definition: &ServiceDefinition,
    ) -> Result<Vec<MicroserviceInstance>, anyhow::Error>;
}

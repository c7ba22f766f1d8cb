//! Registry-side description of microservice instances and the endpoints they expose.

use std::fmt;
use std::sync::Arc;

/// Registration status of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceStatus {
    Up,
    Down,
    Starting,
    OutOfService,
}

/// Where an instance is deployed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataCenterInfo {
    pub region: String,
    pub availability_zone: String,
}

/// One running copy of a microservice as reported by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MicroserviceInstance {
    pub instance_id: String,
    /// Version of the microservice this instance runs, e.g. `1.0.0`.
    pub version: String,
    /// Endpoint URIs such as `rest://10.0.0.1:8080`, or bare `host:port`.
    pub endpoints: Vec<String>,
    pub status: InstanceStatus,
    pub data_center: Option<DataCenterInfo>,
}

impl MicroserviceInstance {
    /// An `Up` instance without data center information.
    pub fn new<I, E>(instance_id: I, version: impl Into<String>, endpoints: E) -> Self
    where
        I: Into<String>,
        E: IntoIterator,
        E::Item: Into<String>,
    {
        Self {
            instance_id: instance_id.into(),
            version: version.into(),
            endpoints: endpoints.into_iter().map(Into::into).collect(),
            status: InstanceStatus::Up,
            data_center: None,
        }
    }

    pub fn with_status(self, status: InstanceStatus) -> Self {
        Self { status, ..self }
    }

    pub fn with_data_center(self, region: impl Into<String>, zone: impl Into<String>) -> Self {
        Self {
            data_center: Some(DataCenterInfo {
                region: region.into(),
                availability_zone: zone.into(),
            }),
            ..self
        }
    }
}

/// A concrete address an invocation can be sent to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    transport: Option<Arc<str>>,
    address: Arc<str>,
    instance_id: Arc<str>,
}

impl Endpoint {
    /// Parse an endpoint URI published by `instance`.
    ///
    /// ```
    /// let endpoint = meshroute::Endpoint::parse("rest://10.0.0.1:8080", "i-1");
    /// assert_eq!(endpoint.transport(), Some("rest"));
    /// assert_eq!(endpoint.address(), "10.0.0.1:8080");
    ///
    /// let bare = meshroute::Endpoint::parse("10.0.0.2:8080", "i-2");
    /// assert_eq!(bare.transport(), None);
    /// ```
    pub fn parse(uri: &str, instance_id: &str) -> Self {
        let (transport, address) = match uri.split_once("://") {
            Some((scheme, rest)) => (Some(Arc::from(scheme)), rest),
            None => (None, uri),
        };
        // Query parameters carry transport options we do not interpret here.
        let address = address.split('?').next().unwrap_or(address);
        Self {
            transport,
            address: Arc::from(address),
            instance_id: Arc::from(instance_id),
        }
    }

    pub fn transport(&self) -> Option<&str> {
        self.transport.as_deref()
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

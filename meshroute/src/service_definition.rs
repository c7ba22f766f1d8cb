use anyhow::Context;
use std::net::{IpAddr, SocketAddr};

/// Defines a microservice reachable through a `hostname` and a `port`.
/// The hostname will be resolved to the concrete ips of the service instances.
#[derive(Debug, Clone)]
pub struct ServiceDefinition {
    app_id: String,
    microservice_name: String,
    /// The hostname of the service.
    hostname: String,
    /// The service port.
    port: u16,
    /// Scheme put in front of resolved endpoints, e.g. `rest`.
    transport: Option<String>,
    /// Version reported for every resolved instance.
    version: String,
}

impl ServiceDefinition {
    /// Create a [`ServiceDefinition`] for `microservice_name` served at `hostname` and `port`.
    ///
    /// This function will fail is the `hostname` is not a valid domain name.
    pub fn from_parts<T: ToString>(
        app_id: &str,
        microservice_name: &str,
        hostname: T,
        port: u16,
    ) -> Result<Self, anyhow::Error> {
        let hostname = hostname.to_string();

        hickory_resolver::Name::from_ascii(&hostname)
            .map_err(anyhow::Error::from)
            .context("invalid 'hostname'")?;

        Ok(Self {
            app_id: app_id.to_string(),
            microservice_name: microservice_name.to_string(),
            hostname,
            port,
            transport: None,
            version: "0.0.0".to_string(),
        })
    }

    /// Publish resolved endpoints under this transport.
    pub fn with_transport(self, transport: impl Into<String>) -> Self {
        Self {
            transport: Some(transport.into()),
            ..self
        }
    }

    /// Report resolved instances as running this version.
    pub fn with_version(self, version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..self
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn microservice_name(&self) -> &str {
        &self.microservice_name
    }

    /// Get the `hostname` part of a `ServiceDefinition`.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Get the `port` part of a `ServiceDefinition`.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn transport(&self) -> Option<&str> {
        self.transport.as_deref()
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// The endpoint URI an instance at `ip_addr` publishes.
    pub fn endpoint_uri(&self, ip_addr: IpAddr) -> String {
        let address = SocketAddr::from((ip_addr, self.port));
        match &self.transport {
            Some(transport) => format!("{}://{}", transport, address),
            None => address.to_string(),
        }
    }
}

/// ```
/// let sd = meshroute::ServiceDefinition::try_from(("app", "Greeter", "localhost", 8090)).unwrap();
/// assert_eq!(sd.hostname(), "localhost");
/// assert_eq!(sd.port(), 8090);
/// ```
impl TryFrom<(&str, &str, &str, u16)> for ServiceDefinition {
    type Error = anyhow::Error;

    fn try_from(
        (app_id, microservice_name, hostname, port): (&str, &str, &str, u16),
    ) -> Result<Self, Self::Error> {
        Self::from_parts(app_id, microservice_name, hostname, port)
    }
}

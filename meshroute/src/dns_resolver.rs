//! Implements [`LookupService`] for dns.

use crate::{LookupService, MicroserviceInstance, ServiceDefinition};
use anyhow::Context;
use hickory_resolver::{system_conf, AsyncResolver, TokioAsyncResolver};

/// Implements [`LookupService`] by using DNS queries to lookup [`ServiceDefinition::hostname`].
///
/// Every resolved ip becomes one instance publishing a single endpoint.
pub struct DnsResolver {
    /// The hickory resolver which contacts the dns service directly such
    /// that we bypass os-specific dns caching.
    dns: TokioAsyncResolver,
}

impl DnsResolver {
    /// Construct a new [`DnsResolver`] from env and system configuration, e.g `resolv.conf`.
    pub fn from_system_config() -> Result<Self, anyhow::Error> {
        let (config, mut opts) = system_conf::read_system_conf()
            .context("failed to read dns services from system configuration")?;

        // We do not want any caching on our side.
        opts.cache_size = 0;

        let dns = AsyncResolver::tokio(config, opts);

        Ok(Self { dns })
    }
}

#[async_trait::async_trait]
impl LookupService for DnsResolver {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn resolve_service_instances(
        &self,
        definition: &ServiceDefinition,
    ) -> Result<Vec<MicroserviceInstance>, anyhow::Error> {
        let lookup = self
            .dns
            .lookup_ip(definition.hostname())
            .await
            .with_context(|| format!("failed to resolve '{}'", definition.hostname()))?;
        tracing::debug!("dns query expires in: {:?}", lookup.valid_until());

        Ok(lookup
            .iter()
            .map(|ip_addr| {
                tracing::debug!("result: ip {}", ip_addr);
                let endpoint = definition.endpoint_uri(ip_addr);
                MicroserviceInstance::new(endpoint.clone(), definition.version(), [endpoint])
            })
            .collect())
    }
}

//! Periodic service discovery that keeps an [`InstanceCacheManager`] up to date.

use crate::{InstanceCacheManager, LookupService, ServiceDefinition};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing_futures::Instrument;

const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(10);

/// Resolves a set of microservices with a [`LookupService`] and pushes the
/// instances it finds into an [`InstanceCacheManager`].
///
/// Versions only move when a lookup returns a different instance set, so
/// discovery trees built on the manager are only rebuilt on real changes.
pub struct EndpointProbe<T> {
    lookup: T,
    cache: Arc<InstanceCacheManager>,
    services: Vec<ServiceDefinition>,
    probe_interval: Duration,
}

impl<T: LookupService + Send + Sync + 'static> EndpointProbe<T> {
    pub fn builder(lookup: T, cache: Arc<InstanceCacheManager>) -> EndpointProbeBuilder<T> {
        EndpointProbeBuilder {
            lookup,
            cache,
            services: Vec::new(),
            probe_interval: None,
        }
    }

    /// Resolve every service once.
    ///
    /// A failed lookup keeps the previous instances of that service; the first
    /// failure is returned after all services have been probed.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn probe_once(&self) -> Result<(), anyhow::Error> {
        let mut first_error = None;
        for definition in &self.services {
            match self.lookup.resolve_service_instances(definition).await {
                Ok(instances) => {
                    let changed = self.cache.update(
                        definition.app_id(),
                        definition.microservice_name(),
                        instances,
                    );
                    if changed {
                        tracing::debug!("instances of {} changed", definition.microservice_name());
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        "failed to resolve {}: {:#}",
                        definition.microservice_name(),
                        err
                    );
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Probe forever, every `probe_interval`.
    pub async fn probe(self) {
        let mut interval = tokio::time::interval(self.probe_interval);
        loop {
            interval.tick().await;
            // Failures are logged by `probe_once` and retried on the next tick.
            let _ = self.probe_once().await;
        }
    }

    /// Run [`probe`](EndpointProbe::probe) on a background task.
    pub fn spawn(self) -> JoinHandle<()> {
        let span = tracing::info_span!("endpoint_probe", services = self.services.len());
        tokio::spawn(self.probe().instrument(span))
    }
}

/// Builder to configure and create an [`EndpointProbe`].
pub struct EndpointProbeBuilder<T> {
    lookup: T,
    cache: Arc<InstanceCacheManager>,
    services: Vec<ServiceDefinition>,
    probe_interval: Option<Duration>,
}

impl<T: LookupService + Send + Sync + 'static> EndpointProbeBuilder<T> {
    /// Add a microservice to probe.
    pub fn service(mut self, definition: ServiceDefinition) -> Self {
        self.services.push(definition);
        self
    }

    /// Set how often the probe looks for changes.
    /// Default interval in seconds is 10.
    pub fn probe_interval(self, interval: Duration) -> Self {
        Self {
            probe_interval: Some(interval),
            ..self
        }
    }

    pub fn build(self) -> EndpointProbe<T> {
        EndpointProbe {
            lookup: self.lookup,
            cache: self.cache,
            services: self.services,
            probe_interval: self.probe_interval.unwrap_or(DEFAULT_PROBE_INTERVAL),
        }
    }
}

const _: () = {
    const fn assert_is_send<T: Send>() {}
    assert_is_send::<EndpointProbe<crate::DnsResolver>>();
};

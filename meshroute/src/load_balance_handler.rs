//! Round robin endpoint selection as a stage of the handler chain.

use crate::{
    AsyncResponse, DiscoveryContext, DiscoveryFilter, DiscoveryTree, EndpointDiscoveryFilter,
    FilterRegistry, Handler, InstanceSource, Invocation, InvocationError,
};
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Picks one endpoint per call, rotating through the endpoints of each
/// discovery group.
///
/// Counters are keyed by the name of the discovered group, created the first
/// time a group is seen and never removed. Concurrent callers on the same
/// group each take a distinct counter value.
///
/// ```
/// use meshroute::{AsyncResponse, HandlerChain, Invocation, LoadBalanceHandler};
/// use meshroute::InstanceCacheManager;
/// use std::sync::Arc;
///
/// let source = Arc::new(InstanceCacheManager::new());
/// source.update("app", "Ghost", vec![]);
///
/// let chain = HandlerChain::new(vec![Arc::new(LoadBalanceHandler::builder(source).build())]);
/// let invocation = Invocation::new("app", "Ghost", "1.0.0+", "haunt", chain);
///
/// let (response, mut receiver) = AsyncResponse::channel();
/// invocation.next(response);
///
/// let err = receiver.try_recv().unwrap().unwrap_err();
/// assert!(err.is_no_address_found());
/// ```
pub struct LoadBalanceHandler {
    discovery_tree: DiscoveryTree,
    indexes: DashMap<String, AtomicUsize>,
}

impl LoadBalanceHandler {
    /// Start configuring a handler discovering instances from `source`.
    ///
    /// The filters of [`FilterRegistry::global`] and the endpoint filter are
    /// always part of the tree, unless the global registry is turned off with
    /// [`load_global_registry`](LoadBalanceHandlerBuilder::load_global_registry).
    pub fn builder(source: Arc<dyn InstanceSource>) -> LoadBalanceHandlerBuilder {
        LoadBalanceHandlerBuilder {
            source,
            filters: Vec::new(),
            global_registry: true,
            endpoint_filter: EndpointDiscoveryFilter::new(),
        }
    }

    pub fn discovery_tree(&self) -> &DiscoveryTree {
        &self.discovery_tree
    }

    /// Take the next counter value of `group`, creating the counter first if needed.
    fn next_index(&self, group: &str) -> usize {
        if let Some(index) = self.indexes.get(group) {
            return index.fetch_add(1, Ordering::SeqCst);
        }
        let index = self
            .indexes
            .entry(group.to_string())
            .or_insert_with(|| {
                tracing::info!("created round robin index for group {}", group);
                AtomicUsize::new(0)
            });
        index.fetch_add(1, Ordering::SeqCst)
    }
}

impl Handler for LoadBalanceHandler {
    fn handle(&self, mut invocation: Invocation, response: AsyncResponse) {
        let mut context = DiscoveryContext::from_invocation(&invocation);
        let endpoints = match self.discovery_tree.discover(
            &mut context,
            invocation.app_id(),
            invocation.microservice_name(),
            invocation.microservice_version_rule(),
        ) {
            Ok(endpoints) => endpoints,
            Err(err) => {
                tracing::error!(
                    "discovery failed for {}: {}",
                    invocation.microservice_qualified_name(),
                    err
                );
                response.consumer_fail(err.into());
                return;
            }
        };

        if endpoints.is_empty() {
            response.consumer_fail(InvocationError::NoAddressFound {
                microservice_name: invocation.microservice_name().to_string(),
                version_rule: invocation.microservice_version_rule().to_string(),
                group: endpoints.name().to_string(),
            });
            return;
        }

        tracing::debug!(
            "invocation {} uses discovery group {}",
            invocation.microservice_qualified_name(),
            endpoints.name()
        );

        // The counter wraps on overflow, it never goes negative.
        let index = self.next_index(endpoints.name()) % endpoints.data().len();
        let endpoint = endpoints.data()[index].clone();

        if let Err(err) = invocation.set_endpoint(endpoint) {
            response.consumer_fail(err);
            return;
        }
        invocation.next(response);
    }
}

/// Builder to configure and create a [`LoadBalanceHandler`].
pub struct LoadBalanceHandlerBuilder {
    source: Arc<dyn InstanceSource>,
    filters: Vec<Arc<dyn DiscoveryFilter>>,
    global_registry: bool,
    endpoint_filter: EndpointDiscoveryFilter,
}

impl LoadBalanceHandlerBuilder {
    /// Add every filter registered in `registry`.
    pub fn load_from_registry(mut self, registry: &FilterRegistry) -> Self {
        self.filters.extend(registry.snapshot());
        self
    }

    pub fn add_filter(mut self, filter: Arc<dyn DiscoveryFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Whether [`build`](LoadBalanceHandlerBuilder::build) loads the filters of
    /// [`FilterRegistry::global`], freezing it. Enabled by default.
    pub fn load_global_registry(self, global_registry: bool) -> Self {
        Self {
            global_registry,
            ..self
        }
    }

    /// Replace the default endpoint filter, e.g. to restrict transports.
    pub fn endpoint_filter(self, endpoint_filter: EndpointDiscoveryFilter) -> Self {
        Self {
            endpoint_filter,
            ..self
        }
    }

    /// Build the handler. Among filters of equal order, the global registry's
    /// come first, then the ones configured on this builder.
    pub fn build(self) -> LoadBalanceHandler {
        let mut tree = DiscoveryTree::builder(self.source);
        if self.global_registry {
            tree = tree.load_from_registry(FilterRegistry::global());
        }
        for filter in self.filters {
            tree = tree.add_filter(filter);
        }

        LoadBalanceHandler {
            discovery_tree: tree.add_filter(Arc::new(self.endpoint_filter)).build(),
            indexes: DashMap::new(),
        }
    }
}

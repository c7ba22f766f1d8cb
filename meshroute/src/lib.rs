//! `meshroute` is the client-side routing core of a microservice RPC stack: it
//! discovers the instances of a service, narrows them through pluggable
//! discovery filters cached per version, and picks one endpoint per call with a
//! round robin stage of the request handler chain.
//!
//! # Simple example
//!
//! ```rust
//! use meshroute::{AsyncResponse, HandlerChain, Invocation, LoadBalanceHandler};
//! use meshroute::{InstanceCacheManager, MicroserviceInstance, ResponseBody, TransportHandler};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let source = Arc::new(InstanceCacheManager::new());
//!     source.update(
//!         "app",
//!         "Greeter",
//!         vec![
//!             MicroserviceInstance::new("i-1", "1.0.0", ["rest://10.0.0.1:8080"]),
//!             MicroserviceInstance::new("i-2", "1.0.0", ["rest://10.0.0.2:8080"]),
//!         ],
//!     );
//!
//!     // The transport is anything implementing `tower::Service<Invocation>`.
//!     let transport = tower::service_fn(|invocation: Invocation| async move {
//!         let address = invocation.endpoint().unwrap().address().to_string();
//!         Ok::<ResponseBody, std::io::Error>(Box::new(address))
//!     });
//!
//!     let chain = HandlerChain::new(vec![
//!         Arc::new(LoadBalanceHandler::builder(source).build()),
//!         Arc::new(TransportHandler::new(transport)),
//!     ]);
//!
//!     for expected in ["10.0.0.1:8080", "10.0.0.2:8080", "10.0.0.1:8080"] {
//!         let invocation = Invocation::new("app", "Greeter", "1.0.0+", "sayHello", chain.clone());
//!         let (response, receiver) = AsyncResponse::channel();
//!         invocation.next(response);
//!
//!         let body = receiver.await.unwrap().unwrap();
//!         assert_eq!(*body.downcast::<String>().unwrap(), expected);
//!     }
//! }
//! ```
//!
//! Filters are plain implementations of [`DiscoveryFilter`]. They can be handed
//! to the handler directly, or registered in a [`FilterRegistry`]. Handlers load
//! [`FilterRegistry::global`] on their own; other registries are loaded explicitly.
//!
//! ```rust
//! use meshroute::{FilterRegistry, InstanceCacheManager, InstanceStatusDiscoveryFilter};
//! use meshroute::{LoadBalanceHandler, ZoneAwareDiscoveryFilter};
//! use std::sync::Arc;
//!
//! let registry = FilterRegistry::new();
//! registry
//!     .register(Arc::new(InstanceStatusDiscoveryFilter::new()))
//!     .unwrap();
//!
//! let handler = LoadBalanceHandler::builder(Arc::new(InstanceCacheManager::new()))
//!     .load_from_registry(&registry)
//!     .add_filter(Arc::new(ZoneAwareDiscoveryFilter::new("eu-west", "eu-west-1a")))
//!     .build();
//!
//! let groups: Vec<_> = handler
//!     .discovery_tree()
//!     .filters()
//!     .iter()
//!     .map(|filter| filter.group().to_string())
//!     .collect();
//! assert_eq!(groups, ["up", "zone-aware", "endpoint"]);
//! ```
//!
//! Instances usually come from an [`EndpointProbe`], which periodically asks a
//! [`LookupService`] (DNS by default) for the instances of each configured service.
//!
//! ```rust,no_run
//! use meshroute::{DnsResolver, EndpointProbe, InstanceCacheManager, ServiceDefinition};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), anyhow::Error> {
//!     let cache = Arc::new(InstanceCacheManager::new());
//!     let probe = EndpointProbe::builder(DnsResolver::from_system_config()?, cache.clone())
//!         .service(ServiceDefinition::from_parts("app", "Greeter", "greeter.internal", 8080)?)
//!         .probe_interval(std::time::Duration::from_secs(3))
//!         .build();
//!
//!     // Resolve once before serving traffic, then keep probing in the background.
//!     probe.probe_once().await?;
//!     probe.spawn();
//!     Ok(())
//! }
//! ```
//!
//! # Internals
//! A [`DiscoveryTree`] keeps one root node per instance cache. Each filter adds a
//! level below it, built once and reused while the source reports the same
//! version; a version bump swaps in a fresh root. The [`LoadBalanceHandler`]
//! keys its round robin counters by the name of the leaf group it received.

mod discovery_context;
mod discovery_filter;
mod discovery_tree;
mod discovery_tree_node;
mod dns_resolver;
mod endpoint_filter;
mod endpoint_probe;
mod error;
mod instance;
mod instance_cache;
mod instance_status_filter;
mod invocation;
mod load_balance_handler;
mod lookup_service;
mod service_definition;
mod transport_handler;
mod version_rule;
mod versioned_cache;
mod zone_aware_filter;

pub use discovery_context::*;
pub use discovery_filter::*;
pub use discovery_tree::*;
pub use discovery_tree_node::*;
pub use dns_resolver::*;
pub use endpoint_filter::*;
pub use endpoint_probe::*;
pub use error::*;
pub use instance::*;
pub use instance_cache::*;
pub use instance_status_filter::*;
pub use invocation::*;
pub use load_balance_handler::*;
pub use lookup_service::*;
pub use service_definition::*;
pub use transport_handler::*;
pub use version_rule::*;
pub use versioned_cache::*;
pub use zone_aware_filter::*;

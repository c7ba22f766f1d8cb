//! Runs in its own binary: the process-wide registry freezes on first use.

use meshroute::{
    FilterRegistry, InstanceCacheManager, InstanceStatusDiscoveryFilter, LoadBalanceHandler,
    ZoneAwareDiscoveryFilter,
};
use std::sync::Arc;

fn groups(handler: &LoadBalanceHandler) -> Vec<String> {
    handler
        .discovery_tree()
        .filters()
        .iter()
        .map(|filter| filter.group().to_string())
        .collect()
}

#[test]
fn handlers_load_the_global_registry() {
    // Arrange
    let registry = FilterRegistry::global();
    registry
        .register(Arc::new(InstanceStatusDiscoveryFilter::new()))
        .unwrap();
    assert!(!registry.is_frozen());

    // Act
    let handler = LoadBalanceHandler::builder(Arc::new(InstanceCacheManager::new()))
        .add_filter(Arc::new(ZoneAwareDiscoveryFilter::new("eu", "eu-1")))
        .build();

    // Assert
    assert_eq!(groups(&handler), ["up", "zone-aware", "endpoint"]);
    assert!(registry.is_frozen());
    assert!(registry
        .register(Arc::new(InstanceStatusDiscoveryFilter::new()))
        .is_err());

    let standalone = LoadBalanceHandler::builder(Arc::new(InstanceCacheManager::new()))
        .load_global_registry(false)
        .build();
    assert_eq!(groups(&standalone), ["endpoint"]);
}

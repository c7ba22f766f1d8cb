use meshroute::{
    EndpointProbe, InstanceCacheManager, InstanceSource, LoadBalanceHandler, MicroserviceInstance,
    ServiceDefinition,
};
use std::sync::Arc;
use tests::lookup::StaticLookup;

fn greeter() -> ServiceDefinition {
    ServiceDefinition::from_parts("app", "Greeter", "greeter.internal", 8080)
        .expect("invalid definition")
}

fn addresses(cache: &InstanceCacheManager) -> Vec<String> {
    cache
        .get_or_create_versioned_cache("app", "Greeter", "0.0.0+")
        .unwrap()
        .data()
        .iter()
        .flat_map(|instance| instance.endpoints.clone())
        .collect()
}

#[tokio::test]
async fn probing_fills_the_cache() {
    // Arrange
    let lookup = StaticLookup::default();
    lookup.add_instance("greeter.internal", "rest://10.0.0.1:8080", "1.0.0");
    lookup.add_instance("greeter.internal", "rest://10.0.0.2:8080", "1.0.0");
    let cache = Arc::new(InstanceCacheManager::new());
    let probe = EndpointProbe::builder(lookup.clone(), cache.clone())
        .service(greeter())
        .build();
    assert!(!cache.is_ready());

    // Act
    probe.probe_once().await.unwrap();

    // Assert
    assert!(cache.is_ready());
    assert_eq!(
        addresses(&cache),
        ["rest://10.0.0.1:8080", "rest://10.0.0.2:8080"]
    );
}

#[tokio::test]
async fn versions_only_move_on_changes() {
    let lookup = StaticLookup::default();
    lookup.add_instance("greeter.internal", "rest://10.0.0.1:8080", "1.0.0");
    let cache = Arc::new(InstanceCacheManager::new());
    let probe = EndpointProbe::builder(lookup.clone(), cache.clone())
        .service(greeter())
        .build();

    let version = || {
        cache
            .get_or_create_versioned_cache("app", "Greeter", "0.0.0+")
            .unwrap()
            .version()
    };

    probe.probe_once().await.unwrap();
    let first = version();
    probe.probe_once().await.unwrap();
    assert_eq!(version(), first);

    lookup.add_instance("greeter.internal", "rest://10.0.0.2:8080", "1.0.0");
    probe.probe_once().await.unwrap();
    assert!(version() > first);
}

#[tokio::test]
async fn failed_lookups_keep_the_previous_instances() {
    let lookup = StaticLookup::default();
    lookup.add_instance("greeter.internal", "rest://10.0.0.1:8080", "1.0.0");
    let cache = Arc::new(InstanceCacheManager::new());
    let probe = EndpointProbe::builder(lookup.clone(), cache.clone())
        .service(greeter())
        .build();
    probe.probe_once().await.unwrap();

    lookup.set_failing(true);
    let err = probe.probe_once().await.unwrap_err();

    assert!(err.to_string().contains("greeter.internal"), "{}", err);
    assert_eq!(addresses(&cache), ["rest://10.0.0.1:8080"]);
}

#[tokio::test]
async fn a_vanished_host_leaves_no_address() {
    let lookup = StaticLookup::default();
    lookup.add_instance("greeter.internal", "rest://10.0.0.1:8080", "1.0.0");
    let cache = Arc::new(InstanceCacheManager::new());
    let probe = EndpointProbe::builder(lookup.clone(), cache.clone())
        .service(greeter())
        .build();
    probe.probe_once().await.unwrap();

    lookup.remove("greeter.internal");
    probe.probe_once().await.unwrap();

    assert!(addresses(&cache).is_empty());
    let handler = Arc::new(LoadBalanceHandler::builder(cache.clone()).build());
    let (chain, recorder) = tests::handlers::recording_chain(handler);
    let (response, receiver) = meshroute::AsyncResponse::channel();
    meshroute::Invocation::new("app", "Greeter", "1.0.0+", "sayHello", chain).next(response);
    let err = receiver.await.unwrap().unwrap_err();
    assert!(err.is_no_address_found());
    assert!(recorder.calls().is_empty());
}

#[tokio::test]
async fn every_service_is_probed_even_when_one_fails() {
    let lookup = StaticLookup::default();
    lookup.add_instance("echo.internal", "rest://10.0.1.1:8080", "2.0.0");
    let cache = Arc::new(InstanceCacheManager::new());
    let probe = EndpointProbe::builder(lookup.clone(), cache.clone())
        .service(greeter())
        .service(ServiceDefinition::from_parts("app", "Echo", "echo.internal", 8080).unwrap())
        .build();

    lookup.set_failing(true);
    assert!(probe.probe_once().await.is_err());
    assert_eq!(lookup.lookups(), 2);
}

#[tokio::test]
async fn spawned_probe_follows_churn() {
    // Steps:
    //  1. Start a probe with a short interval over an empty lookup.
    //  2. Publish an instance and wait for a call to be routed to it.
    //  3. Replace it with another instance and wait again.
    // What we want to test:
    //  Calls follow the instances the probe finds without rebuilding the handler.
    let lookup = StaticLookup::default();
    let cache = Arc::new(InstanceCacheManager::new());
    let probe_interval = tokio::time::Duration::from_millis(3);
    let probe = EndpointProbe::builder(lookup.clone(), cache.clone())
        .service(greeter())
        .probe_interval(probe_interval)
        .build()
        .spawn();

    let handler = Arc::new(LoadBalanceHandler::builder(cache.clone()).build());
    let (chain, recorder) = tests::handlers::recording_chain(handler);

    for address in ["rest://10.0.0.1:8080", "rest://10.0.0.2:8080"] {
        lookup.set(
            "greeter.internal",
            vec![MicroserviceInstance::new(address, "1.0.0", [address])],
        );
        // Give time to the probe to run
        tokio::time::sleep(probe_interval * 5).await;

        let (response, receiver) = meshroute::AsyncResponse::channel();
        meshroute::Invocation::new("app", "Greeter", "1.0.0+", "sayHello", chain.clone())
            .next(response);
        receiver.await.unwrap().unwrap();
    }

    probe.abort();
    assert_eq!(recorder.calls(), ["10.0.0.1:8080", "10.0.0.2:8080"]);
}

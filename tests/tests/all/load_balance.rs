use meshroute::{
    AsyncResponse, ChildMap, DiscoveryContext, DiscoveryError, DiscoveryFilter, DiscoveryTreeNode,
    InstanceCacheManager, InstanceStatus, InstanceStatusDiscoveryFilter, Invocation,
    InvocationError, LoadBalanceHandler, MicroserviceInstance, Response,
};
use std::sync::Arc;
use tests::handlers::recording_chain;

fn greeter_source() -> Arc<InstanceCacheManager> {
    let source = Arc::new(InstanceCacheManager::new());
    source.update(
        "app",
        "Greeter",
        vec![
            MicroserviceInstance::new("i-1", "1.0.0", ["rest://10.0.0.1:8080"]),
            MicroserviceInstance::new("i-2", "1.0.0", ["rest://10.0.0.2:8080"]),
            MicroserviceInstance::new("i-3", "1.0.0", ["rest://10.0.0.3:8080"]),
        ],
    );
    source
}

async fn call(invocation: Invocation) -> Response {
    let (response, receiver) = AsyncResponse::channel();
    invocation.next(response);
    receiver.await.expect("response was dropped")
}

#[tokio::test]
async fn calls_rotate_over_the_endpoints() {
    // Arrange
    let handler = LoadBalanceHandler::builder(greeter_source()).build();
    let (chain, recorder) = recording_chain(Arc::new(handler));

    // Act
    for _ in 0..4 {
        let invocation = Invocation::new("app", "Greeter", "1.0.0+", "sayHello", chain.clone());
        call(invocation).await.expect("call failed");
    }

    // Assert
    assert_eq!(
        recorder.calls(),
        [
            "10.0.0.1:8080",
            "10.0.0.2:8080",
            "10.0.0.3:8080",
            "10.0.0.1:8080"
        ]
    );
}

#[tokio::test]
async fn rotation_follows_the_order_of_the_source() {
    let source = Arc::new(InstanceCacheManager::new());
    source.update(
        "app",
        "Greeter",
        vec![
            MicroserviceInstance::new("node-c", "1.0.0", ["rest://10.0.0.1:8080"]),
            MicroserviceInstance::new("node-a", "1.0.0", ["rest://10.0.0.2:8080"]),
            MicroserviceInstance::new("node-b", "1.0.0", ["rest://10.0.0.3:8080"]),
        ],
    );
    let (chain, recorder) = recording_chain(Arc::new(LoadBalanceHandler::builder(source).build()));

    for _ in 0..4 {
        call(Invocation::new("app", "Greeter", "1.0.0+", "sayHello", chain.clone()))
            .await
            .unwrap();
    }

    assert_eq!(
        recorder.calls(),
        [
            "10.0.0.1:8080",
            "10.0.0.2:8080",
            "10.0.0.3:8080",
            "10.0.0.1:8080"
        ]
    );
}

#[tokio::test]
async fn no_address_found_does_not_reach_the_transport() {
    let source = Arc::new(InstanceCacheManager::new());
    source.update("app", "Ghost", vec![]);
    let (chain, recorder) = recording_chain(Arc::new(LoadBalanceHandler::builder(source).build()));

    let err = call(Invocation::new("app", "Ghost", "1.0.0+", "haunt", chain))
        .await
        .unwrap_err();

    assert!(err.is_no_address_found());
    let message = err.to_string();
    assert!(message.contains("Ghost"), "{}", message);
    assert!(message.contains("1.0.0+"), "{}", message);
    assert!(recorder.calls().is_empty());
}

#[tokio::test]
async fn instances_that_are_down_are_skipped() {
    let source = Arc::new(InstanceCacheManager::new());
    source.update(
        "app",
        "Greeter",
        vec![
            MicroserviceInstance::new("i-1", "1.0.0", ["rest://10.0.0.1:8080"])
                .with_status(InstanceStatus::Down),
            MicroserviceInstance::new("i-2", "1.0.0", ["rest://10.0.0.2:8080"]),
        ],
    );
    let handler = LoadBalanceHandler::builder(source)
        .add_filter(Arc::new(InstanceStatusDiscoveryFilter::new()))
        .build();
    let (chain, recorder) = recording_chain(Arc::new(handler));

    for _ in 0..3 {
        call(Invocation::new("app", "Greeter", "1.0.0+", "sayHello", chain.clone()))
            .await
            .unwrap();
    }

    assert_eq!(recorder.calls(), ["10.0.0.2:8080"; 3]);
}

#[tokio::test]
async fn an_unready_source_is_not_reported_as_missing_addresses() {
    let source = Arc::new(InstanceCacheManager::new());
    let (chain, _recorder) = recording_chain(Arc::new(LoadBalanceHandler::builder(source).build()));

    let err = call(Invocation::new("app", "Greeter", "1.0.0+", "sayHello", chain))
        .await
        .unwrap_err();

    assert!(!err.is_no_address_found());
    assert!(matches!(
        err,
        InvocationError::Discovery(DiscoveryError::Unready { .. })
    ));
}

struct BrokenFilter;

impl DiscoveryFilter for BrokenFilter {
    fn order(&self) -> i32 {
        10
    }

    fn group(&self) -> &str {
        "broken"
    }

    fn is_grouping_filter(&self) -> bool {
        false
    }

    fn init(&self, _context: &DiscoveryContext, _parent: &DiscoveryTreeNode) -> anyhow::Result<ChildMap> {
        anyhow::bail!("registry metadata is corrupt")
    }

    fn find_child_name(&self, _context: &mut DiscoveryContext, _parent: &Arc<DiscoveryTreeNode>) -> String {
        self.group().to_string()
    }
}

#[tokio::test]
async fn filter_failures_fail_the_call() {
    let handler = LoadBalanceHandler::builder(greeter_source())
        .add_filter(Arc::new(BrokenFilter))
        .build();
    let (chain, recorder) = recording_chain(Arc::new(handler));

    let err = call(Invocation::new("app", "Greeter", "1.0.0+", "sayHello", chain))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        InvocationError::Discovery(DiscoveryError::Filter { ref filter, .. }) if filter == "broken"
    ));
    assert!(recorder.calls().is_empty());
}

#[tokio::test]
async fn new_instances_are_picked_up_after_an_update() {
    let source = greeter_source();
    let (chain, recorder) = recording_chain(Arc::new(
        LoadBalanceHandler::builder(source.clone()).build(),
    ));
    call(Invocation::new("app", "Greeter", "1.0.0+", "sayHello", chain.clone()))
        .await
        .unwrap();

    source.update(
        "app",
        "Greeter",
        vec![MicroserviceInstance::new("i-9", "1.0.0", ["rest://10.0.0.9:8080"])],
    );
    for _ in 0..2 {
        call(Invocation::new("app", "Greeter", "1.0.0+", "sayHello", chain.clone()))
            .await
            .unwrap();
    }

    assert_eq!(
        recorder.calls(),
        ["10.0.0.1:8080", "10.0.0.9:8080", "10.0.0.9:8080"]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_calls_spread_evenly() {
    let handler = LoadBalanceHandler::builder(greeter_source()).build();
    let (chain, recorder) = recording_chain(Arc::new(handler));

    let tasks: Vec<_> = (0..300)
        .map(|_| {
            let chain = chain.clone();
            tokio::spawn(async move {
                call(Invocation::new("app", "Greeter", "1.0.0+", "sayHello", chain)).await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let calls = recorder.calls();
    for address in ["10.0.0.1:8080", "10.0.0.2:8080", "10.0.0.3:8080"] {
        assert_eq!(calls.iter().filter(|called| *called == address).count(), 100);
    }
}

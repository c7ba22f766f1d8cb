use meshroute::{
    AsyncResponse, EndpointDiscoveryFilter, HandlerChain, InstanceCacheManager, Invocation,
    InvocationError, LoadBalanceHandler, MicroserviceInstance, ResponseBody, TransportHandler,
};
use std::sync::Arc;

fn mixed_source() -> Arc<InstanceCacheManager> {
    let source = Arc::new(InstanceCacheManager::new());
    source.update(
        "app",
        "Greeter",
        vec![
            MicroserviceInstance::new(
                "i-1",
                "1.0.0",
                ["rest://10.0.0.1:8080", "highway://10.0.0.1:7070"],
            ),
            MicroserviceInstance::new("i-2", "1.0.0", ["highway://10.0.0.2:7070"]),
        ],
    );
    source
}

/// `handler` followed by a transport answering with `transport@address` of
/// the endpoint it was handed.
fn echo_chain(handler: LoadBalanceHandler) -> HandlerChain {
    let transport = tower::service_fn(|invocation: Invocation| async move {
        let endpoint = invocation.endpoint().expect("unrouted invocation");
        let body = format!(
            "{}@{}",
            endpoint.transport().unwrap_or("any"),
            endpoint.address()
        );
        Ok::<ResponseBody, std::io::Error>(Box::new(body))
    });
    HandlerChain::new(vec![
        Arc::new(handler),
        Arc::new(TransportHandler::new(transport)),
    ])
}

async fn call(invocation: Invocation) -> Result<String, InvocationError> {
    let (response, receiver) = AsyncResponse::channel();
    invocation.next(response);
    let body = receiver.await.expect("response was dropped")?;
    Ok(*body.downcast::<String>().expect("unexpected body"))
}

#[tokio::test]
async fn invocations_are_routed_by_transport() {
    let chain = echo_chain(LoadBalanceHandler::builder(mixed_source()).build());

    let mut bodies = Vec::new();
    for _ in 0..3 {
        let invocation = Invocation::new("app", "Greeter", "1.0.0+", "sayHello", chain.clone())
            .with_transport("highway");
        bodies.push(call(invocation).await.unwrap());
    }

    assert_eq!(
        bodies,
        [
            "highway@10.0.0.1:7070",
            "highway@10.0.0.2:7070",
            "highway@10.0.0.1:7070"
        ]
    );
}

#[tokio::test]
async fn unsupported_transports_find_no_address() {
    let handler = LoadBalanceHandler::builder(mixed_source())
        .endpoint_filter(EndpointDiscoveryFilter::new().with_transports(["rest"]))
        .build();
    let chain = echo_chain(handler);

    let routed = call(
        Invocation::new("app", "Greeter", "1.0.0+", "sayHello", chain.clone()).with_transport("rest"),
    )
    .await
    .unwrap();
    assert_eq!(routed, "rest@10.0.0.1:8080");

    let err = call(
        Invocation::new("app", "Greeter", "1.0.0+", "sayHello", chain).with_transport("highway"),
    )
    .await
    .unwrap_err();
    assert!(err.is_no_address_found());
}

#[tokio::test]
async fn transport_errors_reach_the_caller() {
    let transport = tower::service_fn(|_invocation: Invocation| async move {
        Err::<ResponseBody, _>(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        ))
    });
    let chain = HandlerChain::new(vec![
        Arc::new(LoadBalanceHandler::builder(mixed_source()).build()),
        Arc::new(TransportHandler::new(transport)),
    ]);

    let err = call(Invocation::new("app", "Greeter", "1.0.0+", "sayHello", chain))
        .await
        .unwrap_err();

    let source = std::error::Error::source(&err).expect("transport error without source");
    assert_eq!(source.to_string(), "connection refused");
    assert!(matches!(err, InvocationError::Transport(_)));
}

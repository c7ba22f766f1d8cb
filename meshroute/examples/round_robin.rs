use meshroute::{
    AsyncResponse, EndpointProbe, HandlerChain, InstanceCacheManager, InstanceStatusDiscoveryFilter,
    Invocation, LoadBalanceHandler, ResponseBody, ServiceDefinition, TransportHandler,
    ZoneAwareDiscoveryFilter,
};
use std::sync::Arc;
use tests::lookup::StaticLookup;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A static table stands in for DNS so the example runs anywhere.
    let lookup = StaticLookup::default();
    lookup.add_instance("greeter.internal", "rest://10.0.0.1:8080", "1.0.0");
    lookup.add_instance("greeter.internal", "rest://10.0.0.2:8080", "1.0.0");
    lookup.add_instance("greeter.internal", "rest://10.0.0.3:8080", "0.9.0");

    // Resolve once before the first call so the cache is never unready.
    let cache = Arc::new(InstanceCacheManager::new());
    let probe = EndpointProbe::builder(lookup, cache.clone())
        .service(ServiceDefinition::from_parts("app", "Greeter", "greeter.internal", 8080)?)
        .build();
    probe.probe_once().await?;
    let _probe = probe.spawn();

    let handler = LoadBalanceHandler::builder(cache)
        .add_filter(Arc::new(InstanceStatusDiscoveryFilter::new()))
        .add_filter(Arc::new(ZoneAwareDiscoveryFilter::new("eu-west", "eu-west-1a")))
        .build();

    // The transport just reports where each call was sent.
    let transport = tower::service_fn(|invocation: Invocation| async move {
        let endpoint = invocation.endpoint().map(ToString::to_string);
        Ok::<ResponseBody, std::io::Error>(Box::new(endpoint.unwrap_or_default()))
    });
    let chain = HandlerChain::new(vec![
        Arc::new(handler),
        Arc::new(TransportHandler::new(transport)),
    ]);

    for _ in 0..4 {
        let (response, receiver) = AsyncResponse::channel();
        Invocation::new("app", "Greeter", "1.0.0+", "sayHello", chain.clone()).next(response);

        let body = receiver.await??;
        println!("RESPONSE={:?}", body.downcast::<String>());
    }

    Ok(())
}

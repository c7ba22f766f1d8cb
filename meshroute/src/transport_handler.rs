//! Terminal stage bridging the handler chain to a [`tower`] service.

use crate::{AsyncResponse, BoxError, Handler, Invocation, InvocationError, ResponseBody};
use tower::ServiceExt;
use tower_service::Service;
use tracing_futures::Instrument;

/// Sends routed invocations through a transport service.
///
/// The service is called on a spawned task, so `handle` returns as soon as the
/// call is in flight and the response completes when the service resolves.
///
/// ```
/// use meshroute::{AsyncResponse, HandlerChain, Invocation, ResponseBody, TransportHandler};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() {
/// let transport = tower::service_fn(|invocation: Invocation| async move {
///     let address = invocation.endpoint().unwrap().address().to_string();
///     Ok::<ResponseBody, std::io::Error>(Box::new(address))
/// });
///
/// let chain = HandlerChain::new(vec![Arc::new(TransportHandler::new(transport))]);
/// let mut invocation = Invocation::new("app", "Greeter", "1.0.0+", "sayHello", chain);
/// invocation
///     .set_endpoint(meshroute::Endpoint::parse("rest://10.0.0.1:8080", "i-1"))
///     .unwrap();
///
/// let (response, receiver) = AsyncResponse::channel();
/// invocation.next(response);
///
/// let body = receiver.await.unwrap().unwrap();
/// assert_eq!(*body.downcast::<String>().unwrap(), "10.0.0.1:8080");
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TransportHandler<S> {
    service: S,
}

impl<S> TransportHandler<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

impl<S> Handler for TransportHandler<S>
where
    S: Service<Invocation, Response = ResponseBody> + Clone + Send + Sync + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send + 'static,
{
    fn handle(&self, invocation: Invocation, response: AsyncResponse) {
        let operation = invocation.microservice_qualified_name().to_string();

        let endpoint = match invocation.endpoint() {
            Some(endpoint) => endpoint.to_string(),
            None => {
                response.consumer_fail(InvocationError::NoEndpointSelected { operation });
                return;
            }
        };

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                response.consumer_fail(InvocationError::RuntimeUnavailable { operation });
                return;
            }
        };

        let span = tracing::debug_span!("transport", %operation, %endpoint);
        let service = self.service.clone();
        runtime.spawn(
            async move {
                let outcome = service
                    .oneshot(invocation)
                    .await
                    .map_err(|err| InvocationError::Transport(err.into()));
                if let Err(err) = &outcome {
                    tracing::debug!("call failed: {}", err);
                }
                response.complete(outcome);
            }
            .instrument(span),
        );
    }
}

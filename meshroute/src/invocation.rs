//! The per-call routing record and the handler chain it travels through.

use crate::{Endpoint, InvocationError};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Successful result of a call, left opaque: decoding it belongs to the transport.
pub type ResponseBody = Box<dyn Any + Send>;

/// Outcome delivered to an [`AsyncResponse`].
pub type Response = Result<ResponseBody, InvocationError>;

/// Completion callback of one invocation.
///
/// Every completing method consumes the response, so a call is completed at
/// most once. Dropping it without completing leaves the caller waiting, which
/// for [`AsyncResponse::channel`] shows up as a closed receiver.
pub struct AsyncResponse {
    callback: Box<dyn FnOnce(Response) + Send>,
}

impl AsyncResponse {
    pub fn new<F>(callback: F) -> Self
    where
        F: FnOnce(Response) + Send + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }

    /// A response that forwards its outcome to the returned receiver.
    pub fn channel() -> (Self, oneshot::Receiver<Response>) {
        let (sender, receiver) = oneshot::channel();
        let response = Self::new(move |outcome| {
            // The caller may have given up waiting.
            let _ = sender.send(outcome);
        });
        (response, receiver)
    }

    pub fn complete(self, response: Response) {
        (self.callback)(response)
    }

    pub fn success<T: Any + Send>(self, body: T) {
        self.complete(Ok(Box::new(body)))
    }

    /// Fail the call on the consumer side, before anything reached the provider.
    pub fn consumer_fail(self, error: InvocationError) {
        self.complete(Err(error))
    }
}

impl fmt::Debug for AsyncResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncResponse").finish_non_exhaustive()
    }
}

/// One stage of the request pipeline.
///
/// A handler either forwards with [`Invocation::next`] or completes the
/// response itself. It must not block waiting for the rest of the chain.
pub trait Handler: Send + Sync {
    fn handle(&self, invocation: Invocation, response: AsyncResponse);
}

/// The ordered stages every invocation of a consumer goes through.
#[derive(Clone)]
pub struct HandlerChain(Arc<[Arc<dyn Handler>]>);

impl HandlerChain {
    pub fn new(handlers: Vec<Arc<dyn Handler>>) -> Self {
        Self(handlers.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerChain")
            .field("len", &self.0.len())
            .finish()
    }
}

/// Routing record of one outgoing call.
///
/// The invocation is owned by whichever stage is running; forwarding moves it
/// to the next stage.
pub struct Invocation {
    app_id: String,
    microservice_name: String,
    version_rule: String,
    qualified_name: String,
    transport_name: Option<String>,
    endpoint: Option<Endpoint>,
    args: Vec<Box<dyn Any + Send>>,
    chain: HandlerChain,
    handler_index: usize,
}

impl Invocation {
    /// An invocation of `operation` on `microservice_name` that will run through `chain`.
    pub fn new(
        app_id: impl Into<String>,
        microservice_name: impl Into<String>,
        version_rule: impl Into<String>,
        operation: &str,
        chain: HandlerChain,
    ) -> Self {
        let microservice_name = microservice_name.into();
        let qualified_name = format!("{}.{}", microservice_name, operation);
        Self {
            app_id: app_id.into(),
            microservice_name,
            version_rule: version_rule.into(),
            qualified_name,
            transport_name: None,
            endpoint: None,
            args: Vec::new(),
            chain,
            handler_index: 0,
        }
    }

    /// Only route to endpoints of this transport.
    pub fn with_transport(self, transport_name: impl Into<String>) -> Self {
        Self {
            transport_name: Some(transport_name.into()),
            ..self
        }
    }

    pub fn with_args(self, args: Vec<Box<dyn Any + Send>>) -> Self {
        Self { args, ..self }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn microservice_name(&self) -> &str {
        &self.microservice_name
    }

    pub fn microservice_version_rule(&self) -> &str {
        &self.version_rule
    }

    /// `microservice.operation`, used to name the call in logs and errors.
    pub fn microservice_qualified_name(&self) -> &str {
        &self.qualified_name
    }

    pub fn transport_name(&self) -> Option<&str> {
        self.transport_name.as_deref()
    }

    pub fn args(&self) -> &[Box<dyn Any + Send>] {
        &self.args
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    /// Route this call to `endpoint`. The endpoint can be chosen only once.
    pub fn set_endpoint(&mut self, endpoint: Endpoint) -> Result<(), InvocationError> {
        if self.endpoint.is_some() {
            return Err(InvocationError::EndpointAlreadySelected {
                operation: self.qualified_name.clone(),
            });
        }
        self.endpoint = Some(endpoint);
        Ok(())
    }

    /// Hand the invocation to the next stage of its chain.
    ///
    /// Running past the last stage fails the response: the terminal stage is
    /// expected to complete it.
    pub fn next(mut self, response: AsyncResponse) {
        let handler = match self.chain.0.get(self.handler_index) {
            Some(handler) => Arc::clone(handler),
            None => {
                let operation = self.qualified_name;
                response.consumer_fail(InvocationError::ChainExhausted { operation });
                return;
            }
        };
        self.handler_index += 1;
        handler.handle(self, response);
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("app_id", &self.app_id)
            .field("operation", &self.qualified_name)
            .field("version_rule", &self.version_rule)
            .field("transport_name", &self.transport_name)
            .field("endpoint", &self.endpoint)
            .field("handler_index", &self.handler_index)
            .finish_non_exhaustive()
    }
}

use crate::error::Error;
use crate::http::{Request, Response};
use crate::service::Services;

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

/// What a handler hands back to the dispatcher.
///
/// The kernel normalizes this into a [`Response`]: JSON values become a
/// JSON response, text becomes plain text, `Empty` becomes 204.
#[derive(Debug)]
pub enum Reply {
    Response(Response),
    Json(Value),
    Text(String),
    Empty,
}

/// Encode any serializable value as a JSON reply.
///
/// Values that cannot be encoded surface as a dispatcher-internal error.
pub fn json<T: Serialize>(value: T) -> Result<Reply, Error> {
    serde_json::to_value(value)
        .map(Reply::Json)
        .map_err(|_| Error::internal("Handler returned unsupported response type"))
}

/// A type a handler may return.
pub trait Respond {
    fn respond(self) -> Result<Reply, Error>;
}

impl Respond for Reply {
    fn respond(self) -> Result<Reply, Error> {
        Ok(self)
    }
}

impl Respond for Response {
    fn respond(self) -> Result<Reply, Error> {
        Ok(Reply::Response(self))
    }
}

impl Respond for Value {
    fn respond(self) -> Result<Reply, Error> {
        Ok(Reply::Json(self))
    }
}

impl Respond for String {
    fn respond(self) -> Result<Reply, Error> {
        Ok(Reply::Text(self))
    }
}

impl Respond for &'static str {
    fn respond(self) -> Result<Reply, Error> {
        Ok(Reply::Text(self.to_owned()))
    }
}

impl Respond for () {
    fn respond(self) -> Result<Reply, Error> {
        Ok(Reply::Empty)
    }
}

impl<T, E> Respond for Result<T, E>
where
    T: Respond,
    E: Into<Error>,
{
    fn respond(self) -> Result<Reply, Error> {
        self.map_err(Into::into).and_then(Respond::respond)
    }
}

/// A handler registered in the container by id, the dynamic counterpart of
/// a plain function route target.
pub trait RequestHandler: Send + Sync {
    fn call(&self, services: &Services, req: Request) -> Result<Reply, Error>;
}

pub type HandlerFn = dyn Fn(Request) -> Result<Reply, Error> + Send + Sync;
pub type ServiceHandlerFn = dyn Fn(&Services, Request) -> Result<Reply, Error> + Send + Sync;

/// A route's target, classified once at registration into one of a closed
/// set of calling conventions.
#[derive(Clone)]
pub enum Handler {
    /// A plain function of the request.
    Func(Arc<HandlerFn>),
    /// A function that also wants the service locator.
    WithServices(Arc<ServiceHandlerFn>),
    /// A [`RequestHandler`] resolved from the service locator by id at
    /// dispatch time.
    Service(String),
}

impl Handler {
    /// Wrap a plain closure handler.
    pub fn new<F, R>(f: F) -> Handler
    where
        F: Fn(Request) -> R + Send + Sync + 'static,
        R: Respond,
    {
        Handler::Func(Arc::new(move |req| f(req).respond()))
    }

    /// Wrap a closure that receives the service locator alongside the
    /// request.
    pub fn with_services<F, R>(f: F) -> Handler
    where
        F: Fn(&Services, Request) -> R + Send + Sync + 'static,
        R: Respond,
    {
        Handler::WithServices(Arc::new(move |services, req| f(services, req).respond()))
    }

    /// Reference a [`RequestHandler`] registered in the service locator.
    pub fn service(id: impl Into<String>) -> Handler {
        Handler::Service(id.into())
    }

    pub(crate) fn call(&self, services: &Services, req: Request) -> Result<Reply, Error> {
        match self {
            Handler::Func(f) => f(req),
            Handler::WithServices(f) => f(services, req),
            Handler::Service(id) => {
                let handler = services.handler(id).ok_or_else(|| {
                    Error::config(format!("request handler '{id}' is not registered"))
                })?;
                handler.call(services, req)
            }
        }
    }
}

/// Conversion accepted by the route registration helpers, so both plain
/// closures and explicit [`Handler`]s can be passed.
pub trait IntoHandler<M> {
    fn into_handler(self) -> Handler;
}

/// Marker for the closure-based conversion.
pub struct ByFunc;

/// Marker for the pass-through conversion.
pub struct ByHandler;

impl IntoHandler<ByHandler> for Handler {
    fn into_handler(self) -> Handler {
        self
    }
}

impl<F, R> IntoHandler<ByFunc> for F
where
    F: Fn(Request) -> R + Send + Sync + 'static,
    R: Respond,
{
    fn into_handler(self) -> Handler {
        Handler::new(self)
    }
}

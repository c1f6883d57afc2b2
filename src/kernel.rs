use crate::error::{Error, Translator};
use crate::handler::Reply;
use crate::http::{Request, RequestBody, Response};
use crate::router::Router;
use crate::scope;
use crate::service::Services;
use crate::validate::Source;
use crate::wrap::{self, Chain};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use uuid::Uuid;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Timing metadata handed to the access-log hook.
pub struct AccessEntry {
    pub request_id: String,
    pub duration: Duration,
}

/// The access-log hook, invoked with the finalized response.
pub type AccessLogger = dyn Fn(&Request, &Response, &AccessEntry) + Send + Sync;

/// The request dispatcher.
///
/// One `handle` call serves one request: match, bind parameters, validate,
/// run the middleware-wrapped handler, translate errors, finalize. The
/// kernel holds no per-request state of its own and may be invoked from
/// many threads at once; the route table is frozen once the kernel exists.
pub struct Kernel {
    router: Router,
    chain: Chain,
    translator: Translator,
    services: Arc<Services>,
    access_logger: Option<Arc<AccessLogger>>,
}

impl Kernel {
    pub fn new(
        router: Router,
        chain: Chain,
        translator: Translator,
        services: Arc<Services>,
        access_logger: Option<Arc<AccessLogger>>,
    ) -> Self {
        Self {
            router,
            chain,
            translator,
            services,
            access_logger,
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    /// Reverse-lookup a named route.
    pub fn url_for(
        &self,
        name: &str,
        params: &[(&str, &str)],
        query: &[(&str, &str)],
    ) -> Result<String, Error> {
        self.router.url_for(name, params, query)
    }

    /// Serve one request.
    ///
    /// Never lets an error escape: every failure becomes a JSON response.
    /// A request scope is established for the duration of the call and
    /// torn down even if dispatch unwinds.
    pub fn handle(&self, req: Request) -> Response {
        let started = Instant::now();
        let request_id = req
            .header(REQUEST_ID_HEADER)
            .map(str::to_owned)
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());

        let (req, result) = {
            let _scope = scope::enter(req.clone());
            self.run(req)
        };

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                match &err {
                    Error::Internal { .. } | Error::Configuration(_) => {
                        log::error!("[{request_id}] {} {}: {err}", req.method(), req.path())
                    }
                    _ => log::debug!("[{request_id}] {} {}: {err}", req.method(), req.path()),
                }
                self.translator.translate(&err, &req)
            }
        };

        let response = response.with_header(REQUEST_ID_HEADER, &request_id);
        let entry = AccessEntry {
            request_id,
            duration: started.elapsed(),
        };
        log::debug!(
            "{} {} -> {} in {:?}",
            req.method(),
            req.path(),
            response.status(),
            entry.duration
        );
        if let Some(logger) = &self.access_logger {
            logger(&req, &response, &entry);
        }

        response
    }

    /// Route and dispatch, returning the request actually seen by the
    /// handler (parameter-bound when routing succeeded) alongside the
    /// outcome.
    fn run(&self, req: Request) -> (Request, Result<Response, Error>) {
        let result = self
            .router
            .match_route(req.method(), req.path(), req.host());
        let matched = match result.route {
            Some(matched) => matched,
            None if !result.allowed.is_empty() => {
                return (
                    req,
                    Err(Error::MethodNotAllowed {
                        allowed: result.allowed,
                    }),
                );
            }
            None => {
                let err = Error::RouteNotFound {
                    method: req.method().clone(),
                    path: req.path().to_owned(),
                };
                return (req, Err(err));
            }
        };

        // Bind matched parameters before any middleware sees the request,
        // and let ambient lookups see the bound variant too.
        let req = req.with_params(matched.params);
        scope::update(req.clone());

        let result = self.dispatch(&req, matched.index);
        (req, result)
    }

    fn dispatch(&self, req: &Request, index: usize) -> Result<Response, Error> {
        let route = self
            .router
            .route(index)
            .ok_or_else(|| Error::config(format!("route index {index} vanished")))?;

        if let Some((rules, source)) = route.validation() {
            let data = validation_data(req, source)?;
            let violations = rules.validate(&data);
            if !violations.is_empty() {
                return Err(Error::validation("Validation failed", violations));
            }
        }

        let resolved = route.resolved_stack(&self.chain)?;
        let globals = self.chain.global();
        let mut stack = Vec::with_capacity(globals.len() + resolved.len());
        stack.extend_from_slice(globals);
        stack.extend_from_slice(resolved);

        let handler = route.handler();
        let core = |req: Request| -> Result<Response, Error> {
            handler.call(&self.services, req).map(normalize)
        };

        let response = wrap::run_stack(&stack, req.clone(), &core)?;
        Ok(self.chain.apply_after(req, response))
    }
}

/// Normalize a handler's reply into a response.
fn normalize(reply: Reply) -> Response {
    match reply {
        Reply::Response(response) => response,
        Reply::Json(value) => Response::json(&value),
        Reply::Text(text) => Response::text(text),
        Reply::Empty => Response::empty(),
    }
}

/// Select and shape the data a route's rules run against.
///
/// For body-sourced validation a body that is neither absent nor a map is
/// itself a validation failure, not a silent pass.
fn validation_data(req: &Request, source: Source) -> Result<Map<String, Value>, Error> {
    let pairs_to_map = |pairs: &[(String, String)]| {
        let mut map = Map::new();
        for (key, value) in pairs {
            map.insert(key.clone(), Value::String(value.clone()));
        }
        map
    };

    match source {
        Source::Query => Ok(pairs_to_map(req.query_all())),
        Source::Params => Ok(pairs_to_map(req.params())),
        Source::Body => match req.body() {
            RequestBody::None => Ok(Map::new()),
            RequestBody::Json(Value::Object(map)) => Ok(map.clone()),
            _ => {
                let mut errors = BTreeMap::new();
                errors.insert(
                    "body".to_owned(),
                    vec!["Expected JSON or form data".to_owned()],
                );
                Err(Error::validation("Invalid request body", errors))
            }
        },
    }
}

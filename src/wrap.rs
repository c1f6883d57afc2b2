use crate::error::Error;
use crate::http::{Request, Response};

use std::collections::HashMap;
use std::sync::Arc;

/// A middleware that observes the request and may short-circuit.
pub type BeforeFn = dyn Fn(&Request) -> Result<Option<Response>, Error> + Send + Sync;

/// A middleware that wraps the rest of the chain through [`Next`].
pub type AroundFn =
    dyn for<'a> Fn(Request, Next<'a>) -> Result<Response, Error> + Send + Sync;

/// A middleware run after the main chain has produced a response.
pub type AfterFn = dyn Fn(&Request, Response) -> Response + Send + Sync;

/// A named middleware, invoked with the arguments declared by the route.
pub type NamedFn =
    dyn for<'a> Fn(Request, Next<'a>, &[String]) -> Result<Response, Error> + Send + Sync;

/// An invocable middleware, tagged with its calling convention.
///
/// The convention is fixed at construction, so dispatch never has to
/// inspect the callable again.
#[derive(Clone)]
pub enum Wrap {
    /// `(request) -> response` convention: returning a response
    /// short-circuits the chain, `None` falls through to the next link.
    Before(Arc<BeforeFn>),
    /// `(request, next) -> response` convention: the middleware decides
    /// whether to call the rest of the chain.
    Around(Arc<AroundFn>),
}

impl Wrap {
    pub fn before<F>(f: F) -> Wrap
    where
        F: Fn(&Request) -> Result<Option<Response>, Error> + Send + Sync + 'static,
    {
        Wrap::Before(Arc::new(f))
    }

    pub fn around<F>(f: F) -> Wrap
    where
        F: for<'a> Fn(Request, Next<'a>) -> Result<Response, Error> + Send + Sync + 'static,
    {
        Wrap::Around(Arc::new(f))
    }
}

/// A route-level middleware declaration, resolved against the named
/// registry at dispatch time.
#[derive(Clone)]
pub enum WrapSpec {
    Named { name: String, args: Vec<String> },
    Inline(Wrap),
}

impl WrapSpec {
    /// Parse a `"name"` or `"name:arg1|arg2"` declaration.
    pub fn parse(spec: &str) -> WrapSpec {
        match spec.split_once(':') {
            Some((name, args)) => WrapSpec::Named {
                name: name.to_owned(),
                args: args
                    .split('|')
                    .filter(|arg| !arg.is_empty())
                    .map(str::to_owned)
                    .collect(),
            },
            None => WrapSpec::Named {
                name: spec.to_owned(),
                args: Vec::new(),
            },
        }
    }

    pub(crate) fn named_name(&self) -> Option<&str> {
        match self {
            WrapSpec::Named { name, .. } => Some(name),
            WrapSpec::Inline(_) => None,
        }
    }
}

impl From<&str> for WrapSpec {
    fn from(spec: &str) -> Self {
        WrapSpec::parse(spec)
    }
}

impl From<Wrap> for WrapSpec {
    fn from(wrap: Wrap) -> Self {
        WrapSpec::Inline(wrap)
    }
}

/// The rest of the middleware chain, ending in the route handler.
///
/// One-shot: an around middleware either runs it exactly once or drops it
/// to short-circuit.
pub struct Next<'a> {
    stack: &'a [Wrap],
    core: &'a dyn Fn(Request) -> Result<Response, Error>,
}

impl Next<'_> {
    /// Continue with the remaining chain.
    pub fn run(self, req: Request) -> Result<Response, Error> {
        run_stack(self.stack, req, self.core)
    }
}

/// Run a composed middleware stack around a core handler.
///
/// The first element of `stack` is outermost. A middleware that returns a
/// response without continuing skips everything inside it, including the
/// core handler.
pub fn run_stack(
    stack: &[Wrap],
    req: Request,
    core: &dyn Fn(Request) -> Result<Response, Error>,
) -> Result<Response, Error> {
    match stack.split_first() {
        None => core(req),
        Some((Wrap::Before(f), rest)) => match f(&req)? {
            Some(response) => Ok(response),
            None => run_stack(rest, req, core),
        },
        Some((Wrap::Around(f), rest)) => f(req, Next { stack: rest, core }),
    }
}

/// Registration-time middleware state: the global chain, the after chain,
/// and the named registry that route declarations resolve against.
#[derive(Default)]
pub struct Chain {
    global: Vec<Wrap>,
    after: Vec<Arc<AfterFn>>,
    named: HashMap<String, Arc<NamedFn>>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the global chain; global middleware always precedes
    /// route-level middleware in the composed stack.
    pub fn add_global(&mut self, wrap: Wrap) {
        self.global.push(wrap);
    }

    /// Append an after-middleware; the after chain runs in registration
    /// order once the main chain has produced a response, and is never
    /// skipped by a short-circuit.
    pub fn add_after<F>(&mut self, f: F)
    where
        F: Fn(&Request, Response) -> Response + Send + Sync + 'static,
    {
        self.after.push(Arc::new(f));
    }

    /// Register a named middleware implementation.
    pub fn register_named<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: for<'a> Fn(Request, Next<'a>, &[String]) -> Result<Response, Error>
            + Send
            + Sync
            + 'static,
    {
        self.named.insert(name.into(), Arc::new(f));
    }

    pub fn has_named(&self, name: &str) -> bool {
        self.named.contains_key(name)
    }

    pub(crate) fn global(&self) -> &[Wrap] {
        &self.global
    }

    /// Resolve route-level declarations into invocable middleware, binding
    /// declared arguments into a closure over the named implementation.
    ///
    /// Unknown names are a configuration error. Registration normally
    /// rejects them up front; this is the backstop for routes assembled
    /// without the builder.
    pub fn resolve(&self, specs: &[WrapSpec]) -> Result<Vec<Wrap>, Error> {
        specs
            .iter()
            .map(|spec| match spec {
                WrapSpec::Named { name, args } => {
                    let named = self.named.get(name).cloned().ok_or_else(|| {
                        Error::config(format!("middleware '{name}' is not registered"))
                    })?;
                    let args = args.clone();
                    Ok(Wrap::Around(Arc::new(move |req, next| {
                        named(req, next, &args)
                    })))
                }
                WrapSpec::Inline(wrap) => Ok(wrap.clone()),
            })
            .collect()
    }

    /// Run the after chain over a response.
    pub fn apply_after(&self, req: &Request, mut response: Response) -> Response {
        for f in &self.after {
            response = f(req, response);
        }
        response
    }
}

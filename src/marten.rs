use crate::error::{Error, Translator};
use crate::handler::IntoHandler;
use crate::http::{Request, Response};
use crate::kernel::{AccessEntry, AccessLogger, Kernel};
use crate::router::{HostRule, Router};
use crate::service::Services;
use crate::validate::{Rules, Source};
use crate::wrap::{Chain, Next, Wrap, WrapSpec};

use std::sync::Arc;

use http::Method;

/// The application builder.
///
/// Routes, middleware, and services are registered here at setup time;
/// [`Marten::into_kernel`] freezes everything into a [`Kernel`] for
/// serving. Setup mistakes (unknown middleware names, malformed templates,
/// bad validation rules) fail loudly at registration rather than at first
/// request.
pub struct Marten {
    router: Router,
    chain: Chain,
    translator: Translator,
    services: Arc<Services>,
    access_logger: Option<Arc<AccessLogger>>,
}

impl Marten {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            chain: Chain::new(),
            translator: Translator::new(false),
            services: Arc::new(Services::new()),
            access_logger: None,
        }
    }

    /// Include diagnostic detail in error responses.
    pub fn set_debug(&mut self, debug: bool) -> &mut Self {
        self.translator.set_debug(debug);
        self
    }

    /// The service locator shared with handlers.
    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Append a global middleware; it runs before any route-level
    /// middleware on every request.
    pub fn wrap(&mut self, wrap: Wrap) -> &mut Self {
        self.chain.add_global(wrap);
        self
    }

    /// Append an after-middleware.
    pub fn wrap_after<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&Request, Response) -> Response + Send + Sync + 'static,
    {
        self.chain.add_after(f);
        self
    }

    /// Register a named middleware routes can reference as `"name"` or
    /// `"name:arg1|arg2"`.
    pub fn register_wrap<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: for<'a> Fn(Request, Next<'a>, &[String]) -> Result<Response, Error>
            + Send
            + Sync
            + 'static,
    {
        self.chain.register_named(name, f);
        self
    }

    /// Intercept error translation with a custom handler.
    pub fn set_error_handler<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&Error, &Request) -> Option<Response> + Send + Sync + 'static,
    {
        self.translator.set_custom_handler(f);
        self
    }

    /// Install an access-log hook invoked with every finalized response.
    pub fn set_access_logger<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&Request, &Response, &AccessEntry) + Send + Sync + 'static,
    {
        self.access_logger = Some(Arc::new(f));
        self
    }

    pub fn get<H, M>(&mut self, path: &str, handler: H) -> RouteRef<'_>
    where
        H: IntoHandler<M>,
    {
        self.route(Method::GET, path, handler)
    }

    pub fn post<H, M>(&mut self, path: &str, handler: H) -> RouteRef<'_>
    where
        H: IntoHandler<M>,
    {
        self.route(Method::POST, path, handler)
    }

    pub fn put<H, M>(&mut self, path: &str, handler: H) -> RouteRef<'_>
    where
        H: IntoHandler<M>,
    {
        self.route(Method::PUT, path, handler)
    }

    pub fn patch<H, M>(&mut self, path: &str, handler: H) -> RouteRef<'_>
    where
        H: IntoHandler<M>,
    {
        self.route(Method::PATCH, path, handler)
    }

    pub fn delete<H, M>(&mut self, path: &str, handler: H) -> RouteRef<'_>
    where
        H: IntoHandler<M>,
    {
        self.route(Method::DELETE, path, handler)
    }

    pub fn options<H, M>(&mut self, path: &str, handler: H) -> RouteRef<'_>
    where
        H: IntoHandler<M>,
    {
        self.route(Method::OPTIONS, path, handler)
    }

    /// Register a route and return a handle for chained mutation.
    pub fn route<H, M>(&mut self, method: Method, path: &str, handler: H) -> RouteRef<'_>
    where
        H: IntoHandler<M>,
    {
        let index = self
            .router
            .add_route(method, path, handler.into_handler());
        RouteRef { app: self, index }
    }

    /// Register routes under a path prefix.
    ///
    /// The prefix applies to routes registered inside `f`; nesting groups
    /// concatenates prefixes.
    pub fn group<F>(&mut self, prefix: &str, f: F) -> &mut Self
    where
        F: FnOnce(&mut Marten),
    {
        self.router.push_prefix(prefix);
        f(self);
        self.router.pop_prefix();
        self
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

    /// Freeze the route table and produce the serving kernel.
    pub fn into_kernel(self) -> Kernel {
        Kernel::new(
            self.router,
            self.chain,
            self.translator,
            self.services,
            self.access_logger,
        )
    }
}

impl Default for Marten {
    fn default() -> Self {
        Self::new()
    }
}

/// A registered route, addressed by its stable index in the route table.
///
/// Chained calls patch the table entry in place, so declarations read
/// naturally: `app.get("/users/{id}", show).name("users.show")`.
pub struct RouteRef<'a> {
    app: &'a mut Marten,
    index: usize,
}

impl RouteRef<'_> {
    /// The route's index in the table, usable with
    /// [`Router::update_route`] later.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Attach a middleware: either a `"name"`/`"name:args"` reference to a
    /// named middleware, or an inline [`Wrap`].
    ///
    /// # Panics
    ///
    /// Panics if a named reference does not resolve, so a typo surfaces at
    /// startup instead of as a 500 when the route is first hit.
    pub fn middleware(mut self, spec: impl Into<WrapSpec>) -> Self {
        let spec = spec.into();
        if let Some(name) = spec.named_name() {
            if !self.app.chain.has_named(name) {
                panic!("middleware '{name}' is not registered");
            }
        }
        self.update(|route| route.push_middleware(spec));
        self
    }

    /// Attach a validation rule-set checked against `source`.
    ///
    /// # Panics
    ///
    /// Panics on unknown rule names or malformed rule parameters.
    pub fn validate(mut self, rules: &[(&str, &str)], source: Source) -> Self {
        let rules = match Rules::parse(rules) {
            Ok(rules) => rules,
            Err(err) => panic!("{err}"),
        };
        self.update(|route| route.set_validation(rules, source));
        self
    }

    /// Name the route for reverse lookup. Names are unique; on conflict
    /// the last registration wins.
    pub fn name(mut self, name: &str) -> Self {
        let name = name.to_owned();
        self.update(|route| route.set_name(name));
        self
    }

    /// Constrain the route to a host.
    pub fn host(mut self, rule: HostRule) -> Self {
        self.update(|route| route.set_host(rule));
        self
    }

    fn update(&mut self, patch: impl FnOnce(&mut crate::router::Route)) {
        // The index came from registration, so the entry exists.
        let _ = self.app.router.update_route(self.index, patch);
    }
}

use crate::error::Error;
use crate::handler::Handler;
use crate::template::Template;
use crate::validate::{Rules, Source};
use crate::wrap::{Chain, Wrap, WrapSpec};

use std::collections::HashMap;

use http::Method;
use once_cell::sync::OnceCell;

/// A host constraint attached to a route.
///
/// Comparison is case-insensitive against the request's `Host` header.
#[derive(Debug, Clone)]
pub enum HostRule {
    /// Exact equality.
    Exact(String),
    /// Membership in a list.
    AnyOf(Vec<String>),
    /// A glob pattern where `*` matches any run of characters, e.g.
    /// `*.example.com`.
    Pattern(String),
}

impl HostRule {
    fn matches(&self, host: Option<&str>) -> bool {
        let host = match host {
            Some(host) if !host.is_empty() => host.to_ascii_lowercase(),
            _ => return false,
        };

        match self {
            HostRule::Exact(expected) => expected.eq_ignore_ascii_case(&host),
            HostRule::AnyOf(expected) => expected.iter().any(|e| e.eq_ignore_ascii_case(&host)),
            HostRule::Pattern(pattern) => glob_matches(&pattern.to_ascii_lowercase(), &host),
        }
    }
}

fn glob_matches(pattern: &str, text: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == text,
        Some((prefix, rest)) => {
            let text = match text.strip_prefix(prefix) {
                Some(text) => text,
                None => return false,
            };
            if rest.is_empty() {
                return true;
            }
            (0..=text.len())
                .filter(|at| text.is_char_boundary(*at))
                .any(|at| glob_matches(rest, &text[at..]))
        }
    }
}

/// One registered endpoint.
///
/// Created through [`Router::add_route`] and patched in place through
/// [`Router::update_route`]; immutable once serving begins.
pub struct Route {
    method: Method,
    path: String,
    template: Template,
    handler: Handler,
    middleware: Vec<WrapSpec>,
    validation: Option<(Rules, Source)>,
    name: Option<String>,
    host: Option<HostRule>,
    resolved: OnceCell<Vec<Wrap>>,
}

impl Route {
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The prefix-expanded path template string.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    pub fn middleware(&self) -> &[WrapSpec] {
        &self.middleware
    }

    pub fn validation(&self) -> Option<(&Rules, Source)> {
        self.validation
            .as_ref()
            .map(|(rules, source)| (rules, *source))
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn host(&self) -> Option<&HostRule> {
        self.host.as_ref()
    }

    pub fn push_middleware(&mut self, spec: WrapSpec) {
        self.middleware.push(spec);
        // Invalidate the resolved stack; it re-resolves on next dispatch.
        let _ = self.resolved.take();
    }

    pub fn set_validation(&mut self, rules: Rules, source: Source) {
        self.validation = Some((rules, source));
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn set_host(&mut self, host: HostRule) {
        self.host = Some(host);
    }

    /// Whether the middleware stack has been resolved since the route was
    /// last modified.
    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }

    /// The resolved route-level middleware stack.
    ///
    /// Resolution runs once per route; concurrent first calls may race to
    /// populate, which is harmless since resolution is deterministic.
    pub(crate) fn resolved_stack(&self, chain: &Chain) -> Result<&[Wrap], Error> {
        self.resolved
            .get_or_try_init(|| chain.resolve(&self.middleware))
            .map(Vec::as_slice)
    }
}

/// A successful route match.
pub struct Matched<'r> {
    pub index: usize,
    pub route: &'r Route,
    /// Parameters captured from the path, in template order.
    pub params: Vec<(String, String)>,
}

/// The outcome of a router lookup.
///
/// `route: None` with a non-empty `allowed` set means some route matched
/// the path but not the method (a 405); both empty means no match at all
/// (a 404).
pub struct MatchResult<'r> {
    pub route: Option<Matched<'r>>,
    pub allowed: Vec<Method>,
}

/// The ordered route table.
///
/// Declaration order is the precedence signal: lookups scan in
/// registration order and the first full match wins.
pub struct Router {
    routes: Vec<Route>,
    named: HashMap<String, usize>,
    prefixes: Vec<String>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            named: HashMap::new(),
            prefixes: vec![String::new()],
        }
    }

    /// Register a route, expanding the path against the current prefix
    /// stack, and return its stable index for later in-place updates.
    ///
    /// # Panics
    ///
    /// Panics on a malformed path template; a route table that cannot
    /// match what was declared is a setup bug worth failing loudly over.
    pub fn add_route(&mut self, method: Method, path: &str, handler: Handler) -> usize {
        let full = self.full_path(path);
        let template = match Template::parse(&full) {
            Ok(template) => template,
            Err(err) => panic!("{err}"),
        };

        self.routes.push(Route {
            method,
            path: full,
            template,
            handler,
            middleware: Vec::new(),
            validation: None,
            name: None,
            host: None,
            resolved: OnceCell::new(),
        });

        self.routes.len() - 1
    }

    /// Patch the route at `index` in place.
    ///
    /// If the patch renames the route, the name index is updated: the old
    /// name is dropped and the new one points here. On a name collision
    /// the last registration wins.
    pub fn update_route(
        &mut self,
        index: usize,
        patch: impl FnOnce(&mut Route),
    ) -> Result<(), Error> {
        let (old_name, new_name) = {
            let route = self
                .routes
                .get_mut(index)
                .ok_or_else(|| Error::config(format!("route index {index} not found")))?;
            let old_name = route.name.clone();
            patch(route);
            (old_name, route.name.clone())
        };

        if old_name != new_name {
            if let Some(old) = old_name {
                self.named.remove(&old);
            }
        }
        if let Some(new) = new_name {
            self.named.insert(new, index);
        }

        Ok(())
    }

    pub fn route(&self, index: usize) -> Option<&Route> {
        self.routes.get(index)
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Find the route serving `method` + `path` (+ `host`).
    ///
    /// Routes are scanned in registration order. A route whose path
    /// matches but whose method differs contributes its method to the
    /// allowed set and the scan continues; the first route matching both
    /// wins and stops the scan.
    pub fn match_route<'r>(
        &'r self,
        method: &Method,
        path: &str,
        host: Option<&str>,
    ) -> MatchResult<'r> {
        let mut allowed = Vec::new();

        for (index, route) in self.routes.iter().enumerate() {
            if let Some(rule) = &route.host {
                if !rule.matches(host) {
                    continue;
                }
            }

            let params = match route.template.matches(path) {
                Some(params) => params,
                None => continue,
            };

            if &route.method != method {
                if !allowed.contains(&route.method) {
                    allowed.push(route.method.clone());
                }
                continue;
            }

            return MatchResult {
                route: Some(Matched {
                    index,
                    route,
                    params,
                }),
                allowed,
            };
        }

        MatchResult {
            route: None,
            allowed,
        }
    }

    /// Build the URL for a named route, appending `query` as an encoded
    /// query string when non-empty.
    ///
    /// Unknown names and missing required parameters are configuration
    /// errors: caller bugs, not user-input errors.
    pub fn url_for(
        &self,
        name: &str,
        params: &[(&str, &str)],
        query: &[(&str, &str)],
    ) -> Result<String, Error> {
        let index = self
            .named
            .get(name)
            .ok_or_else(|| Error::config(format!("route '{name}' not found")))?;

        let mut path = self.routes[*index].template.build(params)?;

        if !query.is_empty() {
            let encoded = serde_urlencoded::to_string(query)
                .map_err(|err| Error::config(format!("unencodable query string: {err}")))?;
            path.push('?');
            path.push_str(&encoded);
        }

        Ok(path)
    }

    /// Push a prefix; routes registered from now on have it prepended.
    ///
    /// Prefixes are captured at registration time, so routes registered
    /// before a push/pop bracket are unaffected by it.
    pub fn push_prefix(&mut self, prefix: &str) {
        let top = self.prefixes.last().map(String::as_str).unwrap_or("");
        let combined = format!(
            "{}{}",
            top.trim_end_matches('/'),
            prefix.trim_end_matches('/')
        );
        self.prefixes.push(combined);
    }

    pub fn pop_prefix(&mut self) {
        if self.prefixes.len() > 1 {
            self.prefixes.pop();
        }
    }

    fn full_path(&self, path: &str) -> String {
        let base = self.prefixes.last().map(String::as_str).unwrap_or("");
        let full = format!("{}{}", base.trim_end_matches('/'), path);
        if full.is_empty() {
            "/".to_owned()
        } else {
            full
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

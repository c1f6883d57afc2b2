//! Authentication guards and the middleware built on top of them.

use crate::error::Error;
use crate::http::{Request, Response};
use crate::wrap::{Next, Wrap};

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

/// A pluggable authentication strategy.
///
/// Implementations decide where identity comes from (a session, a bearer
/// token); the framework only asks these three questions.
pub trait Guard: Send + Sync {
    fn is_authenticated(&self) -> bool;

    /// The authenticated user's claims, with roles under a `roles` list or
    /// a single `role` string.
    fn current_user(&self) -> Option<Map<String, Value>>;

    fn user_id(&self) -> Option<String>;
}

/// A registry of named guards with a default.
pub struct Auth {
    guards: HashMap<String, Arc<dyn Guard>>,
    default: String,
}

impl Auth {
    pub fn new(default_guard: impl Into<String>) -> Self {
        Self {
            guards: HashMap::new(),
            default: default_guard.into(),
        }
    }

    pub fn add_guard(&mut self, name: impl Into<String>, guard: impl Guard + 'static) {
        self.guards.insert(name.into(), Arc::new(guard));
    }

    /// Look up a guard by name, or the default guard for `None`.
    pub fn guard(&self, name: Option<&str>) -> Result<&Arc<dyn Guard>, Error> {
        let name = name.unwrap_or(&self.default);
        self.guards
            .get(name)
            .ok_or_else(|| Error::config(format!("auth guard '{name}' is not registered")))
    }

    pub fn is_authenticated(&self, guard: Option<&str>) -> Result<bool, Error> {
        Ok(self.guard(guard)?.is_authenticated())
    }

    pub fn current_user(&self, guard: Option<&str>) -> Result<Option<Map<String, Value>>, Error> {
        Ok(self.guard(guard)?.current_user())
    }

    pub fn user_id(&self, guard: Option<&str>) -> Result<Option<String>, Error> {
        Ok(self.guard(guard)?.user_id())
    }

    /// Whether the current user holds at least one of `roles`.
    pub fn has_any_role(&self, roles: &[String], guard: Option<&str>) -> Result<bool, Error> {
        let user_roles = match self.current_user(guard)? {
            Some(user) => user_roles(&user),
            None => return Ok(false),
        };
        Ok(roles.iter().any(|role| user_roles.contains(role)))
    }

    /// Whether the current user holds every one of `roles`.
    pub fn has_all_roles(&self, roles: &[String], guard: Option<&str>) -> Result<bool, Error> {
        let user_roles = match self.current_user(guard)? {
            Some(user) => user_roles(&user),
            None => return Ok(false),
        };
        Ok(roles.iter().all(|role| user_roles.contains(role)))
    }
}

fn user_roles(user: &Map<String, Value>) -> Vec<String> {
    match user.get("roles").or_else(|| user.get("role")) {
        Some(Value::String(role)) => vec![role.clone()],
        Some(Value::Array(roles)) => roles
            .iter()
            .filter_map(|role| role.as_str().map(str::to_owned))
            .collect(),
        _ => Vec::new(),
    }
}

/// Middleware rejecting unauthenticated requests with 401.
pub fn require(auth: Arc<Auth>) -> Wrap {
    Wrap::before(move |_req| {
        if auth.is_authenticated(None)? {
            Ok(None)
        } else {
            Err(Error::Unauthorized)
        }
    })
}

/// Middleware additionally requiring at least one of `roles`, rejecting
/// with 403 when the user holds none of them.
pub fn require_roles(auth: Arc<Auth>, roles: Vec<String>) -> Wrap {
    Wrap::before(move |_req| {
        if !auth.is_authenticated(None)? {
            return Err(Error::Unauthorized);
        }
        if !auth.has_any_role(&roles, None)? {
            return Err(Error::Forbidden);
        }
        Ok(None)
    })
}

/// Middleware requiring every one of `roles`.
pub fn require_all_roles(auth: Arc<Auth>, roles: Vec<String>) -> Wrap {
    Wrap::before(move |_req| {
        if !auth.is_authenticated(None)? {
            return Err(Error::Unauthorized);
        }
        if !auth.has_all_roles(&roles, None)? {
            return Err(Error::Forbidden);
        }
        Ok(None)
    })
}

/// A named-middleware adapter for role checks, so routes can declare
/// `"role:admin"` or `"role:admin|editor"` and have the arguments bound as
/// the accepted role list.
pub fn role_wrap(
    auth: Arc<Auth>,
) -> impl for<'a> Fn(Request, Next<'a>, &[String]) -> Result<Response, Error> + Send + Sync + 'static
{
    move |req, next, roles| {
        if !auth.is_authenticated(None)? {
            return Err(Error::Unauthorized);
        }
        if !auth.has_any_role(roles, None)? {
            return Err(Error::Forbidden);
        }
        next.run(req)
    }
}

use std::sync::Arc;

use marten::auth::{self, Auth, Guard};
use marten::http::Request;
use marten::Marten;

use http::Method;
use serde_json::{json, Map, Value};

/// A guard with a fixed identity, standing in for a session or token
/// lookup.
struct StaticGuard(Option<Map<String, Value>>);

impl Guard for StaticGuard {
    fn is_authenticated(&self) -> bool {
        self.0.is_some()
    }

    fn current_user(&self) -> Option<Map<String, Value>> {
        self.0.clone()
    }

    fn user_id(&self) -> Option<String> {
        self.0
            .as_ref()
            .and_then(|user| user.get("id"))
            .and_then(|id| id.as_str().map(str::to_owned))
    }
}

fn auth_with(user: Value) -> Arc<Auth> {
    let user = match user {
        Value::Object(map) => Some(map),
        _ => None,
    };
    let mut auth = Auth::new("token");
    auth.add_guard("token", StaticGuard(user));
    Arc::new(auth)
}

fn request(path: &str) -> Request {
    Request::builder(Method::GET, path).build()
}

#[test]
fn anonymous_requests_are_rejected_with_401() {
    let auth = auth_with(Value::Null);

    let mut app = Marten::new();
    app.get("/private", |_req| "secret")
        .middleware(auth::require(auth));
    let kernel = app.into_kernel();

    let response = kernel.handle(request("/private"));
    assert_eq!(response.status(), 401);
    assert_eq!(response.body_json().unwrap()["error"], json!("Unauthorized"));
}

#[test]
fn authenticated_requests_pass() {
    let auth = auth_with(json!({ "id": "7", "roles": ["admin"] }));

    let mut app = Marten::new();
    app.get("/private", |_req| "secret")
        .middleware(auth::require(auth));
    let kernel = app.into_kernel();

    let response = kernel.handle(request("/private"));
    assert_eq!(response.status(), 200);
}

#[test]
fn missing_role_is_403() {
    let auth = auth_with(json!({ "id": "7", "roles": ["viewer"] }));

    let mut app = Marten::new();
    app.get("/admin", |_req| "panel")
        .middleware(auth::require_roles(auth, vec!["admin".to_owned()]));
    let kernel = app.into_kernel();

    let response = kernel.handle(request("/admin"));
    assert_eq!(response.status(), 403);
    assert_eq!(response.body_json().unwrap()["error"], json!("Forbidden"));
}

#[test]
fn role_middleware_reads_arguments_from_the_route() {
    let auth = auth_with(json!({ "id": "7", "roles": ["editor"] }));

    let mut app = Marten::new();
    app.register_wrap("role", auth::role_wrap(auth));
    app.get("/editorial", |_req| "ok")
        .middleware("role:admin|editor");
    app.get("/admin", |_req| "ok").middleware("role:admin");
    let kernel = app.into_kernel();

    assert_eq!(kernel.handle(request("/editorial")).status(), 200);
    assert_eq!(kernel.handle(request("/admin")).status(), 403);
}

#[test]
fn all_roles_are_required_when_asked() {
    let auth = auth_with(json!({ "id": "7", "roles": ["admin"] }));

    let mut app = Marten::new();
    app.get("/super", |_req| "ok").middleware(auth::require_all_roles(
        auth,
        vec!["admin".to_owned(), "owner".to_owned()],
    ));
    let kernel = app.into_kernel();

    assert_eq!(kernel.handle(request("/super")).status(), 403);
}

use std::sync::{Arc, Mutex};

use marten::http::{Request, Response};
use marten::{Marten, Wrap};

use http::Method;
use serde_json::json;

type Log = Arc<Mutex<Vec<&'static str>>>;

fn request(method: Method, path: &str) -> Request {
    Request::builder(method, path).build()
}

#[test]
fn global_then_route_then_handler_then_after() {
    let log: Log = Log::default();

    let mut app = Marten::new();

    let l = log.clone();
    app.wrap(Wrap::around(move |req, next| {
        l.lock().unwrap().push("global-1");
        next.run(req)
    }));
    let l = log.clone();
    app.wrap(Wrap::around(move |req, next| {
        l.lock().unwrap().push("global-2");
        next.run(req)
    }));
    let l = log.clone();
    app.wrap_after(move |_req, response| {
        l.lock().unwrap().push("after");
        response
    });

    let l = log.clone();
    let route_wrap = Wrap::around(move |req, next| {
        l.lock().unwrap().push("route");
        next.run(req)
    });
    let l = log.clone();
    app.get("/", move |_req| {
        l.lock().unwrap().push("handler");
        "ok"
    })
    .middleware(route_wrap);

    let kernel = app.into_kernel();
    let response = kernel.handle(request(Method::GET, "/"));

    assert_eq!(response.status(), 200);
    assert_eq!(
        *log.lock().unwrap(),
        vec!["global-1", "global-2", "route", "handler", "after"]
    );
}

#[test]
fn short_circuit_skips_handler_but_not_after() {
    let log: Log = Log::default();

    let mut app = Marten::new();

    let l = log.clone();
    app.wrap(Wrap::around(move |_req, _next| {
        l.lock().unwrap().push("blocked");
        Ok(Response::json(&json!({ "error": "nope" })).with_status(http::StatusCode::FORBIDDEN))
    }));
    let l = log.clone();
    app.wrap_after(move |_req, response| {
        l.lock().unwrap().push("after");
        response
    });

    let l = log.clone();
    app.get("/", move |_req| {
        l.lock().unwrap().push("handler");
        "ok"
    });

    let kernel = app.into_kernel();
    let response = kernel.handle(request(Method::GET, "/"));

    assert_eq!(response.status(), 403);
    assert_eq!(*log.lock().unwrap(), vec!["blocked", "after"]);
}

#[test]
fn before_middleware_falls_through_unless_it_responds() {
    let log: Log = Log::default();

    let mut app = Marten::new();

    let l = log.clone();
    app.wrap(Wrap::before(move |req| {
        l.lock().unwrap().push("checked");
        if req.header("x-block").is_some() {
            Ok(Some(Response::text("blocked").with_status(
                http::StatusCode::SERVICE_UNAVAILABLE,
            )))
        } else {
            Ok(None)
        }
    }));

    let l = log.clone();
    app.get("/", move |_req| {
        l.lock().unwrap().push("handler");
        "ok"
    });

    let kernel = app.into_kernel();

    let passed = kernel.handle(request(Method::GET, "/"));
    assert_eq!(passed.status(), 200);

    let blocked = kernel.handle(
        Request::builder(Method::GET, "/")
            .header("x-block", "1")
            .build(),
    );
    assert_eq!(blocked.status(), 503);
    assert_eq!(*log.lock().unwrap(), vec!["checked", "handler", "checked"]);
}

#[test]
fn named_middleware_receives_route_arguments() {
    let mut app = Marten::new();

    app.register_wrap("tag", |req, next, args: &[String]| {
        let tag = args.join(",");
        next.run(req).map(|response| response.with_header("x-tag", &tag))
    });

    app.get("/a", |_req| "a").middleware("tag:alpha|beta");
    app.get("/b", |_req| "b").middleware("tag");

    let kernel = app.into_kernel();

    let tagged = kernel.handle(request(Method::GET, "/a"));
    assert_eq!(tagged.headers().get("x-tag").unwrap(), "alpha,beta");

    let bare = kernel.handle(request(Method::GET, "/b"));
    assert_eq!(bare.headers().get("x-tag").unwrap(), "");
}

#[test]
#[should_panic(expected = "middleware 'auht' is not registered")]
fn unknown_named_middleware_fails_at_registration() {
    let mut app = Marten::new();
    app.register_wrap("auth", |req, next, _args: &[String]| next.run(req));
    app.get("/", |_req| "ok").middleware("auht");
}

#[test]
fn after_middleware_can_replace_the_response() {
    let mut app = Marten::new();
    app.wrap_after(|_req, response| response.with_header("x-served-by", "marten"));
    app.get("/", |_req| "ok");

    let kernel = app.into_kernel();
    let response = kernel.handle(request(Method::GET, "/"));
    assert_eq!(response.headers().get("x-served-by").unwrap(), "marten");
}

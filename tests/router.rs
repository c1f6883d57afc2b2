use marten::{Handler, HostRule, Marten, Router};

use http::Method;

fn noop() -> Handler {
    Handler::new(|_req| ())
}

#[test]
fn first_registered_route_wins_on_full_match() {
    let mut router = Router::new();
    router.add_route(Method::GET, "/{slug}", noop());
    let users = router.add_route(Method::GET, "/users", noop());

    let result = router.match_route(&Method::GET, "/users", None);
    let matched = result.route.expect("should match");
    assert_eq!(matched.route.path(), "/{slug}");
    assert_ne!(matched.index, users);
    assert_eq!(matched.params, vec![("slug".to_owned(), "users".to_owned())]);
}

#[test]
fn allowed_methods_come_only_from_path_matches() {
    let mut router = Router::new();
    router.add_route(Method::GET, "/{slug}", noop());
    router.add_route(Method::POST, "/users/{id}", noop());

    let result = router.match_route(&Method::PUT, "/users/123", None);
    assert!(result.route.is_none());
    assert_eq!(result.allowed, vec![Method::POST]);
}

#[test]
fn scan_stops_at_the_first_full_match() {
    let mut router = Router::new();
    router.add_route(Method::POST, "/items", noop());
    router.add_route(Method::GET, "/items", noop());
    router.add_route(Method::DELETE, "/items", noop());

    // The DELETE route sits after the winner and is never scanned.
    let result = router.match_route(&Method::GET, "/items", None);
    assert!(result.route.is_some());
    assert_eq!(result.allowed, vec![Method::POST]);
}

#[test]
fn optional_segment_matches_with_and_without_value() {
    let mut router = Router::new();
    router.add_route(Method::GET, "/search/{query?}", noop());

    let bare = router.match_route(&Method::GET, "/search", None);
    assert!(bare.route.unwrap().params.is_empty());

    let result = router.match_route(&Method::GET, "/search/php", None);
    assert_eq!(
        result.route.unwrap().params,
        vec![("query".to_owned(), "php".to_owned())]
    );
}

#[test]
fn url_for_round_trip() {
    let mut router = Router::new();
    let index = router.add_route(Method::GET, "/users/{id}", noop());
    router
        .update_route(index, |route| route.set_name("users.show"))
        .unwrap();

    let url = router
        .url_for("users.show", &[("id", "10")], &[("tab", "profile")])
        .unwrap();
    assert_eq!(url, "/users/10?tab=profile");

    let bare = router.url_for("users.show", &[("id", "10")], &[]).unwrap();
    assert_eq!(bare, "/users/10");
}

#[test]
fn url_for_failures_are_configuration_errors() {
    let mut router = Router::new();
    let index = router.add_route(Method::GET, "/users/{id}", noop());
    router
        .update_route(index, |route| route.set_name("users.show"))
        .unwrap();

    assert!(router.url_for("users.list", &[], &[]).is_err());
    assert!(router.url_for("users.show", &[], &[]).is_err());
}

#[test]
fn prefixes_apply_only_inside_their_bracket() {
    let mut router = Router::new();
    router.add_route(Method::GET, "/before", noop());
    router.push_prefix("/v1");
    let inside = router.add_route(Method::GET, "/users", noop());
    router.pop_prefix();
    let after = router.add_route(Method::GET, "/after", noop());

    assert_eq!(router.route(inside).unwrap().path(), "/v1/users");
    assert_eq!(router.route(after).unwrap().path(), "/after");
    assert!(router.match_route(&Method::GET, "/v1/users", None).route.is_some());
    assert!(router.match_route(&Method::GET, "/users", None).route.is_none());
}

#[test]
fn nested_prefixes_concatenate() {
    let mut router = Router::new();
    router.push_prefix("/api");
    router.push_prefix("/v2");
    let index = router.add_route(Method::GET, "/users", noop());
    router.pop_prefix();
    router.pop_prefix();

    assert_eq!(router.route(index).unwrap().path(), "/api/v2/users");
}

#[test]
fn renaming_a_route_moves_the_name_index() {
    let mut router = Router::new();
    let index = router.add_route(Method::GET, "/users", noop());
    router
        .update_route(index, |route| route.set_name("old"))
        .unwrap();
    router
        .update_route(index, |route| route.set_name("new"))
        .unwrap();

    assert!(router.url_for("old", &[], &[]).is_err());
    assert_eq!(router.url_for("new", &[], &[]).unwrap(), "/users");
}

#[test]
fn name_conflicts_resolve_to_the_last_registration() {
    let mut router = Router::new();
    let first = router.add_route(Method::GET, "/a", noop());
    let second = router.add_route(Method::GET, "/b", noop());
    router
        .update_route(first, |route| route.set_name("page"))
        .unwrap();
    router
        .update_route(second, |route| route.set_name("page"))
        .unwrap();

    assert_eq!(router.url_for("page", &[], &[]).unwrap(), "/b");
}

#[test]
fn host_rules() {
    let mut router = Router::new();
    let exact = router.add_route(Method::GET, "/", noop());
    router
        .update_route(exact, |route| {
            route.set_host(HostRule::Exact("api.example.com".to_owned()))
        })
        .unwrap();

    assert!(router
        .match_route(&Method::GET, "/", Some("API.Example.com"))
        .route
        .is_some());
    assert!(router
        .match_route(&Method::GET, "/", Some("example.com"))
        .route
        .is_none());
    assert!(router.match_route(&Method::GET, "/", None).route.is_none());
}

#[test]
fn host_patterns_and_lists() {
    let mut app = Marten::new();
    app.get("/", |_req| "any subdomain")
        .host(HostRule::Pattern("*.example.com".to_owned()));
    app.get("/", |_req| "listed")
        .host(HostRule::AnyOf(vec![
            "a.test".to_owned(),
            "b.test".to_owned(),
        ]));
    let kernel = app.into_kernel();

    let router = kernel.router();
    assert!(router
        .match_route(&Method::GET, "/", Some("api.example.com"))
        .route
        .is_some());
    assert!(router
        .match_route(&Method::GET, "/", Some("example.com"))
        .route
        .is_none());

    let listed = router.match_route(&Method::GET, "/", Some("B.TEST"));
    assert_eq!(listed.route.unwrap().route.path(), "/");
}

#[test]
#[should_panic]
fn malformed_template_fails_at_registration() {
    let mut router = Router::new();
    router.add_route(Method::GET, "/a/{x?}/b", noop());
}

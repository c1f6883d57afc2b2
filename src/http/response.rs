use super::{Body, BoxError, Bytes};

use http::header::{HeaderName, CONTENT_TYPE, LOCATION};
use http::{HeaderMap, HeaderValue, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};

use futures_core::Stream;

/// An outbound HTTP response.
///
/// Responses are value objects: `with_*` operations consume the response
/// and return a modified copy. The header map is a multimap, so repeated
/// names such as `Set-Cookie` are preserved as distinct entries for the
/// runtime driver to emit separately.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Body,
}

impl Response {
    fn new(status: StatusCode, content_type: Option<&'static str>, body: Body) -> Response {
        let mut headers = HeaderMap::new();
        if let Some(value) = content_type {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(value));
        }
        Response {
            status,
            headers,
            body,
        }
    }

    /// A JSON response with status 200.
    ///
    /// Values are encoded without escaping forward slashes or non-ASCII
    /// text. Unencodable values degrade to a 500 JSON error payload.
    pub fn json<T: Serialize>(value: &T) -> Response {
        match serde_json::to_vec(value) {
            Ok(bytes) => Response::new(
                StatusCode::OK,
                Some("application/json"),
                Body::once(bytes),
            ),
            Err(_) => Response::error("Failed to encode response body", StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    /// A plain-text response with status 200.
    pub fn text(text: impl Into<String>) -> Response {
        Response::new(
            StatusCode::OK,
            Some("text/plain"),
            Body::once(text.into()),
        )
    }

    /// An HTML response with status 200.
    pub fn html(html: impl Into<String>) -> Response {
        Response::new(StatusCode::OK, Some("text/html"), Body::once(html.into()))
    }

    /// An empty response with status 204.
    pub fn empty() -> Response {
        Response::new(StatusCode::NO_CONTENT, None, Body::empty())
    }

    /// A redirect to `location` with status 302.
    pub fn redirect(location: &str) -> Response {
        let mut response = Response::new(StatusCode::FOUND, None, Body::empty());
        if let Ok(value) = HeaderValue::from_str(location) {
            response.headers.insert(LOCATION, value);
        }
        response
    }

    /// A JSON error payload: `{"error": message}`.
    pub fn error(message: &str, status: StatusCode) -> Response {
        Response::json(&json!({ "error": message })).with_status(status)
    }

    /// A streaming response; the runtime driver polls the stream and emits
    /// chunks as they arrive.
    pub fn stream<S, E>(stream: S) -> Response
    where
        S: Stream<Item = Result<Bytes, E>> + Send + Sync + 'static,
        E: Into<BoxError> + 'static,
    {
        Response::new(StatusCode::OK, None, Body::stream(stream))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn is_stream(&self) -> bool {
        self.body.is_stream()
    }

    /// Take the body out, for serialization onto the transport.
    pub fn into_body(self) -> Body {
        self.body
    }

    /// Return a copy with `name` set to `value`, replacing previous values.
    /// Invalid header names or values leave the response unchanged.
    pub fn with_header(mut self, name: &str, value: &str) -> Response {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Return a copy with `name: value` appended, keeping previous values.
    /// This is how repeated headers such as `Set-Cookie` are accumulated.
    pub fn with_appended_header(mut self, name: &str, value: &str) -> Response {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Response {
        self.status = status;
        self
    }

    pub fn with_body(mut self, body: Body) -> Response {
        self.body = body;
        self
    }

    /// Decode the body as JSON, mainly useful for assertions in tests and
    /// for after-middleware that post-processes payloads.
    pub fn body_json(&self) -> Option<Value> {
        self.body
            .bytes()
            .and_then(|bytes| serde_json::from_slice(bytes).ok())
    }
}

impl Default for Response {
    fn default() -> Self {
        Response::new(StatusCode::OK, None, Body::empty())
    }
}

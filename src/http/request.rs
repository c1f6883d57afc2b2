use super::Bytes;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use http::header::{HeaderName, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Method};
use serde_json::{Map, Value};

/// The parsed body of an inbound request.
///
/// JSON and form-urlencoded payloads are decoded into [`Value`]s at
/// construction time; anything else is kept as raw bytes.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    None,
    Json(Value),
    Raw(Bytes),
}

/// An inbound HTTP request.
///
/// Requests are cheap to clone and immutable: binding route parameters via
/// [`Request::with_params`] produces a new value sharing the underlying
/// data, so each middleware sees the variant appropriate to its position in
/// the pipeline.
#[derive(Debug, Clone)]
pub struct Request {
    shared: Arc<Shared>,
    params: Arc<Vec<(String, String)>>,
}

#[derive(Debug)]
struct Shared {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    cookies: HashMap<String, String>,
    body: RequestBody,
    received_at: SystemTime,
}

impl Request {
    /// Start building a request from its method and path.
    pub fn builder(method: Method, path: impl Into<String>) -> RequestBuilder {
        RequestBuilder {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            cookies: HashMap::new(),
            body: None,
            received_at: None,
        }
    }

    pub fn method(&self) -> &Method {
        &self.shared.method
    }

    pub fn path(&self) -> &str {
        &self.shared.path
    }

    /// The first query value registered under `key`.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.shared
            .query
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn query_all(&self) -> &[(String, String)] {
        &self.shared.query
    }

    /// A header value by case-insensitive name.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.shared.headers.get(key).and_then(|v| v.to_str().ok())
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.shared.headers
    }

    pub fn host(&self) -> Option<&str> {
        self.header("host")
    }

    pub fn cookie(&self, key: &str) -> Option<&str> {
        self.shared.cookies.get(key).map(String::as_str)
    }

    pub fn cookies(&self) -> &HashMap<String, String> {
        &self.shared.cookies
    }

    pub fn body(&self) -> &RequestBody {
        &self.shared.body
    }

    /// A matched route parameter by name.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// When the runtime driver accepted this request.
    pub fn received_at(&self) -> SystemTime {
        self.shared.received_at
    }

    /// Rebind the route parameters, leaving the rest of the request shared.
    pub fn with_params(&self, params: Vec<(String, String)>) -> Request {
        Request {
            shared: self.shared.clone(),
            params: Arc::new(params),
        }
    }
}

/// Builds a [`Request`] from transport-level pieces.
///
/// The runtime driver is expected to feed raw bytes here; body parsing is a
/// construction concern, keyed off the `Content-Type` header.
pub struct RequestBuilder {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    cookies: HashMap<String, String>,
    body: Option<Bytes>,
    received_at: Option<SystemTime>,
}

impl RequestBuilder {
    /// Parse a raw query string into the query map.
    ///
    /// Unparseable input yields an empty map rather than failing request
    /// construction.
    pub fn query_string(mut self, raw: &str) -> Self {
        self.query = serde_urlencoded::from_str(raw).unwrap_or_default();
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Add a header. Names and values that are not valid HTTP are dropped.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn cookie(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(key.into(), value.into());
        self
    }

    /// Attach a raw body; it is parsed according to `Content-Type` when the
    /// request is built.
    pub fn body(mut self, bytes: impl Into<Bytes>) -> Self {
        self.body = Some(bytes.into());
        self
    }

    /// Attach a JSON body, setting the content type.
    pub fn json(self, value: &Value) -> Self {
        self.header("content-type", "application/json")
            .body(value.to_string())
    }

    pub fn received_at(mut self, at: SystemTime) -> Self {
        self.received_at = Some(at);
        self
    }

    pub fn build(self) -> Request {
        let body = if self.method == Method::GET || self.method == Method::HEAD {
            RequestBody::None
        } else {
            match self.body {
                Some(bytes) if !bytes.is_empty() => parse_body(&self.headers, bytes),
                _ => RequestBody::None,
            }
        };

        Request {
            shared: Arc::new(Shared {
                method: self.method,
                path: self.path,
                query: self.query,
                headers: self.headers,
                cookies: self.cookies,
                body,
                received_at: self.received_at.unwrap_or_else(SystemTime::now),
            }),
            params: Arc::new(Vec::new()),
        }
    }
}

fn parse_body(headers: &HeaderMap, bytes: Bytes) -> RequestBody {
    let mime = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<mime::Mime>().ok());

    match mime {
        Some(mime) if is_json(&mime) => serde_json::from_slice(&bytes)
            .map(RequestBody::Json)
            .unwrap_or(RequestBody::None),
        Some(mime) if mime.essence_str() == mime::APPLICATION_WWW_FORM_URLENCODED.essence_str() => {
            match serde_urlencoded::from_bytes::<Vec<(String, String)>>(&bytes) {
                Ok(pairs) => {
                    let mut map = Map::new();
                    for (key, value) in pairs {
                        map.insert(key, Value::String(value));
                    }
                    RequestBody::Json(Value::Object(map))
                }
                Err(_) => RequestBody::None,
            }
        }
        _ => RequestBody::Raw(bytes),
    }
}

fn is_json(mime: &mime::Mime) -> bool {
    mime.type_() == mime::APPLICATION
        && (mime.subtype() == mime::JSON || mime.suffix() == Some(mime::JSON))
}

use crate::http::{Request, Response};

use std::backtrace::Backtrace;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;

use http::{Method, StatusCode};
use serde_json::{Map, Value};

/// Any error the dispatcher can surface to a client.
///
/// Everything that goes wrong while serving a request ends up here and is
/// converted to a JSON response by the [`Translator`]. Nothing escapes past
/// [`Kernel::handle`](crate::Kernel::handle).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No registered route matched the request path.
    #[error("Route not found: {method} {path}")]
    RouteNotFound { method: Method, path: String },

    /// A route matched the path but not the method.
    ///
    /// Carries every method seen on a path-matching route while scanning.
    #[error("Method not allowed")]
    MethodNotAllowed { allowed: Vec<Method> },

    /// Declarative validation rejected the request.
    #[error("{message}")]
    Validation {
        message: String,
        errors: BTreeMap<String, Vec<String>>,
    },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    /// A programmer or setup mistake discovered while serving, such as an
    /// unknown route name in a reverse lookup.
    #[error("{0}")]
    Configuration(String),

    /// A capability the active runtime driver does not provide.
    #[error("{feature} is not supported by the active runtime")]
    FeatureNotSupported { feature: String },

    /// Anything else, including errors raised by application handlers.
    #[error("{message}")]
    Internal { message: String, trace: String },
}

impl Error {
    /// Create an unclassified internal error.
    ///
    /// The backtrace is captured here so debug translation can point at the
    /// construction site rather than the dispatcher boundary. Capture
    /// honors `RUST_BACKTRACE`, so it costs nothing when disabled.
    pub fn internal(message: impl Display) -> Self {
        Error::Internal {
            message: message.to_string(),
            trace: Backtrace::capture().to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Display) -> Self {
        Error::Configuration(message.to_string())
    }

    /// Create a validation error from accumulated per-field messages.
    pub fn validation(message: impl Display, errors: BTreeMap<String, Vec<String>>) -> Self {
        Error::Validation {
            message: message.to_string(),
            errors,
        }
    }

    /// The HTTP status this error translates to.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            Error::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Error::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::FeatureNotSupported { .. } => StatusCode::NOT_IMPLEMENTED,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::internal(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::internal(err)
    }
}

/// A handler consulted before the translation table.
///
/// Returning `None` falls through to the default translation.
pub type CustomHandler = dyn Fn(&Error, &Request) -> Option<Response> + Send + Sync;

/// Maps [`Error`] values to JSON responses.
pub struct Translator {
    debug: bool,
    custom: Option<Arc<CustomHandler>>,
}

impl Translator {
    pub fn new(debug: bool) -> Self {
        Self {
            debug,
            custom: None,
        }
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    /// Install a handler that may intercept translation and short-circuit
    /// with its own response.
    pub fn set_custom_handler<F>(&mut self, handler: F)
    where
        F: Fn(&Error, &Request) -> Option<Response> + Send + Sync + 'static,
    {
        self.custom = Some(Arc::new(handler));
    }

    /// Convert an error to its JSON response.
    ///
    /// Internal errors never reveal their message outside debug mode.
    pub fn translate(&self, err: &Error, req: &Request) -> Response {
        if let Some(custom) = &self.custom {
            if let Some(response) = custom(err, req) {
                return response;
            }
        }

        let mut payload = Map::new();
        let message = match err {
            Error::Internal { .. } => "Internal Server Error".to_owned(),
            _ => err.to_string(),
        };
        payload.insert("error".to_owned(), Value::String(message));

        match err {
            Error::Validation { errors, .. } => {
                let fields = errors
                    .iter()
                    .map(|(field, messages)| {
                        let messages = messages
                            .iter()
                            .map(|m| Value::String(m.clone()))
                            .collect();
                        (field.clone(), Value::Array(messages))
                    })
                    .collect();
                payload.insert("errors".to_owned(), Value::Object(fields));
            }
            Error::MethodNotAllowed { allowed } => {
                let methods = allowed
                    .iter()
                    .map(|m| Value::String(m.as_str().to_owned()))
                    .collect();
                payload.insert("allowed_methods".to_owned(), Value::Array(methods));
            }
            _ => {}
        }

        if self.debug {
            payload.insert("detail".to_owned(), Value::String(err.to_string()));
            if let Error::Internal { trace, .. } = err {
                let lines = trace
                    .lines()
                    .map(|line| Value::String(line.to_owned()))
                    .collect();
                payload.insert("trace".to_owned(), Value::Array(lines));
            }
        }

        Response::json(&Value::Object(payload)).with_status(err.status())
    }
}

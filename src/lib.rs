mod error;
mod handler;
mod kernel;
mod marten;
mod router;
mod template;
mod validate;
mod wrap;

pub mod auth;
pub mod http;
pub mod runtime;
pub mod scope;
pub mod service;

pub use error::{Error, Translator};
pub use handler::{json, Handler, IntoHandler, Reply, RequestHandler, Respond};
pub use kernel::{AccessEntry, Kernel};
pub use marten::{Marten, RouteRef};
pub use router::{HostRule, MatchResult, Matched, Route, Router};
pub use template::{Segment, Template};
pub use validate::{Rules, Source};
pub use wrap::{Chain, Next, Wrap, WrapSpec};

//! The seam between the dispatch kernel and a runtime driver.
//!
//! Drivers live outside this crate: one may serve a single CGI-style
//! request per process, another may run a persistent event loop invoking
//! the kernel concurrently. Either way the contract is the same: construct
//! a [`Request`](crate::http::Request) from the transport, call
//! [`Kernel::handle`](crate::Kernel::handle) exactly once per inbound
//! request, and serialize the returned response, emitting repeated headers
//! separately and streaming the body chunk-by-chunk when it is open.

use crate::error::Error;
use crate::kernel::Kernel;

use std::sync::Arc;

/// Feature flags reported by a runtime driver, consulted by application
/// code to branch behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub async_io: bool,
    pub web_sockets: bool,
    pub streaming_responses: bool,
    pub persistent_state: bool,
}

impl Capabilities {
    /// Turn a missing capability into the 501 error the translator knows
    /// how to render.
    pub fn require(&self, feature: &str, supported: bool) -> Result<(), Error> {
        if supported {
            Ok(())
        } else {
            Err(Error::FeatureNotSupported {
                feature: feature.to_owned(),
            })
        }
    }
}

/// A pluggable runtime driver.
pub trait Driver {
    fn capabilities(&self) -> Capabilities;

    /// Run the serve loop, invoking the kernel once per inbound request
    /// until the transport shuts down.
    fn start(&self, kernel: Arc<Kernel>) -> Result<(), Error>;
}

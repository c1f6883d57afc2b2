//! HTTP value objects exchanged with the runtime driver.

mod request;
mod response;

pub use bytes::Bytes;
pub use http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};

pub use request::{Request, RequestBody, RequestBuilder};
pub use response::Response;

use std::fmt;
use std::mem;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The body of an HTTP response.
///
/// `Stream` is the "open stream" mode: the dispatcher never polls it, the
/// runtime driver does, emitting chunks as they become available.
pub enum Body {
    Once(Bytes),
    Stream(Pin<Box<dyn Stream<Item = Result<Bytes, BoxError>> + Send + Sync>>),
    Empty,
}

impl Body {
    /// Create a body directly from bytes.
    pub fn once(bytes: impl Into<Bytes>) -> Self {
        Self::Once(bytes.into())
    }

    /// Create a `Body` from a stream of byte chunks.
    pub fn stream<S, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + Sync + 'static,
        E: Into<BoxError> + 'static,
    {
        struct MapErr<S>(S);

        impl<S, T, E> Stream for MapErr<S>
        where
            S: Stream<Item = Result<T, E>>,
            E: Into<BoxError>,
        {
            type Item = Result<T, BoxError>;

            fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
                // SAFETY: the inner stream is structurally pinned
                unsafe { self.map_unchecked_mut(|s| &mut s.0) }
                    .poll_next(cx)
                    .map(|item| item.map(|result| result.map_err(Into::into)))
            }
        }

        Self::Stream(Box::pin(MapErr(stream)))
    }

    /// Create an empty `Body`.
    pub fn empty() -> Self {
        Self::Empty
    }

    /// The body bytes, if the body is not an open stream.
    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Once(bytes) => Some(bytes),
            Self::Empty => Some(&[]),
            Self::Stream(_) => None,
        }
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Self::Stream(_))
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::Empty
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Once(bytes) => f.debug_tuple("Once").field(&bytes.len()).finish(),
            Self::Stream(_) => f.debug_tuple("Stream").finish(),
            Self::Empty => f.debug_tuple("Empty").finish(),
        }
    }
}

impl Stream for Body {
    type Item = Result<Bytes, BoxError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match &mut *self {
            Self::Stream(stream) => stream.as_mut().poll_next(cx),
            Self::Once(bytes) => {
                let bytes = mem::take(bytes);
                *self = Self::Empty;
                Some(Ok(bytes)).into()
            }
            Self::Empty => None.into(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &*self {
            Self::Stream(stream) => stream.size_hint(),
            Self::Once(bytes) => (bytes.len(), Some(bytes.len())),
            Self::Empty => (0, Some(0)),
        }
    }
}

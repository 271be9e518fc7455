//! The transport collaborator: whatever actually moves bytes.
//!
//! # Design
//! The core never opens a connection itself. It hands a finished
//! [`HttpRequest`] to a [`Transport`] and gets back a [`TransportCall`],
//! which reports a [`RawResponse`] or an `io::Error`. Connection pooling,
//! TLS, timeouts and retries all live behind this boundary.

use std::io;
use std::sync::Arc;

use crate::http::{HttpRequest, RawResponse};

#[cfg(feature = "ureq")]
pub mod ureq;

/// Completion handler for [`TransportCall::enqueue`].
pub type TransportCallback = Box<dyn FnOnce(io::Result<RawResponse>) + Send + 'static>;

/// Creates one transport-level call per request.
pub trait Transport: Send + Sync {
    fn new_call(&self, request: HttpRequest) -> Arc<dyn TransportCall>;
}

/// One request on the wire.
pub trait TransportCall: Send + Sync {
    fn request(&self) -> &HttpRequest;

    /// Send the request and wait for the status line and headers. The body
    /// may still be streaming.
    fn execute(&self) -> io::Result<RawResponse>;

    /// Send the request in the background and report to `callback` exactly
    /// once, on a thread of the transport's choosing.
    fn enqueue(&self, callback: TransportCallback);

    /// Best effort: a request already on the wire may still complete.
    fn cancel(&self);

    fn is_canceled(&self) -> bool;
}

/// The error a canceled transport call reports.
pub fn canceled_error() -> io::Error {
    io::Error::new(io::ErrorKind::Interrupted, "Canceled")
}

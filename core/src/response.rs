//! Typed outcome of a completed HTTP exchange.

use http::{HeaderMap, StatusCode};

use crate::http::{ResponseBody, ResponseMeta};

/// The result of a call that reached the server.
///
/// A non-2xx status is not an error at this level: it arrives as
/// [`Response::Error`] carrying the raw error body, and the typed converter
/// is never invoked for it.
#[derive(Debug)]
pub enum Response<T> {
    /// 2xx status. `body` is `None` for 204 and 205.
    Success { body: Option<T>, meta: ResponseMeta },
    /// Any other status, with the error body as received.
    Error { body: ResponseBody, meta: ResponseMeta },
}

impl<T> Response<T> {
    pub fn success(body: Option<T>, meta: ResponseMeta) -> Self {
        Response::Success { body, meta }
    }

    pub fn error(body: ResponseBody, meta: ResponseMeta) -> Self {
        Response::Error { body, meta }
    }

    pub fn meta(&self) -> &ResponseMeta {
        match self {
            Response::Success { meta, .. } | Response::Error { meta, .. } => meta,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.meta().status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.meta().headers
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success { .. })
    }

    pub fn body(&self) -> Option<&T> {
        match self {
            Response::Success { body, .. } => body.as_ref(),
            Response::Error { .. } => None,
        }
    }

    pub fn into_body(self) -> Option<T> {
        match self {
            Response::Success { body, .. } => body,
            Response::Error { .. } => None,
        }
    }

    pub fn error_body(&mut self) -> Option<&mut ResponseBody> {
        match self {
            Response::Success { .. } => None,
            Response::Error { body, .. } => Some(body),
        }
    }
}

//! HTTP data types shared by the request builder, the calls and the transport.
//!
//! # Design
//! Requests are plain data: the core builds an [`HttpRequest`] and hands it
//! to a [`Transport`](crate::transport::Transport), which owns the actual
//! I/O and answers with a [`RawResponse`]. Response bodies may still be
//! streaming when they arrive, so [`ResponseBody`] wraps either buffered
//! bytes or a reader.

use std::fmt;
use std::io::{self, Read};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use url::Url;

/// HTTP method of an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    /// A verb declared through `http(method, path, has_body)`.
    Other(String),
}

impl HttpMethod {
    pub fn as_str(&self) -> &str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Other(name) => name,
        }
    }

    /// Whether the verb carries a request body by default.
    pub fn permits_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }

    pub fn to_http(&self) -> Result<http::Method, http::method::InvalidMethod> {
        http::Method::from_bytes(self.as_str().as_bytes())
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request body with its media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestBody {
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl RequestBody {
    pub fn new(content_type: Option<&str>, bytes: impl Into<Bytes>) -> Self {
        Self {
            content_type: content_type.map(str::to_string),
            bytes: bytes.into(),
        }
    }

    pub fn empty() -> Self {
        Self::new(None, Bytes::new())
    }

    pub fn text(value: &str) -> Self {
        Self::new(Some("text/plain; charset=UTF-8"), value.to_string())
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub(crate) fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = Some(content_type.to_string());
        self
    }
}

/// A concrete request ready for the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: Url,
    /// Multi-valued: appending a name never replaces earlier values.
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
}

impl HttpRequest {
    /// All values of a header, in insertion order.
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }
}

/// Status line and headers of a response, without the body.
#[derive(Debug, Clone)]
pub struct ResponseMeta {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub url: Url,
}

impl ResponseMeta {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

enum Source {
    Buffered(Bytes),
    Reader(Box<dyn Read + Send>),
    Consumed,
}

/// Response payload, either already in memory or still streaming.
pub struct ResponseBody {
    content_type: Option<String>,
    content_length: Option<u64>,
    source: Source,
}

impl ResponseBody {
    pub fn from_bytes(content_type: Option<&str>, bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        Self {
            content_type: content_type.map(str::to_string),
            content_length: Some(bytes.len() as u64),
            source: Source::Buffered(bytes),
        }
    }

    pub fn from_reader(
        content_type: Option<&str>,
        content_length: Option<u64>,
        reader: Box<dyn Read + Send>,
    ) -> Self {
        Self {
            content_type: content_type.map(str::to_string),
            content_length,
            source: Source::Reader(reader),
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub fn is_buffered(&self) -> bool {
        matches!(self.source, Source::Buffered(_))
    }

    /// Read the whole body into memory.
    pub fn bytes(&mut self) -> io::Result<Bytes> {
        match std::mem::replace(&mut self.source, Source::Consumed) {
            Source::Buffered(bytes) => {
                self.source = Source::Buffered(bytes.clone());
                Ok(bytes)
            }
            Source::Reader(mut reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf)?;
                let bytes = Bytes::from(buf);
                self.source = Source::Buffered(bytes.clone());
                Ok(bytes)
            }
            Source::Consumed => Err(io::Error::new(
                io::ErrorKind::Other,
                "response body was already consumed",
            )),
        }
    }

    pub fn string(&mut self) -> io::Result<String> {
        let bytes = self.bytes()?;
        String::from_utf8(bytes.to_vec()).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Take the body as a reader. Buffered bodies are served from memory.
    pub fn into_reader(self) -> Box<dyn Read + Send> {
        match self.source {
            Source::Buffered(bytes) => Box::new(io::Cursor::new(bytes)),
            Source::Reader(reader) => reader,
            Source::Consumed => Box::new(io::empty()),
        }
    }

    /// Buffer a streaming body so it can be read without further I/O.
    pub fn buffer(mut self) -> io::Result<Self> {
        self.bytes()?;
        Ok(self)
    }

    /// Routes reader failures into `slot` so they can be told apart from
    /// decoding failures once a converter gives up.
    pub(crate) fn catching(self, slot: IoErrorSlot) -> Self {
        let source = match self.source {
            Source::Reader(inner) => Source::Reader(Box::new(CatchingReader { inner, slot })),
            other => other,
        };
        Self { source, ..self }
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match &self.source {
            Source::Buffered(b) => format!("buffered({} bytes)", b.len()),
            Source::Reader(_) => "streaming".to_string(),
            Source::Consumed => "consumed".to_string(),
        };
        f.debug_struct("ResponseBody")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .field("source", &source)
            .finish()
    }
}

/// Shared cell capturing the first reader error seen during conversion.
#[derive(Clone, Default)]
pub(crate) struct IoErrorSlot(Arc<Mutex<Option<io::Error>>>);

impl IoErrorSlot {
    pub(crate) fn take(&self) -> Option<io::Error> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

struct CatchingReader {
    inner: Box<dyn Read + Send>,
    slot: IoErrorSlot,
}

impl Read for CatchingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf).map_err(|e| {
            let copy = io::Error::new(e.kind(), e.to_string());
            let mut slot = self.slot.0.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.is_none() {
                *slot = Some(e);
            }
            copy
        })
    }
}

/// What the transport hands back: metadata plus an unread body.
#[derive(Debug)]
pub struct RawResponse {
    pub meta: ResponseMeta,
    pub body: ResponseBody,
}

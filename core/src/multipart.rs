//! `multipart/form-data` encoding.

use bytes::{BufMut, Bytes, BytesMut};
use http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue};
use uuid::Uuid;

use crate::error::Error;
use crate::http::RequestBody;

const CRLF: &[u8] = b"\r\n";
const DASHDASH: &[u8] = b"--";

/// One section of a multipart body.
///
/// Parts passed to an unnamed `Part` parameter must already carry their own
/// `Content-Disposition`.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    headers: HeaderMap,
    body: RequestBody,
}

impl Part {
    /// A part with explicit headers. `Content-Type` and `Content-Length`
    /// are derived from the body and may not be supplied here.
    pub fn new(headers: HeaderMap, body: RequestBody) -> Result<Self, Error> {
        for forbidden in [CONTENT_TYPE, CONTENT_LENGTH] {
            if headers.contains_key(&forbidden) {
                return Err(Error::Argument(format!(
                    "Unexpected header: {forbidden} (derived from the part body)"
                )));
            }
        }
        Ok(Self { headers, body })
    }

    /// A `form-data` part, optionally carrying a file name.
    pub fn form_data(name: &str, filename: Option<&str>, body: RequestBody) -> Result<Self, Error> {
        let mut disposition = String::from("form-data; name=");
        append_quoted(&mut disposition, name);
        if let Some(filename) = filename {
            disposition.push_str("; filename=");
            append_quoted(&mut disposition, filename);
        }
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_DISPOSITION, header_value(&disposition)?);
        Self::new(headers, body)
    }

    /// A named part as produced by a `Part` parameter binding.
    pub(crate) fn named(name: &str, transfer_encoding: &str, body: RequestBody) -> Result<Self, Error> {
        let mut part = Self::form_data(name, None, body)?;
        part.headers.insert(
            HeaderName::from_static("content-transfer-encoding"),
            header_value(transfer_encoding)?,
        );
        Ok(part)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &RequestBody {
        &self.body
    }
}

/// Accumulates parts and renders the final body.
#[derive(Debug)]
pub struct MultipartBuilder {
    boundary: String,
    parts: Vec<Part>,
}

impl Default for MultipartBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartBuilder {
    pub fn new() -> Self {
        Self::with_boundary(&Uuid::new_v4().to_string())
    }

    pub fn with_boundary(boundary: &str) -> Self {
        Self {
            boundary: boundary.to_string(),
            parts: Vec::new(),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn add_part(&mut self, part: Part) {
        self.parts.push(part);
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn build(self) -> Result<RequestBody, Error> {
        if self.parts.is_empty() {
            return Err(Error::Argument(
                "Multipart body must have at least one part.".to_string(),
            ));
        }
        let mut out = BytesMut::new();
        for part in &self.parts {
            out.put_slice(DASHDASH);
            out.put_slice(self.boundary.as_bytes());
            out.put_slice(CRLF);
            for (name, value) in part.headers.iter() {
                out.put_slice(name.as_str().as_bytes());
                out.put_slice(b": ");
                out.put_slice(value.as_bytes());
                out.put_slice(CRLF);
            }
            if let Some(content_type) = &part.body.content_type {
                out.put_slice(b"Content-Type: ");
                out.put_slice(content_type.as_bytes());
                out.put_slice(CRLF);
            }
            out.put_slice(format!("Content-Length: {}", part.body.len()).as_bytes());
            out.put_slice(CRLF);
            out.put_slice(CRLF);
            out.put_slice(&part.body.bytes);
            out.put_slice(CRLF);
        }
        out.put_slice(DASHDASH);
        out.put_slice(self.boundary.as_bytes());
        out.put_slice(DASHDASH);
        out.put_slice(CRLF);

        let content_type = format!("multipart/form-data; boundary={}", self.boundary);
        Ok(RequestBody::new(Some(&content_type), Bytes::from(out)))
    }
}

fn header_value(value: &str) -> Result<HeaderValue, Error> {
    HeaderValue::from_str(value).map_err(|_| Error::InvalidHeader(value.to_string()))
}

fn append_quoted(target: &mut String, key: &str) {
    target.push('"');
    for c in key.chars() {
        match c {
            '\n' => target.push_str("%0A"),
            '\r' => target.push_str("%0D"),
            '"' => target.push_str("%22"),
            c => target.push(c),
        }
    }
    target.push('"');
}

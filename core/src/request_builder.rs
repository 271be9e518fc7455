//! Per-call request assembly.
//!
//! # Design
//! A [`RequestBuilder`] starts from the immutable parts of a compiled
//! descriptor (verb, URL template, declared headers, encoding mode) and is
//! mutated by the parameter binders in declaration order. It lives for one
//! request only.

use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue};
use log::trace;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use url::Url;

use crate::error::Error;
use crate::http::{HttpMethod, HttpRequest, RequestBody};
use crate::multipart::{MultipartBuilder, Part};
use crate::service_method::is_media_type;

pub const FORM_MEDIA_TYPE: &str = "application/x-www-form-urlencoded";

/// Always encoded inside a path segment, even for pre-encoded values.
const PATH_SEGMENT_ALWAYS: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'|')
    .add(b'\\')
    .add(b'?')
    .add(b'#');

const PATH_SEGMENT: &AsciiSet = &PATH_SEGMENT_ALWAYS.add(b'/').add(b'%');

const QUERY_ALWAYS: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'<').add(b'>').add(b'#');

const QUERY_COMPONENT: &AsciiSet = &QUERY_ALWAYS
    .add(b'&')
    .add(b'=')
    .add(b'+')
    .add(b'\'')
    .add(b'%');

const FORM_ALWAYS: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'\'')
    .add(b':')
    .add(b';')
    .add(b'<')
    .add(b'>')
    .add(b'@')
    .add(b'[')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'|')
    .add(b'/')
    .add(b'\\')
    .add(b'?')
    .add(b'#')
    .add(b'!')
    .add(b'$')
    .add(b'(')
    .add(b')')
    .add(b',')
    .add(b'~');

const FORM_COMPONENT: &AsciiSet = &FORM_ALWAYS.add(b'&').add(b'=').add(b'+').add(b'%');

/// Static inputs shared by every request of one descriptor.
#[derive(Debug, Clone)]
pub(crate) struct RequestTemplate {
    pub method: HttpMethod,
    pub base_url: Url,
    pub relative_url: Option<String>,
    pub headers: HeaderMap,
    pub content_type: Option<String>,
    pub has_body: bool,
    pub form_encoded: bool,
    pub multipart: bool,
}

#[derive(Debug)]
pub(crate) struct RequestBuilder {
    method: HttpMethod,
    base_url: Url,
    relative_url: Option<String>,
    query: Vec<String>,
    headers: HeaderMap,
    content_type: Option<String>,
    has_body: bool,
    body: Option<RequestBody>,
    form: Option<Vec<String>>,
    multipart: Option<MultipartBuilder>,
}

impl RequestBuilder {
    pub(crate) fn new(template: &RequestTemplate) -> Self {
        Self {
            method: template.method.clone(),
            base_url: template.base_url.clone(),
            relative_url: template.relative_url.clone(),
            query: Vec::new(),
            headers: template.headers.clone(),
            content_type: template.content_type.clone(),
            has_body: template.has_body,
            body: None,
            form: template.form_encoded.then(Vec::new),
            multipart: template.multipart.then(MultipartBuilder::new),
        }
    }

    pub(crate) fn set_relative_url(&mut self, url: String) {
        self.relative_url = Some(url);
    }

    pub(crate) fn add_path_param(&mut self, name: &str, value: &str, encoded: bool) -> Result<(), Error> {
        let Some(relative_url) = self.relative_url.as_mut() else {
            return Err(Error::Argument(format!(
                "no URL template to substitute path parameter \"{name}\" into"
            )));
        };
        let set = if encoded { PATH_SEGMENT_ALWAYS } else { PATH_SEGMENT };
        let replacement = utf8_percent_encode(value, set).to_string();
        *relative_url = relative_url.replace(&format!("{{{name}}}"), &replacement);
        Ok(())
    }

    /// `value: None` adds a bare name, as `QueryName` bindings do.
    pub(crate) fn add_query_param(&mut self, name: &str, value: Option<&str>, encoded: bool) {
        let set = if encoded { QUERY_ALWAYS } else { QUERY_COMPONENT };
        let mut pair = utf8_percent_encode(name, set).to_string();
        if let Some(value) = value {
            pair.push('=');
            pair.push_str(&utf8_percent_encode(value, set).to_string());
        }
        self.query.push(pair);
    }

    /// `Content-Type` replaces the media type instead of adding a header.
    pub(crate) fn add_header(&mut self, name: &str, value: &str) -> Result<(), Error> {
        if name.eq_ignore_ascii_case(CONTENT_TYPE.as_str()) {
            if !is_media_type(value) {
                return Err(Error::Argument(format!("Malformed content type: {value}")));
            }
            self.content_type = Some(value.to_string());
            return Ok(());
        }
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| Error::InvalidHeader(name.to_string()))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| Error::InvalidHeader(format!("{name}: {value}")))?;
        self.headers.append(name, value);
        Ok(())
    }

    pub(crate) fn add_form_field(&mut self, name: &str, value: &str, encoded: bool) -> Result<(), Error> {
        let Some(form) = self.form.as_mut() else {
            return Err(Error::Argument(format!(
                "form field \"{name}\" bound on a request without form encoding"
            )));
        };
        let set = if encoded { FORM_ALWAYS } else { FORM_COMPONENT };
        form.push(format!(
            "{}={}",
            utf8_percent_encode(name, set),
            utf8_percent_encode(value, set)
        ));
        Ok(())
    }

    pub(crate) fn add_part(&mut self, part: Part) -> Result<(), Error> {
        let Some(multipart) = self.multipart.as_mut() else {
            return Err(Error::Argument(
                "multipart part bound on a request without multipart encoding".to_string(),
            ));
        };
        multipart.add_part(part);
        Ok(())
    }

    pub(crate) fn set_body(&mut self, body: RequestBody) {
        self.body = Some(body);
    }

    pub(crate) fn build(self) -> Result<HttpRequest, Error> {
        let Some(relative_url) = self.relative_url else {
            return Err(Error::Argument("Missing either a URL template or a Url argument.".to_string()));
        };
        let mut url = self.base_url.join(&relative_url).map_err(|e| {
            Error::Argument(format!(
                "Malformed URL. Base: {}, Relative: {relative_url} ({e})",
                self.base_url
            ))
        })?;
        if !self.query.is_empty() {
            let mut query = url.query().unwrap_or_default().to_string();
            for pair in &self.query {
                if !query.is_empty() {
                    query.push('&');
                }
                query.push_str(pair);
            }
            url.set_query(Some(&query));
        }

        let mut headers = self.headers;
        let mut body = self.body;
        if body.is_none() {
            if let Some(form) = self.form {
                body = Some(RequestBody::new(Some(FORM_MEDIA_TYPE), form.join("&")));
            } else if let Some(multipart) = self.multipart {
                body = Some(multipart.build()?);
            } else if self.has_body {
                body = Some(RequestBody::empty());
            }
        }
        if let Some(content_type) = self.content_type {
            match body {
                Some(b) => body = Some(b.with_content_type(&content_type)),
                None => {
                    let value = HeaderValue::from_str(&content_type)
                        .map_err(|_| Error::InvalidHeader(content_type.clone()))?;
                    headers.append(CONTENT_TYPE, value);
                }
            }
        }

        let request = HttpRequest {
            method: self.method,
            url,
            headers,
            body,
        };
        trace!("built request {} {}", request.method, request.url);
        Ok(request)
    }
}

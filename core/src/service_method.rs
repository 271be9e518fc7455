//! Descriptor compiler.
//!
//! # Design
//! [`ServiceMethod::compile`] reads an [`Endpoint`] declaration once and
//! produces the immutable descriptor every call of that endpoint shares: the
//! request template, one [`ParameterBinder`] per argument, the response
//! converter and the call adapter. All consistency checks happen here, so a
//! descriptor that compiled can only fail per call on bad argument values.
//!
//! Validation follows declaration order. Method-level declarations are read
//! first (verb, headers, encoding), then each parameter, then the checks
//! that need the whole picture (missing URL, unbound placeholders, empty
//! form or multipart bodies).

use std::collections::BTreeSet;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use http::{HeaderMap, HeaderName, HeaderValue};
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use url::Url;

use crate::adapter::CallAdapter;
use crate::arg::Arg;
use crate::binder::ParameterBinder;
use crate::client::{ErrorBodyPolicy, Settings};
use crate::converter::ResponseBodyConverter;
use crate::endpoint::{Endpoint, MethodAnnotation, ParamAnnotation};
use crate::error::{ConfigError, Error};
use crate::http::{HttpMethod, HttpRequest, ResponseBody};
use crate::multipart::Part;
use crate::request_builder::{RequestBuilder, RequestTemplate};
use crate::transport::Transport;

lazy_static! {
    static ref PARAM_URL_REGEX: Regex = Regex::new(r"\{([a-zA-Z][a-zA-Z0-9_-]*)\}").unwrap();
    static ref PARAM_NAME_REGEX: Regex = Regex::new(r"^[a-zA-Z][a-zA-Z0-9_-]*$").unwrap();
}

/// Names of the `{name}` placeholders in a URL template, in first-seen order.
pub fn parse_path_parameters(path: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    PARAM_URL_REGEX
        .captures_iter(path)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

#[derive(Debug, thiserror::Error)]
#[error("converter for {expected} produced a value of another type")]
struct TypeMismatch {
    expected: &'static str,
}

/// The compiled, immutable form of one endpoint.
pub struct ServiceMethod<T> {
    name: String,
    template: RequestTemplate,
    binders: Vec<ParameterBinder>,
    response_type: &'static str,
    response_converter: Arc<dyn ResponseBodyConverter>,
    transport: Arc<dyn Transport>,
    adapter: CallAdapter,
    error_body: ErrorBodyPolicy,
    _result: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> ServiceMethod<T> {
    pub(crate) fn compile(endpoint: &Endpoint<T>, settings: &Settings) -> Result<Self, ConfigError> {
        let mut compiler = Compiler::new(endpoint.name(), &settings.base_url);
        for annotation in endpoint.annotations() {
            compiler.method_annotation(annotation)?;
        }
        let Some(method) = compiler.method.clone() else {
            return Err(compiler.method_error(
                "HTTP method declaration is required (e.g., get, post, etc.).",
            ));
        };
        if !compiler.has_body {
            if compiler.multipart {
                return Err(compiler.method_error(
                    "Multipart can only be specified on HTTP methods with request body (e.g., post).",
                ));
            }
            if compiler.form_encoded {
                return Err(compiler.method_error(
                    "FormUrlEncoded can only be specified on HTTP methods with request body (e.g., post).",
                ));
            }
        }

        let mut binders = Vec::with_capacity(endpoint.params().len());
        for (index, param) in endpoint.params().iter().enumerate() {
            let mut found = None;
            for annotation in param.annotations() {
                let binder = compiler.param_annotation(index, annotation, param.ty(), settings)?;
                if found.is_some() {
                    return Err(compiler.param_error(
                        index,
                        "Multiple binding annotations found, only one allowed.",
                    ));
                }
                found = Some(binder);
            }
            match found {
                Some(binder) => binders.push(binder),
                None => return Err(compiler.param_error(index, "No binding annotation found.")),
            }
        }
        compiler.finish(&method)?;

        let response = endpoint.response_type();
        if method == HttpMethod::Head && !response.is::<()>() {
            return Err(compiler.method_error("HEAD method must use () as response type."));
        }
        let response_converter = settings
            .converters
            .response_body_converter(response, endpoint.annotations())
            .map_err(|cause| {
                compiler.method_error(format!(
                    "Unable to create converter for {}\n{cause}",
                    response.name()
                ))
            })?;

        let template = RequestTemplate {
            method,
            base_url: settings.base_url.clone(),
            relative_url: compiler.relative_url,
            headers: compiler.headers,
            content_type: compiler.content_type,
            has_body: compiler.has_body,
            form_encoded: compiler.form_encoded,
            multipart: compiler.multipart,
        };
        debug!(
            "compiled {} ({} {:?}, {} binders)",
            endpoint.name(),
            template.method,
            template.relative_url,
            binders.len()
        );
        Ok(Self {
            name: endpoint.name().to_string(),
            template,
            binders,
            response_type: response.name(),
            response_converter,
            transport: settings.transport.clone(),
            adapter: settings.adapter.clone(),
            error_body: settings.error_body,
            _result: PhantomData,
        })
    }

    /// Decode a successful response body into the endpoint's result type.
    pub(crate) fn to_response(&self, body: ResponseBody) -> Result<T, Error> {
        let value = self.response_converter.convert(body)?;
        value.downcast::<T>().map(|v| *v).map_err(|_| {
            Error::conversion(
                self.response_type,
                TypeMismatch {
                    expected: self.response_type,
                },
            )
        })
    }
}

impl<T> ServiceMethod<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn http_method(&self) -> &HttpMethod {
        &self.template.method
    }

    pub fn relative_url(&self) -> Option<&str> {
        self.template.relative_url.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.template.content_type.as_deref()
    }

    pub fn parameter_count(&self) -> usize {
        self.binders.len()
    }

    /// Materialize the wire request for one set of arguments.
    ///
    /// Deterministic: the same arguments always produce the same request,
    /// apart from the boundary of multipart bodies.
    pub fn to_request(&self, args: &[Arg]) -> Result<HttpRequest, Error> {
        if args.len() != self.binders.len() {
            return Err(Error::Argument(format!(
                "Argument count ({}) doesn't match expected count ({})",
                args.len(),
                self.binders.len()
            )));
        }
        let mut builder = RequestBuilder::new(&self.template);
        for (binder, arg) in self.binders.iter().zip(args) {
            binder.apply(&mut builder, arg.clone())?;
        }
        builder.build()
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub(crate) fn adapter(&self) -> &CallAdapter {
        &self.adapter
    }

    pub(crate) fn error_body_policy(&self) -> ErrorBodyPolicy {
        self.error_body
    }
}

impl<T> fmt::Debug for ServiceMethod<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceMethod")
            .field("name", &self.name)
            .field("template", &self.template)
            .field("binders", &self.binders)
            .field("response_type", &self.response_type)
            .finish()
    }
}

/// Scratch state while one endpoint is being compiled.
struct Compiler<'a> {
    endpoint: &'a str,
    base_url: &'a Url,
    method: Option<HttpMethod>,
    has_body: bool,
    relative_url: Option<String>,
    path_names: Vec<String>,
    headers: HeaderMap,
    content_type: Option<String>,
    form_encoded: bool,
    multipart: bool,
    bound_paths: Vec<String>,
    got_field: bool,
    got_part: bool,
    got_body: bool,
    got_path: bool,
    got_query: bool,
    got_url: bool,
}

impl<'a> Compiler<'a> {
    fn new(endpoint: &'a str, base_url: &'a Url) -> Self {
        Self {
            endpoint,
            base_url,
            method: None,
            has_body: false,
            relative_url: None,
            path_names: Vec::new(),
            headers: HeaderMap::new(),
            content_type: None,
            form_encoded: false,
            multipart: false,
            bound_paths: Vec::new(),
            got_field: false,
            got_part: false,
            got_body: false,
            got_path: false,
            got_query: false,
            got_url: false,
        }
    }

    fn method_error(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::method(self.endpoint, message)
    }

    fn param_error(&self, index: usize, message: impl Into<String>) -> ConfigError {
        ConfigError::parameter(self.endpoint, index, message)
    }

    fn method_name(&self) -> &str {
        self.method.as_ref().map_or("HTTP", HttpMethod::as_str)
    }

    fn method_annotation(&mut self, annotation: &MethodAnnotation) -> Result<(), ConfigError> {
        match annotation {
            MethodAnnotation::Http {
                method,
                path,
                has_body,
            } => self.http_method(method, path, *has_body),
            MethodAnnotation::Headers(headers) => {
                if headers.is_empty() {
                    return Err(self.method_error("Headers declaration is empty."));
                }
                headers.iter().try_for_each(|h| self.parse_header(h))
            }
            MethodAnnotation::Multipart => {
                if self.form_encoded {
                    return Err(self.method_error("Only one encoding annotation is allowed."));
                }
                self.multipart = true;
                Ok(())
            }
            MethodAnnotation::FormUrlEncoded => {
                if self.multipart {
                    return Err(self.method_error("Only one encoding annotation is allowed."));
                }
                self.form_encoded = true;
                Ok(())
            }
        }
    }

    fn http_method(&mut self, method: &HttpMethod, path: &str, has_body: bool) -> Result<(), ConfigError> {
        if let Some(existing) = &self.method {
            return Err(self.method_error(format!(
                "Only one HTTP method is allowed. Found: {existing} and {method}."
            )));
        }
        self.method = Some(method.clone());
        self.has_body = has_body;
        if path.is_empty() {
            return Ok(());
        }
        if let Some((_, query)) = path.split_once('?') {
            if PARAM_URL_REGEX.is_match(query) {
                return Err(self.method_error(format!(
                    "URL query string \"{query}\" must not have replace block. \
                     For dynamic query parameters use a Query parameter."
                )));
            }
        }
        self.relative_url = Some(path.to_string());
        self.path_names = parse_path_parameters(path);
        Ok(())
    }

    fn parse_header(&mut self, header: &str) -> Result<(), ConfigError> {
        let colon = header.find(':');
        let Some(colon) = colon.filter(|&c| c != 0 && c != header.len() - 1) else {
            return Err(self.method_error(format!(
                "Headers value must be in the form \"Name: Value\". Found: \"{header}\""
            )));
        };
        let name = &header[..colon];
        let value = header[colon + 1..].trim();
        if name.eq_ignore_ascii_case("Content-Type") {
            if !is_media_type(value) {
                return Err(self.method_error(format!("Malformed content type: {value}")));
            }
            self.content_type = Some(value.to_string());
            return Ok(());
        }
        let parsed = HeaderName::from_bytes(name.trim().as_bytes())
            .ok()
            .zip(HeaderValue::from_str(value).ok());
        let Some((name, value)) = parsed else {
            return Err(self.method_error(format!("Malformed header: \"{header}\"")));
        };
        self.headers.append(name, value);
        Ok(())
    }

    fn param_annotation(
        &mut self,
        p: usize,
        annotation: &ParamAnnotation,
        ty: &crate::types::TypeInfo,
        settings: &Settings,
    ) -> Result<ParameterBinder, ConfigError> {
        let converters = &settings.converters;
        let annotations = std::slice::from_ref(annotation);
        let binder = match annotation {
            ParamAnnotation::Url => {
                if self.got_url {
                    return Err(self.param_error(p, "Multiple Url parameters found."));
                }
                if self.got_path {
                    return Err(self.param_error(p, "Path parameters may not be used with Url."));
                }
                if self.got_query {
                    return Err(self.param_error(p, "A Url parameter must not come after a Query."));
                }
                if self.relative_url.is_some() {
                    return Err(self.param_error(
                        p,
                        format!("Url cannot be used with {} URL", self.method_name()),
                    ));
                }
                if !ty.is::<String>() && !ty.is::<Url>() {
                    return Err(self.param_error(p, "Url parameter type must be String or url::Url."));
                }
                self.got_url = true;
                ParameterBinder::RelativeUrl
            }
            ParamAnnotation::Path { name, encoded } => {
                if self.got_query {
                    return Err(self.param_error(p, "A Path parameter must not come after a Query."));
                }
                if self.got_url {
                    return Err(self.param_error(p, "Path parameters may not be used with Url."));
                }
                let Some(relative_url) = &self.relative_url else {
                    return Err(self.param_error(
                        p,
                        format!("Path can only be used with relative url on {}", self.method_name()),
                    ));
                };
                if !PARAM_NAME_REGEX.is_match(name) {
                    return Err(self.param_error(
                        p,
                        format!(
                            "Path parameter name must match {}. Found: {name}",
                            PARAM_URL_REGEX.as_str()
                        ),
                    ));
                }
                if !self.path_names.contains(name) {
                    return Err(self.param_error(
                        p,
                        format!("URL \"{relative_url}\" does not contain \"{{{name}}}\"."),
                    ));
                }
                if self.bound_paths.contains(name) {
                    return Err(self.param_error(
                        p,
                        format!("Path parameter \"{name}\" is bound more than once."),
                    ));
                }
                self.got_path = true;
                self.bound_paths.push(name.clone());
                ParameterBinder::Path {
                    name: name.clone(),
                    converter: converters.string_converter(ty, annotations),
                    encoded: *encoded,
                }
            }
            ParamAnnotation::Query { name, encoded } => {
                self.got_query = true;
                ParameterBinder::Query {
                    name: name.clone(),
                    converter: converters.string_converter(ty, annotations),
                    encoded: *encoded,
                }
            }
            ParamAnnotation::QueryName { encoded } => {
                self.got_query = true;
                ParameterBinder::QueryName {
                    converter: converters.string_converter(ty, annotations),
                    encoded: *encoded,
                }
            }
            ParamAnnotation::QueryMap { encoded } => ParameterBinder::QueryMap {
                converter: converters.string_converter(ty, annotations),
                encoded: *encoded,
            },
            ParamAnnotation::Header { name } => {
                if HeaderName::from_bytes(name.as_bytes()).is_err() {
                    return Err(self.param_error(p, format!("Malformed header name: \"{name}\"")));
                }
                ParameterBinder::Header {
                    name: name.clone(),
                    converter: converters.string_converter(ty, annotations),
                }
            }
            ParamAnnotation::HeaderMap => ParameterBinder::HeaderMap {
                converter: converters.string_converter(ty, annotations),
            },
            ParamAnnotation::Field { name, encoded } => {
                if !self.form_encoded {
                    return Err(self.param_error(p, "Field parameters can only be used with form encoding."));
                }
                self.got_field = true;
                ParameterBinder::Field {
                    name: name.clone(),
                    converter: converters.string_converter(ty, annotations),
                    encoded: *encoded,
                }
            }
            ParamAnnotation::FieldMap { encoded } => {
                if !self.form_encoded {
                    return Err(self.param_error(p, "FieldMap parameters can only be used with form encoding."));
                }
                self.got_field = true;
                ParameterBinder::FieldMap {
                    converter: converters.string_converter(ty, annotations),
                    encoded: *encoded,
                }
            }
            ParamAnnotation::Part { name, encoding } => {
                if !self.multipart {
                    return Err(self.param_error(p, "Part parameters can only be used with multipart encoding."));
                }
                self.got_part = true;
                match name {
                    None => {
                        if !ty.is::<Part>() {
                            return Err(self.param_error(
                                p,
                                "Part declaration must supply a name or use the multipart Part type.",
                            ));
                        }
                        ParameterBinder::RawPart
                    }
                    Some(name) => {
                        if ty.is::<Part>() {
                            return Err(self.param_error(
                                p,
                                "Part parameters using the multipart Part type must not include a part name.",
                            ));
                        }
                        let converter = converters
                            .request_body_converter(ty, annotations)
                            .map_err(|cause| {
                                self.param_error(
                                    p,
                                    format!("Unable to create Part converter for {}\n{cause}", ty.name()),
                                )
                            })?;
                        ParameterBinder::Part {
                            name: name.clone(),
                            encoding: encoding.clone(),
                            converter,
                        }
                    }
                }
            }
            ParamAnnotation::PartMap { encoding } => {
                if !self.multipart {
                    return Err(self.param_error(p, "PartMap parameters can only be used with multipart encoding."));
                }
                self.got_part = true;
                if ty.is::<Part>() {
                    return Err(self.param_error(
                        p,
                        "PartMap values cannot be multipart Parts. Use a Part list or a different value type instead.",
                    ));
                }
                let converter = converters
                    .request_body_converter(ty, annotations)
                    .map_err(|cause| {
                        self.param_error(
                            p,
                            format!("Unable to create PartMap converter for {}\n{cause}", ty.name()),
                        )
                    })?;
                ParameterBinder::PartMap {
                    encoding: encoding.clone(),
                    converter,
                }
            }
            ParamAnnotation::Body => {
                if self.form_encoded || self.multipart {
                    return Err(self.param_error(
                        p,
                        "Body parameters cannot be used with form or multi-part encoding.",
                    ));
                }
                if self.got_body {
                    return Err(self.param_error(p, "Multiple Body parameters found."));
                }
                let converter = converters
                    .request_body_converter(ty, annotations)
                    .map_err(|cause| {
                        self.param_error(
                            p,
                            format!("Unable to create Body converter for {}\n{cause}", ty.name()),
                        )
                    })?;
                self.got_body = true;
                ParameterBinder::Body { converter }
            }
        };
        Ok(binder)
    }

    fn finish(&self, method: &HttpMethod) -> Result<(), ConfigError> {
        if self.relative_url.is_none() && !self.got_url {
            return Err(self.method_error(format!("Missing either {method} URL or Url parameter.")));
        }
        if !self.form_encoded && !self.multipart && !self.has_body && self.got_body {
            return Err(self.method_error("Non-body HTTP method cannot contain Body."));
        }
        if self.form_encoded && !self.got_field {
            return Err(self.method_error("Form-encoded method must contain at least one Field."));
        }
        if self.multipart && !self.got_part {
            return Err(self.method_error("Multipart method must contain at least one Part."));
        }
        if let Some(relative_url) = &self.relative_url {
            if let Some(unbound) = self.path_names.iter().find(|n| !self.bound_paths.contains(n)) {
                return Err(self.method_error(format!(
                    "URL \"{relative_url}\" contains \"{{{unbound}}}\" but no Path parameter binds it."
                )));
            }
            if let Err(e) = self.base_url.join(relative_url) {
                return Err(self.method_error(format!(
                    "Malformed URL. Base: {}, Relative: {relative_url} ({e})",
                    self.base_url
                )));
            }
        }
        Ok(())
    }
}

/// `type/subtype` with optional parameters.
pub(crate) fn is_media_type(value: &str) -> bool {
    let essence = value.split(';').next().unwrap_or_default().trim();
    match essence.split_once('/') {
        Some((ty, subtype)) => {
            let token = |s: &str| {
                !s.is_empty() && s.bytes().all(|b| b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&b))
            };
            token(ty) && token(subtype)
        }
        None => false,
    }
}

//! Declarative endpoint registration.
//!
//! An [`Endpoint`] is static configuration data: the verb and URL template,
//! declared headers, the encoding mode and one [`Param`] per call argument.
//! Nothing is validated here; the descriptor compiler in
//! [`service_method`](crate::service_method) checks the declaration once and
//! reports every inconsistency as a [`ConfigError`](crate::ConfigError).
//!
//! ```
//! use courier_core::{Endpoint, Param};
//! # #[derive(serde::Deserialize)] struct Contributor { login: String }
//!
//! let contributors = Endpoint::named("GitHub.contributors")
//!     .get("repos/{owner}/{repo}/contributors")
//!     .param(Param::path("owner"))
//!     .param(Param::path("repo"))
//!     .returns::<Vec<Contributor>>();
//! assert_eq!(contributors.params().len(), 2);
//! ```

use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::http::HttpMethod;
use crate::types::TypeInfo;

/// A method-level declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodAnnotation {
    Http {
        method: HttpMethod,
        path: String,
        has_body: bool,
    },
    Headers(Vec<String>),
    FormUrlEncoded,
    Multipart,
}

/// A parameter-level binding declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamAnnotation {
    Path { name: String, encoded: bool },
    Query { name: String, encoded: bool },
    QueryName { encoded: bool },
    QueryMap { encoded: bool },
    Header { name: String },
    HeaderMap,
    Field { name: String, encoded: bool },
    FieldMap { encoded: bool },
    /// `name: None` expects complete [`Part`](crate::Part) values.
    Part { name: Option<String>, encoding: String },
    PartMap { encoding: String },
    Body,
    Url,
}

const DEFAULT_PART_ENCODING: &str = "binary";

/// One declared call argument.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    annotations: Vec<ParamAnnotation>,
    ty: TypeInfo,
}

impl Param {
    pub fn new(annotations: Vec<ParamAnnotation>) -> Self {
        Self {
            annotations,
            ty: TypeInfo::of::<String>(),
        }
    }

    fn single(annotation: ParamAnnotation) -> Self {
        Self::new(vec![annotation])
    }

    pub fn path(name: &str) -> Self {
        Self::single(ParamAnnotation::Path {
            name: name.to_string(),
            encoded: false,
        })
    }

    pub fn path_encoded(name: &str) -> Self {
        Self::single(ParamAnnotation::Path {
            name: name.to_string(),
            encoded: true,
        })
    }

    pub fn query(name: &str) -> Self {
        Self::single(ParamAnnotation::Query {
            name: name.to_string(),
            encoded: false,
        })
    }

    pub fn query_encoded(name: &str) -> Self {
        Self::single(ParamAnnotation::Query {
            name: name.to_string(),
            encoded: true,
        })
    }

    pub fn query_name() -> Self {
        Self::single(ParamAnnotation::QueryName { encoded: false })
    }

    pub fn query_map() -> Self {
        Self::single(ParamAnnotation::QueryMap { encoded: false })
    }

    pub fn query_map_encoded() -> Self {
        Self::single(ParamAnnotation::QueryMap { encoded: true })
    }

    pub fn header(name: &str) -> Self {
        Self::single(ParamAnnotation::Header {
            name: name.to_string(),
        })
    }

    pub fn header_map() -> Self {
        Self::single(ParamAnnotation::HeaderMap)
    }

    pub fn field(name: &str) -> Self {
        Self::single(ParamAnnotation::Field {
            name: name.to_string(),
            encoded: false,
        })
    }

    pub fn field_encoded(name: &str) -> Self {
        Self::single(ParamAnnotation::Field {
            name: name.to_string(),
            encoded: true,
        })
    }

    pub fn field_map() -> Self {
        Self::single(ParamAnnotation::FieldMap { encoded: false })
    }

    pub fn part(name: &str) -> Self {
        Self::single(ParamAnnotation::Part {
            name: Some(name.to_string()),
            encoding: DEFAULT_PART_ENCODING.to_string(),
        })
    }

    /// An unnamed part: values must be complete [`Part`](crate::Part)s.
    pub fn raw_part() -> Self {
        Self::single(ParamAnnotation::Part {
            name: None,
            encoding: DEFAULT_PART_ENCODING.to_string(),
        })
        .of_type::<crate::multipart::Part>()
    }

    pub fn part_map() -> Self {
        Self::single(ParamAnnotation::PartMap {
            encoding: DEFAULT_PART_ENCODING.to_string(),
        })
    }

    /// A raw body: values are [`RequestBody`](crate::RequestBody) or text.
    pub fn body() -> Self {
        Self::single(ParamAnnotation::Body).of_type::<crate::http::RequestBody>()
    }

    /// A body serialized by the JSON converter.
    pub fn body_of<T: Serialize + 'static>() -> Self {
        Self::single(ParamAnnotation::Body).with_type(TypeInfo::serializable::<T>())
    }

    pub fn url() -> Self {
        Self::single(ParamAnnotation::Url)
    }

    /// Add another binding. The compiler rejects parameters with more than one.
    pub fn and(mut self, annotation: ParamAnnotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Declare the Rust type of the argument values.
    pub fn of_type<T: 'static>(self) -> Self {
        self.with_type(TypeInfo::of::<T>())
    }

    pub fn with_type(mut self, ty: TypeInfo) -> Self {
        self.ty = ty;
        self
    }

    pub fn annotations(&self) -> &[ParamAnnotation] {
        &self.annotations
    }

    pub fn ty(&self) -> &TypeInfo {
        &self.ty
    }
}

/// Builder for an endpoint declaration; finish with [`returns`](Self::returns).
#[derive(Debug, Clone)]
pub struct EndpointBuilder {
    name: Cow<'static, str>,
    annotations: Vec<MethodAnnotation>,
    params: Vec<Param>,
}

impl EndpointBuilder {
    fn verb(mut self, method: HttpMethod, path: &str, has_body: bool) -> Self {
        self.annotations.push(MethodAnnotation::Http {
            method,
            path: path.to_string(),
            has_body,
        });
        self
    }

    pub fn get(self, path: &str) -> Self {
        self.verb(HttpMethod::Get, path, false)
    }

    pub fn post(self, path: &str) -> Self {
        self.verb(HttpMethod::Post, path, true)
    }

    pub fn put(self, path: &str) -> Self {
        self.verb(HttpMethod::Put, path, true)
    }

    pub fn patch(self, path: &str) -> Self {
        self.verb(HttpMethod::Patch, path, true)
    }

    pub fn delete(self, path: &str) -> Self {
        self.verb(HttpMethod::Delete, path, false)
    }

    pub fn head(self, path: &str) -> Self {
        self.verb(HttpMethod::Head, path, false)
    }

    pub fn options(self, path: &str) -> Self {
        self.verb(HttpMethod::Options, path, false)
    }

    /// A custom verb, or a standard one with a non-default body flag.
    pub fn http(self, method: &str, path: &str, has_body: bool) -> Self {
        let method = match method {
            "GET" => HttpMethod::Get,
            "POST" => HttpMethod::Post,
            "PUT" => HttpMethod::Put,
            "PATCH" => HttpMethod::Patch,
            "DELETE" => HttpMethod::Delete,
            "HEAD" => HttpMethod::Head,
            "OPTIONS" => HttpMethod::Options,
            other => HttpMethod::Other(other.to_string()),
        };
        self.verb(method, path, has_body)
    }

    /// Static headers in `Name: Value` form.
    pub fn headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.annotations.push(MethodAnnotation::Headers(
            headers.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn form_url_encoded(mut self) -> Self {
        self.annotations.push(MethodAnnotation::FormUrlEncoded);
        self
    }

    pub fn multipart(mut self) -> Self {
        self.annotations.push(MethodAnnotation::Multipart);
        self
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// Finish with a result type decoded by the JSON converter (or a
    /// built-in converter when one matches first).
    pub fn returns<T: DeserializeOwned + Send + 'static>(self) -> Endpoint<T> {
        self.finish(TypeInfo::deserializable::<T>())
    }

    /// Finish with a result type only built-in or custom converters handle,
    /// such as [`ResponseBody`](crate::ResponseBody) or `()`.
    pub fn returns_raw<T: Send + 'static>(self) -> Endpoint<T> {
        self.finish(TypeInfo::of::<T>())
    }

    fn finish<T>(self, response: TypeInfo) -> Endpoint<T> {
        Endpoint {
            name: self.name,
            annotations: self.annotations,
            params: self.params,
            response,
            _result: PhantomData,
        }
    }
}

/// A declared remote operation producing values of type `T`.
pub struct Endpoint<T> {
    name: Cow<'static, str>,
    annotations: Vec<MethodAnnotation>,
    params: Vec<Param>,
    response: TypeInfo,
    _result: PhantomData<fn() -> T>,
}

impl Endpoint<()> {
    /// Start a declaration. The name identifies the endpoint in errors and
    /// in the client's descriptor cache, so it must be unique per client.
    pub fn named(name: impl Into<Cow<'static, str>>) -> EndpointBuilder {
        EndpointBuilder {
            name: name.into(),
            annotations: Vec::new(),
            params: Vec::new(),
        }
    }
}

impl<T> Endpoint<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn annotations(&self) -> &[MethodAnnotation] {
        &self.annotations
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn response_type(&self) -> &TypeInfo {
        &self.response
    }
}

impl<T> Clone for Endpoint<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            annotations: self.annotations.clone(),
            params: self.params.clone(),
            response: self.response,
            _result: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Endpoint<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .field("annotations", &self.annotations)
            .field("params", &self.params)
            .field("response", &self.response)
            .finish()
    }
}

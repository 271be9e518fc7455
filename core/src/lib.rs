//! Declarative HTTP client core.
//!
//! # Overview
//! Endpoints are declared as data (verb, URL template, parameter bindings,
//! result type) and compiled once into immutable descriptors. Each
//! invocation becomes a single-use, cancelable [`Call`] that builds the wire
//! request, hands it to a pluggable [`Transport`], converts the response and
//! delivers the result, optionally through a callback [`Executor`].
//!
//! # Design
//! - `Endpoint` declarations replace annotations; `ServiceMethod` is the
//!   compiled descriptor and the only place declarations are validated.
//! - Parameter binders are one sum type applied by a single match.
//! - The transport owns all I/O, so the core stays deterministic and is
//!   tested against scripted in-memory transports.
//! - Non-2xx statuses are data (`Response::Error`), not errors. Errors are
//!   reserved for configuration, arguments, I/O, conversion and cancellation.

pub mod adapter;
pub mod arg;
mod binder;
pub mod call;
pub mod client;
pub mod converter;
pub mod endpoint;
pub mod error;
pub mod executor;
pub mod http;
pub mod multipart;
mod request_builder;
pub mod response;
pub mod service_method;
pub mod transport;
pub mod types;

pub use adapter::{CallAdapter, ExecutorCallbackCall};
pub use arg::Arg;
pub use call::{Call, Callback, HttpCall};
pub use client::{Courier, CourierBuilder, ErrorBodyPolicy};
pub use converter::{
    BuiltInConverters, ConverterFactory, Converters, DisplayConverter, JsonConverterFactory,
    RequestBodyConverter, ResponseBodyConverter, StringConverter,
};
pub use endpoint::{Endpoint, EndpointBuilder, MethodAnnotation, Param, ParamAnnotation};
pub use error::{ConfigError, Error};
pub use executor::{
    Executor, ForegroundPlatform, ImmediateExecutor, LoopExecutor, Looper, PlainPlatform, Platform,
    ThreadExecutor,
};
pub use crate::http::{HttpMethod, HttpRequest, RawResponse, RequestBody, ResponseBody, ResponseMeta};
pub use multipart::{MultipartBuilder, Part};
pub use response::Response;
pub use service_method::ServiceMethod;
pub use transport::{Transport, TransportCall, TransportCallback};
pub use types::TypeInfo;

#[cfg(feature = "ureq")]
pub use transport::ureq::UreqTransport;

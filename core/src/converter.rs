//! Pluggable conversion between wire bytes and values.
//!
//! # Design
//! Converters come from an ordered list of [`ConverterFactory`]s. Each
//! lookup walks the list and takes the first factory that claims the
//! declared [`TypeInfo`]; the resolved converters are stored on the compiled
//! descriptor, so lookups only happen at compile time.
//!
//! Response converters are type-erased (they yield `Box<dyn Any + Send>`)
//! so that factories can be trait objects; the descriptor downcasts to the
//! endpoint's result type.

use std::any::Any;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::arg::Arg;
use crate::endpoint::{MethodAnnotation, ParamAnnotation};
use crate::error::Error;
use crate::http::{RequestBody, ResponseBody};
use crate::types::TypeInfo;

pub const JSON_MEDIA_TYPE: &str = "application/json; charset=UTF-8";

/// Turns an argument into a string for paths, queries, headers and fields.
pub trait StringConverter: Send + Sync {
    fn convert(&self, value: &Arg) -> Result<String, Error>;
}

/// Turns an argument into a request body for `Body` and `Part` bindings.
pub trait RequestBodyConverter: Send + Sync {
    fn convert(&self, value: Arg) -> Result<RequestBody, Error>;
}

/// Decodes a successful response body.
pub trait ResponseBodyConverter: Send + Sync {
    fn convert(&self, body: ResponseBody) -> Result<Box<dyn Any + Send>, Error>;
}

/// Supplies converters for the types it understands.
pub trait ConverterFactory: Send + Sync {
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn response_body_converter(
        &self,
        _ty: &TypeInfo,
        _annotations: &[MethodAnnotation],
    ) -> Option<Arc<dyn ResponseBodyConverter>> {
        None
    }

    fn request_body_converter(
        &self,
        _ty: &TypeInfo,
        _annotations: &[ParamAnnotation],
    ) -> Option<Arc<dyn RequestBodyConverter>> {
        None
    }

    fn string_converter(
        &self,
        _ty: &TypeInfo,
        _annotations: &[ParamAnnotation],
    ) -> Option<Arc<dyn StringConverter>> {
        None
    }
}

/// The ordered factory list of a client.
#[derive(Clone)]
pub struct Converters {
    factories: Vec<Arc<dyn ConverterFactory>>,
}

impl Converters {
    pub fn new(factories: Vec<Arc<dyn ConverterFactory>>) -> Self {
        Self { factories }
    }

    pub fn factory_names(&self) -> Vec<&'static str> {
        self.factories.iter().map(|f| f.name()).collect()
    }

    pub fn response_body_converter(
        &self,
        ty: &TypeInfo,
        annotations: &[MethodAnnotation],
    ) -> Result<Arc<dyn ResponseBodyConverter>, String> {
        self.factories
            .iter()
            .find_map(|f| f.response_body_converter(ty, annotations))
            .ok_or_else(|| self.not_found("ResponseBody", ty))
    }

    pub fn request_body_converter(
        &self,
        ty: &TypeInfo,
        annotations: &[ParamAnnotation],
    ) -> Result<Arc<dyn RequestBodyConverter>, String> {
        self.factories
            .iter()
            .find_map(|f| f.request_body_converter(ty, annotations))
            .ok_or_else(|| self.not_found("RequestBody", ty))
    }

    /// Falls back to [`DisplayConverter`] when no factory claims the type.
    pub fn string_converter(
        &self,
        ty: &TypeInfo,
        annotations: &[ParamAnnotation],
    ) -> Arc<dyn StringConverter> {
        self.factories
            .iter()
            .find_map(|f| f.string_converter(ty, annotations))
            .unwrap_or_else(|| Arc::new(DisplayConverter))
    }

    fn not_found(&self, what: &str, ty: &TypeInfo) -> String {
        let mut message = format!("Could not locate {what} converter for {}.\n  Tried:", ty.name());
        for name in self.factory_names() {
            let _ = write!(message, "\n   * {name}");
        }
        message
    }
}

/// Converters for the crate's own types: raw bodies, `()` and `String`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltInConverters;

impl ConverterFactory for BuiltInConverters {
    fn response_body_converter(
        &self,
        ty: &TypeInfo,
        _annotations: &[MethodAnnotation],
    ) -> Option<Arc<dyn ResponseBodyConverter>> {
        if ty.is::<ResponseBody>() {
            Some(Arc::new(BufferingConverter))
        } else if ty.is::<()>() {
            Some(Arc::new(UnitConverter))
        } else if ty.is::<String>() {
            Some(Arc::new(TextConverter))
        } else {
            None
        }
    }

    fn request_body_converter(
        &self,
        ty: &TypeInfo,
        _annotations: &[ParamAnnotation],
    ) -> Option<Arc<dyn RequestBodyConverter>> {
        if ty.is::<RequestBody>() || ty.is::<crate::multipart::Part>() {
            Some(Arc::new(PassthroughConverter))
        } else {
            None
        }
    }
}

struct BufferingConverter;

impl ResponseBodyConverter for BufferingConverter {
    fn convert(&self, body: ResponseBody) -> Result<Box<dyn Any + Send>, Error> {
        Ok(Box::new(body.buffer()?))
    }
}

struct UnitConverter;

impl ResponseBodyConverter for UnitConverter {
    fn convert(&self, _body: ResponseBody) -> Result<Box<dyn Any + Send>, Error> {
        Ok(Box::new(()))
    }
}

struct TextConverter;

impl ResponseBodyConverter for TextConverter {
    fn convert(&self, mut body: ResponseBody) -> Result<Box<dyn Any + Send>, Error> {
        let bytes = body.bytes()?;
        let text = String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::conversion(std::any::type_name::<String>(), e))?;
        Ok(Box::new(text))
    }
}

struct PassthroughConverter;

impl RequestBodyConverter for PassthroughConverter {
    fn convert(&self, value: Arg) -> Result<RequestBody, Error> {
        match value {
            Arg::Body(body) => Ok(body),
            Arg::Str(text) => Ok(RequestBody::text(&text)),
            other => Err(Error::Argument(format!(
                "expected a request body, found a {}",
                other.kind()
            ))),
        }
    }
}

/// The fallback string converter: scalars by their `Display` form.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisplayConverter;

impl StringConverter for DisplayConverter {
    fn convert(&self, value: &Arg) -> Result<String, Error> {
        match value {
            Arg::Str(s) => Ok(s.clone()),
            Arg::Int(v) => Ok(v.to_string()),
            Arg::UInt(v) => Ok(v.to_string()),
            Arg::Float(v) => Ok(v.to_string()),
            Arg::Bool(v) => Ok(v.to_string()),
            Arg::Json(serde_json::Value::String(s)) => Ok(s.clone()),
            Arg::Json(v) => Ok(v.to_string()),
            other => Err(Error::Argument(format!(
                "cannot convert a {} value to a string",
                other.kind()
            ))),
        }
    }
}

/// JSON bodies through serde, for types declared with serde hooks.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonConverterFactory;

impl ConverterFactory for JsonConverterFactory {
    fn response_body_converter(
        &self,
        ty: &TypeInfo,
        _annotations: &[MethodAnnotation],
    ) -> Option<Arc<dyn ResponseBodyConverter>> {
        let decode = ty.json_decoder()?;
        Some(Arc::new(JsonResponseConverter {
            type_name: ty.name(),
            decode,
        }))
    }

    fn request_body_converter(
        &self,
        ty: &TypeInfo,
        _annotations: &[ParamAnnotation],
    ) -> Option<Arc<dyn RequestBodyConverter>> {
        if ty.is_serializable() {
            Some(Arc::new(JsonRequestConverter))
        } else {
            None
        }
    }
}

struct JsonResponseConverter {
    type_name: &'static str,
    decode: crate::types::DecodeFn,
}

impl ResponseBodyConverter for JsonResponseConverter {
    fn convert(&self, mut body: ResponseBody) -> Result<Box<dyn Any + Send>, Error> {
        let bytes = body.bytes()?;
        (self.decode)(&bytes).map_err(|e| Error::conversion(self.type_name, e))
    }
}

struct JsonRequestConverter;

impl RequestBodyConverter for JsonRequestConverter {
    fn convert(&self, value: Arg) -> Result<RequestBody, Error> {
        let json = to_json(value)?;
        let bytes = serde_json::to_vec(&json).map_err(|e| Error::conversion("serde_json::Value", e))?;
        Ok(RequestBody::new(Some(JSON_MEDIA_TYPE), bytes))
    }
}

fn to_json(value: Arg) -> Result<serde_json::Value, Error> {
    use serde_json::Value;
    Ok(match value {
        Arg::Null => Value::Null,
        Arg::Str(s) => Value::String(s),
        Arg::Int(v) => Value::from(v),
        Arg::UInt(v) => Value::from(v),
        Arg::Float(v) => Value::from(v),
        Arg::Bool(v) => Value::Bool(v),
        Arg::Json(v) => v,
        Arg::List(items) => Value::Array(items.into_iter().map(to_json).collect::<Result<_, _>>()?),
        Arg::Map(entries) => Value::Object(
            entries
                .into_iter()
                .map(|(k, v)| to_json(v).map(|v| (k, v)))
                .collect::<Result<_, _>>()?,
        ),
        other => {
            return Err(Error::Argument(format!(
                "a {} value cannot be encoded as JSON",
                other.kind()
            )))
        }
    })
}

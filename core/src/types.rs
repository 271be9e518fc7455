//! Runtime descriptions of declared Rust types.
//!
//! # Design
//! Endpoint declarations name their result and parameter types through a
//! [`TypeInfo`]. Converter factories inspect it to decide whether they can
//! handle the type: built-in converters match on the `TypeId`, the JSON
//! factory uses the serde hooks captured when the type was declared.

use std::any::{Any, TypeId};
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Decodes a JSON payload into a boxed value of the captured type.
pub type DecodeFn = fn(&[u8]) -> Result<Box<dyn Any + Send>, serde_json::Error>;

#[derive(Clone, Copy)]
pub struct TypeInfo {
    id: TypeId,
    name: &'static str,
    decode: Option<DecodeFn>,
    serializable: bool,
}

impl TypeInfo {
    /// An opaque type. Only factories that recognize its `TypeId` can
    /// convert it.
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            decode: None,
            serializable: false,
        }
    }

    /// A type the JSON factory can decode response bodies into.
    pub fn deserializable<T: DeserializeOwned + Send + 'static>() -> Self {
        Self {
            decode: Some(decode_json::<T> as DecodeFn),
            ..Self::of::<T>()
        }
    }

    /// A type the JSON factory can encode as a request body.
    pub fn serializable<T: Serialize + 'static>() -> Self {
        Self {
            serializable: true,
            ..Self::of::<T>()
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }

    pub fn json_decoder(&self) -> Option<DecodeFn> {
        self.decode
    }

    pub fn is_serializable(&self) -> bool {
        self.serializable
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("name", &self.name)
            .field("json", &self.decode.is_some())
            .field("serializable", &self.serializable)
            .finish()
    }
}

fn decode_json<T: DeserializeOwned + Send + 'static>(
    bytes: &[u8],
) -> Result<Box<dyn Any + Send>, serde_json::Error> {
    let value: T = serde_json::from_slice(bytes)?;
    Ok(Box::new(value))
}

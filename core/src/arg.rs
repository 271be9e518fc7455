//! Runtime argument values.
//!
//! Typed client methods turn their Rust arguments into a slice of [`Arg`],
//! one per declared parameter, in declaration order. `Arg::Null` is the
//! "absent" value that optional bindings skip.

use std::collections::{BTreeMap, HashMap};

use indexmap::IndexMap;
use serde::Serialize;

use crate::http::RequestBody;
use crate::multipart::Part;

#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Null,
    Str(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    /// Expands to repeated keys for query, header, field and part bindings.
    List(Vec<Arg>),
    /// Ordered name/value pairs for the `*Map` bindings.
    Map(Vec<(String, Arg)>),
    /// A serialized body payload, encoded by a request body converter.
    Json(serde_json::Value),
    /// A body that needs no conversion.
    Body(RequestBody),
    /// A complete multipart section.
    Part(Part),
}

impl Arg {
    /// Serialize `value` into a JSON payload argument.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Arg::Json)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Arg::Null)
    }

    /// Name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Arg::Null => "null",
            Arg::Str(_) => "string",
            Arg::Int(_) | Arg::UInt(_) => "integer",
            Arg::Float(_) => "float",
            Arg::Bool(_) => "bool",
            Arg::List(_) => "list",
            Arg::Map(_) => "map",
            Arg::Json(_) => "json",
            Arg::Body(_) => "body",
            Arg::Part(_) => "part",
        }
    }
}

impl From<&str> for Arg {
    fn from(v: &str) -> Self {
        Arg::Str(v.to_string())
    }
}

impl From<String> for Arg {
    fn from(v: String) -> Self {
        Arg::Str(v)
    }
}

impl From<&String> for Arg {
    fn from(v: &String) -> Self {
        Arg::Str(v.clone())
    }
}

macro_rules! signed {
    ($($t:ty),*) => {
        $(impl From<$t> for Arg {
            fn from(v: $t) -> Self {
                Arg::Int(v as i64)
            }
        })*
    };
}

macro_rules! unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for Arg {
            fn from(v: $t) -> Self {
                Arg::UInt(v as u64)
            }
        })*
    };
}

signed!(i8, i16, i32, i64, isize);
unsigned!(u8, u16, u32, u64, usize);

impl From<f32> for Arg {
    fn from(v: f32) -> Self {
        Arg::Float(v as f64)
    }
}

impl From<f64> for Arg {
    fn from(v: f64) -> Self {
        Arg::Float(v)
    }
}

impl From<bool> for Arg {
    fn from(v: bool) -> Self {
        Arg::Bool(v)
    }
}

impl From<url::Url> for Arg {
    fn from(v: url::Url) -> Self {
        Arg::Str(v.into())
    }
}

impl From<RequestBody> for Arg {
    fn from(v: RequestBody) -> Self {
        Arg::Body(v)
    }
}

impl From<Part> for Arg {
    fn from(v: Part) -> Self {
        Arg::Part(v)
    }
}

impl<T: Into<Arg>> From<Option<T>> for Arg {
    fn from(v: Option<T>) -> Self {
        v.map_or(Arg::Null, Into::into)
    }
}

impl<T: Into<Arg>> From<Vec<T>> for Arg {
    fn from(v: Vec<T>) -> Self {
        Arg::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Arg>> From<BTreeMap<String, T>> for Arg {
    fn from(v: BTreeMap<String, T>) -> Self {
        Arg::Map(v.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Arg>> From<IndexMap<String, T>> for Arg {
    fn from(v: IndexMap<String, T>) -> Self {
        Arg::Map(v.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

/// Entries are sorted by key so the resulting request is deterministic.
impl<T: Into<Arg>, S> From<HashMap<String, T, S>> for Arg {
    fn from(v: HashMap<String, T, S>) -> Self {
        let mut entries: Vec<(String, Arg)> = v.into_iter().map(|(k, v)| (k, v.into())).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Arg::Map(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_convert() {
        assert_eq!(Arg::from("square"), Arg::Str("square".to_string()));
        assert_eq!(Arg::from(3_i32), Arg::Int(3));
        assert_eq!(Arg::from(3_u16), Arg::UInt(3));
        assert_eq!(Arg::from(true), Arg::Bool(true));
        assert_eq!(Arg::from(None::<String>), Arg::Null);
    }

    #[test]
    fn hash_maps_are_sorted() {
        let mut map = HashMap::new();
        map.insert("since".to_string(), "2016-03-29");
        map.insert("q".to_string(), "retrofit");
        map.insert("page".to_string(), "1");
        let Arg::Map(entries) = Arg::from(map) else {
            panic!("expected map");
        };
        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["page", "q", "since"]);
    }

    #[test]
    fn index_maps_keep_insertion_order() {
        let mut map = IndexMap::new();
        map.insert("q".to_string(), "retrofit");
        map.insert("since".to_string(), "2016-03-29");
        map.insert("page".to_string(), "1");
        map.insert("per_page".to_string(), "3");
        let Arg::Map(entries) = Arg::from(map) else {
            panic!("expected map");
        };
        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["q", "since", "page", "per_page"]);
    }

    #[test]
    fn json_payload() {
        #[derive(Serialize)]
        struct Issue<'a> {
            title: &'a str,
        }
        let arg = Arg::json(&Issue { title: "crash" }).unwrap();
        assert_eq!(arg, Arg::Json(serde_json::json!({"title": "crash"})));
        assert_eq!(arg.kind(), "json");
    }
}

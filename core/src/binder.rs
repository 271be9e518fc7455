//! Parameter binders: one variant per binding kind, applied by a single match.

use std::fmt;
use std::sync::Arc;

use crate::arg::Arg;
use crate::converter::{RequestBodyConverter, StringConverter};
use crate::error::Error;
use crate::multipart::Part;
use crate::request_builder::RequestBuilder;

#[derive(Clone)]
pub(crate) enum ParameterBinder {
    RelativeUrl,
    Path {
        name: String,
        converter: Arc<dyn StringConverter>,
        encoded: bool,
    },
    Query {
        name: String,
        converter: Arc<dyn StringConverter>,
        encoded: bool,
    },
    QueryName {
        converter: Arc<dyn StringConverter>,
        encoded: bool,
    },
    QueryMap {
        converter: Arc<dyn StringConverter>,
        encoded: bool,
    },
    Header {
        name: String,
        converter: Arc<dyn StringConverter>,
    },
    HeaderMap {
        converter: Arc<dyn StringConverter>,
    },
    Field {
        name: String,
        converter: Arc<dyn StringConverter>,
        encoded: bool,
    },
    FieldMap {
        converter: Arc<dyn StringConverter>,
        encoded: bool,
    },
    Part {
        name: String,
        encoding: String,
        converter: Arc<dyn RequestBodyConverter>,
    },
    RawPart,
    PartMap {
        encoding: String,
        converter: Arc<dyn RequestBodyConverter>,
    },
    Body {
        converter: Arc<dyn RequestBodyConverter>,
    },
}

impl ParameterBinder {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            ParameterBinder::RelativeUrl => "Url",
            ParameterBinder::Path { .. } => "Path",
            ParameterBinder::Query { .. } => "Query",
            ParameterBinder::QueryName { .. } => "QueryName",
            ParameterBinder::QueryMap { .. } => "QueryMap",
            ParameterBinder::Header { .. } => "Header",
            ParameterBinder::HeaderMap { .. } => "HeaderMap",
            ParameterBinder::Field { .. } => "Field",
            ParameterBinder::FieldMap { .. } => "FieldMap",
            ParameterBinder::Part { .. } => "Part",
            ParameterBinder::RawPart => "Part",
            ParameterBinder::PartMap { .. } => "PartMap",
            ParameterBinder::Body { .. } => "Body",
        }
    }

    /// Write one argument into the request under construction.
    pub(crate) fn apply(&self, builder: &mut RequestBuilder, value: Arg) -> Result<(), Error> {
        match self {
            ParameterBinder::RelativeUrl => match value {
                Arg::Null => Err(Error::Argument("Url parameter is null.".to_string())),
                Arg::Str(url) => {
                    builder.set_relative_url(url);
                    Ok(())
                }
                other => Err(Error::Argument(format!(
                    "Url parameter must be a string or URL, found a {}",
                    other.kind()
                ))),
            },
            ParameterBinder::Path {
                name,
                converter,
                encoded,
            } => {
                if value.is_null() {
                    return Err(Error::Argument(format!(
                        "Path parameter \"{name}\" value must not be null."
                    )));
                }
                let value = converter.convert(&value)?;
                builder.add_path_param(name, &value, *encoded)
            }
            ParameterBinder::Query {
                name,
                converter,
                encoded,
            } => each(value, |v| {
                let v = converter.convert(&v)?;
                builder.add_query_param(name, Some(&v), *encoded);
                Ok(())
            }),
            ParameterBinder::QueryName { converter, encoded } => each(value, |v| {
                let v = converter.convert(&v)?;
                builder.add_query_param(&v, None, *encoded);
                Ok(())
            }),
            ParameterBinder::QueryMap { converter, encoded } => {
                for (k, v) in entries("Query", value)? {
                    let v = converter.convert(&v)?;
                    builder.add_query_param(&k, Some(&v), *encoded);
                }
                Ok(())
            }
            ParameterBinder::Header { name, converter } => each(value, |v| {
                let v = converter.convert(&v)?;
                builder.add_header(name, &v)
            }),
            ParameterBinder::HeaderMap { converter } => {
                for (k, v) in entries("Header", value)? {
                    let v = converter.convert(&v)?;
                    builder.add_header(&k, &v)?;
                }
                Ok(())
            }
            ParameterBinder::Field {
                name,
                converter,
                encoded,
            } => each(value, |v| {
                let v = converter.convert(&v)?;
                builder.add_form_field(name, &v, *encoded)
            }),
            ParameterBinder::FieldMap { converter, encoded } => {
                for (k, v) in entries("Field", value)? {
                    let v = converter.convert(&v)?;
                    builder.add_form_field(&k, &v, *encoded)?;
                }
                Ok(())
            }
            ParameterBinder::Part {
                name,
                encoding,
                converter,
            } => each(value, |v| {
                let body = converter.convert(v)?;
                builder.add_part(Part::named(name, encoding, body)?)
            }),
            ParameterBinder::RawPart => each(value, |v| match v {
                Arg::Part(part) => builder.add_part(part),
                other => Err(Error::Argument(format!(
                    "unnamed Part parameters take complete parts, found a {}",
                    other.kind()
                ))),
            }),
            ParameterBinder::PartMap { encoding, converter } => {
                for (k, v) in entries("Part", value)? {
                    if matches!(v, Arg::Part(_)) {
                        return Err(Error::Argument(
                            "PartMap values cannot be complete parts.".to_string(),
                        ));
                    }
                    let body = converter.convert(v)?;
                    builder.add_part(Part::named(&k, encoding, body)?)?;
                }
                Ok(())
            }
            ParameterBinder::Body { converter } => {
                if value.is_null() {
                    return Ok(());
                }
                builder.set_body(converter.convert(value)?);
                Ok(())
            }
        }
    }
}

impl fmt::Debug for ParameterBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterBinder::Path { name, .. }
            | ParameterBinder::Query { name, .. }
            | ParameterBinder::Header { name, .. }
            | ParameterBinder::Field { name, .. }
            | ParameterBinder::Part { name, .. } => write!(f, "{}({name})", self.kind()),
            _ => f.write_str(self.kind()),
        }
    }
}

/// Apply `f` to a scalar, or to every non-null element of a list. Null
/// contributes nothing.
fn each<F>(value: Arg, mut f: F) -> Result<(), Error>
where
    F: FnMut(Arg) -> Result<(), Error>,
{
    match value {
        Arg::Null => Ok(()),
        Arg::List(items) => items.into_iter().filter(|v| !v.is_null()).try_for_each(f),
        other => f(other),
    }
}

fn entries(kind: &str, value: Arg) -> Result<Vec<(String, Arg)>, Error> {
    match value {
        Arg::Null => Err(Error::Argument(format!("{kind} map was null."))),
        Arg::Map(entries) => {
            if let Some((key, _)) = entries.iter().find(|(_, v)| v.is_null()) {
                return Err(Error::Argument(format!(
                    "{kind} map contained null value for key '{key}'."
                )));
            }
            Ok(entries)
        }
        other => Err(Error::Argument(format!(
            "{kind} map parameter must be a map, found a {}",
            other.kind()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::DisplayConverter;
    use crate::http::HttpMethod;
    use crate::request_builder::RequestTemplate;
    use http::HeaderMap;
    use url::Url;

    fn builder(relative: &str) -> RequestBuilder {
        RequestBuilder::new(&RequestTemplate {
            method: HttpMethod::Get,
            base_url: Url::parse("https://api.github.com/").unwrap(),
            relative_url: Some(relative.to_string()),
            headers: HeaderMap::new(),
            content_type: None,
            has_body: false,
            form_encoded: false,
            multipart: false,
        })
    }

    fn display() -> Arc<dyn StringConverter> {
        Arc::new(DisplayConverter)
    }

    #[test]
    fn null_path_is_fatal() {
        let binder = ParameterBinder::Path {
            name: "owner".to_string(),
            converter: display(),
            encoded: false,
        };
        let err = binder.apply(&mut builder("repos/{owner}"), Arg::Null).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid argument: Path parameter \"owner\" value must not be null."
        );
    }

    #[test]
    fn list_query_expands_and_skips_nulls() {
        let binder = ParameterBinder::Query {
            name: "label".to_string(),
            converter: display(),
            encoded: false,
        };
        let mut b = builder("issues");
        let value = Arg::List(vec!["bug".into(), Arg::Null, "ui".into()]);
        binder.apply(&mut b, value).unwrap();
        assert_eq!(b.build().unwrap().url.query(), Some("label=bug&label=ui"));
    }

    #[test]
    fn null_query_contributes_nothing() {
        let binder = ParameterBinder::Query {
            name: "page".to_string(),
            converter: display(),
            encoded: false,
        };
        let mut b = builder("issues");
        binder.apply(&mut b, Arg::Null).unwrap();
        assert_eq!(b.build().unwrap().url.query(), None);
    }

    #[test]
    fn query_map_rejects_null_values() {
        let binder = ParameterBinder::QueryMap {
            converter: display(),
            encoded: false,
        };
        let value = Arg::Map(vec![("q".to_string(), Arg::Null)]);
        let err = binder.apply(&mut builder("search"), value).unwrap_err();
        assert!(err.to_string().contains("Query map contained null value for key 'q'."));
        let err = binder.apply(&mut builder("search"), Arg::Null).unwrap_err();
        assert!(err.to_string().contains("Query map was null."));
    }

    #[test]
    fn query_name_adds_bare_names() {
        let binder = ParameterBinder::QueryName {
            converter: display(),
            encoded: false,
        };
        let mut b = builder("issues");
        binder.apply(&mut b, Arg::List(vec!["open".into(), "mine".into()])).unwrap();
        assert_eq!(b.build().unwrap().url.query(), Some("open&mine"));
    }

    #[test]
    fn header_map_appends() {
        let binder = ParameterBinder::HeaderMap { converter: display() };
        let mut b = builder("x");
        b.add_header("Accept", "text/html").unwrap();
        let value = Arg::Map(vec![("Accept".to_string(), "application/json".into())]);
        binder.apply(&mut b, value).unwrap();
        assert_eq!(
            b.build().unwrap().header_values("accept"),
            ["text/html", "application/json"]
        );
    }

    #[test]
    fn url_binder_requires_a_value() {
        let err = ParameterBinder::RelativeUrl
            .apply(&mut builder("x"), Arg::Null)
            .unwrap_err();
        assert!(matches!(err, Error::Argument(_)));
    }
}

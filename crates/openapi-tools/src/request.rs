//! Turning tool-call arguments into a backend request.

use crate::error::{OpenApiToolsError, Result};
use ontoportal_http_tools::backend::BackendRequest;
use openapiv3::QueryStyle;
use reqwest::Method;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ParamLocation {
    Path,
    Query,
    Header,
    Body,
}

/// How a query parameter is serialized (`OpenAPI` `style` / `explode` / `allowReserved`).
#[derive(Debug, Clone)]
pub(crate) struct QuerySerialization {
    pub(crate) style: QueryStyle,
    pub(crate) explode: bool,
    pub(crate) allow_reserved: bool,
    pub(crate) allow_empty_value: bool,
}

impl QuerySerialization {
    pub(crate) fn new(
        style: QueryStyle,
        explode: Option<bool>,
        allow_reserved: bool,
        allow_empty_value: bool,
    ) -> Self {
        let explode =
            explode.unwrap_or(matches!(style, QueryStyle::Form | QueryStyle::DeepObject));
        Self {
            style,
            explode,
            allow_reserved,
            allow_empty_value,
        }
    }
}

/// One tool argument and where it lands in the backend request.
#[derive(Debug, Clone)]
pub(crate) struct ToolParameter {
    /// Argument name as exposed in the tool's input schema.
    pub(crate) name: String,
    pub(crate) location: ParamLocation,
    pub(crate) required: bool,
    pub(crate) schema: Value,
    pub(crate) query: Option<QuerySerialization>,
    /// The argument is the whole (non-object) JSON body rather than one of its properties.
    pub(crate) whole_body: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct QueryPair {
    key: String,
    value: String,
    allow_reserved: bool,
}

/// Build the backend request for one call. `path_template` uses `{name}` placeholders.
pub(crate) fn build_request(
    method: &Method,
    path_template: &str,
    parameters: &[ToolParameter],
    arguments: &Map<String, Value>,
) -> Result<BackendRequest> {
    let mut path = path_template.to_string();
    let mut pairs: Vec<QueryPair> = Vec::new();
    let mut headers: Vec<(String, String)> = Vec::new();
    let mut body_fields = Map::new();
    let mut whole_body: Option<Value> = None;

    let missing: Vec<&str> = parameters
        .iter()
        .filter(|p| p.required && matches!(arguments.get(&p.name), None | Some(Value::Null)))
        .map(|p| p.name.as_str())
        .collect();
    if !missing.is_empty() {
        return Err(OpenApiToolsError::InvalidArguments(format!(
            "Missing required parameter: {}",
            missing.join(", ")
        )));
    }

    for param in parameters {
        let Some(value) = arguments.get(&param.name).filter(|v| !v.is_null()) else {
            continue;
        };
        match param.location {
            ParamLocation::Path => {
                let encoded = percent_encode(&scalar_text(value), false);
                path = path.replace(&format!("{{{}}}", param.name), &encoded);
            }
            ParamLocation::Query => {
                pairs.extend(serialize_query(&param.name, value, param.required, param.query.as_ref()));
            }
            ParamLocation::Header => headers.push((param.name.clone(), scalar_text(value))),
            ParamLocation::Body if param.whole_body => whole_body = Some(value.clone()),
            ParamLocation::Body => {
                body_fields.insert(param.name.clone(), value.clone());
            }
        }
    }

    if !path.starts_with('/') {
        path.insert(0, '/');
    }

    let mut request = BackendRequest::new(method.clone(), path).query(encode_pairs(&pairs));
    request.headers = headers;
    request.json_body = whole_body.or_else(|| (!body_fields.is_empty()).then_some(Value::Object(body_fields)));
    Ok(request)
}

fn serialize_query(
    name: &str,
    value: &Value,
    required: bool,
    ser: Option<&QuerySerialization>,
) -> Vec<QueryPair> {
    let default_ser;
    let ser = match ser {
        Some(s) => s,
        None => {
            default_ser = QuerySerialization::new(QueryStyle::Form, None, false, false);
            &default_ser
        }
    };
    let pair = |key: String, value: String| QueryPair {
        key,
        value,
        allow_reserved: ser.allow_reserved,
    };

    let is_empty = match value {
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Null => true,
        Value::Bool(_) | Value::Number(_) => false,
    };
    if is_empty {
        return if required || ser.allow_empty_value {
            vec![pair(name.to_string(), String::new())]
        } else {
            Vec::new()
        };
    }

    match value {
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(scalar_text).collect();
            match (&ser.style, ser.explode) {
                (QueryStyle::Form, true) => items
                    .into_iter()
                    .map(|v| pair(name.to_string(), v))
                    .collect(),
                (QueryStyle::SpaceDelimited, _) => vec![pair(name.to_string(), items.join(" "))],
                (QueryStyle::PipeDelimited, _) => vec![pair(name.to_string(), items.join("|"))],
                _ => vec![pair(name.to_string(), items.join(","))],
            }
        }
        Value::Object(map) => match (&ser.style, ser.explode) {
            (QueryStyle::DeepObject, _) => map
                .iter()
                .map(|(k, v)| pair(format!("{name}[{k}]"), scalar_text(v)))
                .collect(),
            (QueryStyle::Form, true) => map
                .iter()
                .map(|(k, v)| pair(k.clone(), scalar_text(v)))
                .collect(),
            (QueryStyle::Form, false) => {
                let flat: Vec<String> = map
                    .iter()
                    .flat_map(|(k, v)| [k.clone(), scalar_text(v)])
                    .collect();
                vec![pair(name.to_string(), flat.join(","))]
            }
            _ => vec![pair(name.to_string(), value.to_string())],
        },
        _ => vec![pair(name.to_string(), scalar_text(value))],
    }
}

fn encode_pairs(pairs: &[QueryPair]) -> String {
    pairs
        .iter()
        .map(|p| {
            format!(
                "{}={}",
                percent_encode(&p.key, false),
                percent_encode(&p.value, p.allow_reserved)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Percent-encode everything outside RFC 3986 unreserved characters. With `allow_reserved`,
/// reserved characters other than the pair separators `&`, `=` and `#` are kept.
fn percent_encode(s: &str, allow_reserved: bool) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(s.len());
    for &b in s.as_bytes() {
        let unreserved = b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~');
        let reserved_ok = allow_reserved && b"!$'()*+,/:;?@[]".contains(&b);
        if unreserved || reserved_ok {
            out.push(char::from(b));
        } else {
            out.push('%');
            out.push(char::from(HEX[usize::from(b >> 4)]));
            out.push(char::from(HEX[usize::from(b & 0x0F)]));
        }
    }
    out
}

/// Text form of a JSON value for path, header and query positions.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn param(name: &str, location: ParamLocation, required: bool) -> ToolParameter {
        ToolParameter {
            name: name.to_string(),
            location,
            required,
            schema: json!({"type": "string"}),
            query: None,
            whole_body: false,
        }
    }

    fn args(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn substitutes_and_encodes_path_parameters() {
        let params = [
            param("acronym", ParamLocation::Path, true),
            param("cls", ParamLocation::Path, true),
        ];
        let req = build_request(
            &Method::GET,
            "/ontologies/{acronym}/classes/{cls}",
            &params,
            &args(json!({"acronym": "GO", "cls": "http://purl.obolibrary.org/obo/GO_0008150"})),
        )
        .unwrap();
        assert_eq!(
            req.url,
            "/ontologies/GO/classes/http%3A%2F%2Fpurl.obolibrary.org%2Fobo%2FGO_0008150"
        );
        assert!(req.query.is_none());
    }

    #[test]
    fn reports_all_missing_required_parameters() {
        let params = [
            param("q", ParamLocation::Query, true),
            param("acronym", ParamLocation::Path, true),
            param("page", ParamLocation::Query, false),
        ];
        let err = build_request(&Method::GET, "/x/{acronym}", &params, &args(json!({"q": null})))
            .unwrap_err();
        assert!(matches!(err, OpenApiToolsError::InvalidArguments(_)));
        assert_eq!(
            err.to_string(),
            "Invalid arguments: Missing required parameter: q, acronym"
        );
    }

    #[test]
    fn query_styles_follow_openapi_rules() {
        let form_exploded = QuerySerialization::new(QueryStyle::Form, None, false, false);
        let pairs = serialize_query("ontologies", &json!(["GO", "NCIT"]), false, Some(&form_exploded));
        assert_eq!(encode_pairs(&pairs), "ontologies=GO&ontologies=NCIT");

        let form_flat = QuerySerialization::new(QueryStyle::Form, Some(false), false, false);
        let pairs = serialize_query("ontologies", &json!(["GO", "NCIT"]), false, Some(&form_flat));
        assert_eq!(encode_pairs(&pairs), "ontologies=GO%2CNCIT");

        let reserved = QuerySerialization::new(QueryStyle::Form, Some(false), true, false);
        let pairs = serialize_query("ontologies", &json!(["GO", "NCIT"]), false, Some(&reserved));
        assert_eq!(encode_pairs(&pairs), "ontologies=GO,NCIT");

        let pipe = QuerySerialization::new(QueryStyle::PipeDelimited, None, false, false);
        let pairs = serialize_query("ids", &json!([1, 2]), false, Some(&pipe));
        assert_eq!(encode_pairs(&pairs), "ids=1%7C2");

        let deep = QuerySerialization::new(QueryStyle::DeepObject, None, false, false);
        let pairs = serialize_query("filter", &json!({"lang": "en"}), false, Some(&deep));
        assert_eq!(encode_pairs(&pairs), "filter%5Blang%5D=en");
    }

    #[test]
    fn empty_query_values_are_dropped_unless_required() {
        assert!(serialize_query("q", &json!(""), false, None).is_empty());
        let pairs = serialize_query("q", &json!(""), true, None);
        assert_eq!(encode_pairs(&pairs), "q=");
    }

    #[test]
    fn body_properties_and_headers_are_collected() {
        let mut whole = param("body", ParamLocation::Body, false);
        whole.whole_body = true;
        let params = [
            param("x-trace", ParamLocation::Header, false),
            param("name", ParamLocation::Body, true),
            param("note", ParamLocation::Body, false),
        ];
        let req = build_request(
            &Method::POST,
            "notes",
            &params,
            &args(json!({"x-trace": 7, "name": "n1"})),
        )
        .unwrap();
        assert_eq!(req.url, "/notes");
        assert_eq!(req.headers, vec![("x-trace".to_string(), "7".to_string())]);
        assert_eq!(req.json_body, Some(json!({"name": "n1"})));

        let req = build_request(&Method::PUT, "/raw", &[whole], &args(json!({"body": [1, 2]})))
            .unwrap();
        assert_eq!(req.json_body, Some(json!([1, 2])));
    }
}

//! SPARQL result term → shaped value conversion.
//!
//! Converts one binding term (`{type, value, datatype?, "xml:lang"?}`) into a
//! scalar or a compound `{value, datatype}` / `{value, language}` object,
//! honoring the accept-type filter. Unrecognized term types convert to `None`
//! and the leaf is dropped from that row.

use serde_json::{json, Value};

use crate::config::{LangTag, Vocabulary};

const XSD_INT_TYPES: &[&str] = &[
    "http://www.w3.org/2001/XMLSchema#integer",
    "http://www.w3.org/2001/XMLSchema#nonPositiveInteger",
    "http://www.w3.org/2001/XMLSchema#negativeInteger",
    "http://www.w3.org/2001/XMLSchema#nonNegativeInteger",
    "http://www.w3.org/2001/XMLSchema#positiveInteger",
    "http://www.w3.org/2001/XMLSchema#long",
    "http://www.w3.org/2001/XMLSchema#int",
    "http://www.w3.org/2001/XMLSchema#short",
    "http://www.w3.org/2001/XMLSchema#byte",
    "http://www.w3.org/2001/XMLSchema#unsignedLong",
    "http://www.w3.org/2001/XMLSchema#unsignedInt",
    "http://www.w3.org/2001/XMLSchema#unsignedShort",
    "http://www.w3.org/2001/XMLSchema#unsignedByte",
];

const XSD_BOOLEAN_TYPES: &[&str] = &["http://www.w3.org/2001/XMLSchema#boolean"];

const XSD_FLOAT_TYPES: &[&str] = &[
    "http://www.w3.org/2001/XMLSchema#decimal",
    "http://www.w3.org/2001/XMLSchema#float",
    "http://www.w3.org/2001/XMLSchema#double",
];

const XSD_DATE_TYPES: &[&str] = &[
    "http://www.w3.org/2001/XMLSchema#date",
    "http://www.w3.org/2001/XMLSchema#dateTime",
];

/// Runtime type of a coerced scalar, matched against the accept table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuntimeType {
    Integer,
    Real,
    Text,
    Boolean,
}

fn runtime_type(value: &Value) -> Option<RuntimeType> {
    match value {
        Value::Bool(_) => Some(RuntimeType::Boolean),
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                Some(RuntimeType::Integer)
            } else {
                Some(RuntimeType::Real)
            }
        }
        Value::String(_) => Some(RuntimeType::Text),
        _ => None,
    }
}

/// Allowed runtime types for a given accept key; `None` for unknown keys.
fn accept_families(accept: &str) -> Option<&'static [RuntimeType]> {
    match accept {
        "int" => Some(&[RuntimeType::Integer]),
        "float" => Some(&[RuntimeType::Real]),
        "number" => Some(&[RuntimeType::Integer, RuntimeType::Real]),
        "str" | "string" => Some(&[RuntimeType::Text]),
        "bool" | "boolean" => Some(&[RuntimeType::Boolean]),
        "date" | "datetime" => Some(&[RuntimeType::Text]),
        _ => None,
    }
}

fn wrap_list(value: Value, as_list: bool) -> Value {
    if as_list {
        Value::Array(vec![value])
    } else {
        value
    }
}

/// Shape a single binding term.
///
/// Returns `None` when the leaf must be dropped: unknown term type, or a
/// coerced value whose runtime type fails the accept filter. An unknown
/// accept key fails open (logged, validation bypassed).
pub(crate) fn to_shaped_value(
    term: &Value,
    key: &str,
    vocab: &Vocabulary,
    lang_tag: LangTag,
    accept: Option<&str>,
    as_list: bool,
) -> Option<Value> {
    let term = term.as_object()?;
    let term_type = term.get("type").and_then(Value::as_str)?;
    let raw = term.get("value").and_then(Value::as_str)?;

    match term_type {
        // URIs are identities: bare under the id key, wrapped elsewhere.
        "uri" => {
            let shaped = if key == vocab.id {
                Value::String(raw.to_string())
            } else {
                json!({vocab.id: raw})
            };
            Some(wrap_list(shaped, as_list))
        }
        "literal" => {
            let datatype = term.get("datatype").and_then(Value::as_str);
            let language = term.get("xml:lang").and_then(Value::as_str);

            let mut compound_datatype = false;
            let mut compound_language = false;
            let mut coerced = Value::String(raw.to_string());

            if let Some(dt) = datatype {
                if XSD_BOOLEAN_TYPES.contains(&dt) {
                    coerced = Value::Bool(!matches!(raw, "false" | "0" | "False"));
                } else if XSD_INT_TYPES.contains(&dt) {
                    match raw.parse::<i64>() {
                        Ok(n) => coerced = json!(n),
                        Err(_) => {
                            tracing::warn!(value = raw, datatype = dt, "unparsable integer literal kept as string");
                        }
                    }
                } else if XSD_FLOAT_TYPES.contains(&dt) {
                    // Virtuoso spells infinities as INF/-INF.
                    let numeric = raw.replace("INF", "inf");
                    match numeric
                        .parse::<f64>()
                        .ok()
                        .and_then(serde_json::Number::from_f64)
                    {
                        Some(n) => coerced = Value::Number(n),
                        None => {
                            tracing::warn!(value = raw, datatype = dt, "non-finite or unparsable real kept as string");
                        }
                    }
                } else if XSD_DATE_TYPES.contains(&dt) {
                    compound_datatype = true;
                } else {
                    compound_datatype = true;
                }
            } else if language.is_some() && lang_tag != LangTag::Hide {
                compound_language = true;
            }

            if let Some(accept) = accept {
                match accept_families(accept) {
                    Some(families) => {
                        let actual = runtime_type(&coerced)?;
                        if !families.contains(&actual) {
                            return None;
                        }
                    }
                    None => {
                        tracing::error!(accept, "unknown accept type, skipping accept validation");
                    }
                }
            }

            let shaped = if compound_datatype {
                json!({vocab.value: coerced, vocab.datatype: datatype.unwrap()})
            } else if compound_language {
                json!({vocab.value: coerced, vocab.language: language.unwrap()})
            } else {
                coerced
            };
            Some(wrap_list(shaped, as_list))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{JSONLD_VOCAB, PLAIN_VOCAB};
    use serde_json::json;

    fn shape(term: Value, key: &str, lang_tag: LangTag, accept: Option<&str>) -> Option<Value> {
        to_shaped_value(&term, key, &PLAIN_VOCAB, lang_tag, accept, false)
    }

    // -----------------------------------------------------------------------
    // URIs
    // -----------------------------------------------------------------------

    #[test]
    fn uri_under_id_key_stays_bare() {
        let out = shape(json!({"type": "uri", "value": "http://a/1"}), "id", LangTag::Show, None);
        assert_eq!(out, Some(json!("http://a/1")));
    }

    #[test]
    fn uri_elsewhere_becomes_id_object() {
        let out = shape(json!({"type": "uri", "value": "http://a/1"}), "friend", LangTag::Show, None);
        assert_eq!(out, Some(json!({"id": "http://a/1"})));
    }

    #[test]
    fn uri_respects_jsonld_vocabulary() {
        let out = to_shaped_value(
            &json!({"type": "uri", "value": "http://a/1"}),
            "friend",
            &JSONLD_VOCAB,
            LangTag::Show,
            None,
            false,
        );
        assert_eq!(out, Some(json!({"@id": "http://a/1"})));
    }

    // -----------------------------------------------------------------------
    // Typed literals
    // -----------------------------------------------------------------------

    #[test]
    fn integer_literal_coerces() {
        let out = shape(
            json!({"type": "literal", "value": "42",
                   "datatype": "http://www.w3.org/2001/XMLSchema#integer"}),
            "n",
            LangTag::Show,
            None,
        );
        assert_eq!(out, Some(json!(42)));
    }

    #[test]
    fn boolean_literal_coerces() {
        for falsy in ["false", "0", "False"] {
            let out = shape(
                json!({"type": "literal", "value": falsy,
                       "datatype": "http://www.w3.org/2001/XMLSchema#boolean"}),
                "b",
                LangTag::Show,
                None,
            );
            assert_eq!(out, Some(json!(false)), "for {falsy}");
        }
        let out = shape(
            json!({"type": "literal", "value": "true",
                   "datatype": "http://www.w3.org/2001/XMLSchema#boolean"}),
            "b",
            LangTag::Show,
            None,
        );
        assert_eq!(out, Some(json!(true)));
    }

    #[test]
    fn float_literal_coerces() {
        let out = shape(
            json!({"type": "literal", "value": "4.5",
                   "datatype": "http://www.w3.org/2001/XMLSchema#double"}),
            "x",
            LangTag::Show,
            None,
        );
        assert_eq!(out, Some(json!(4.5)));
    }

    #[test]
    fn date_literal_stays_string_but_compound() {
        let out = shape(
            json!({"type": "literal", "value": "2021-04-12",
                   "datatype": "http://www.w3.org/2001/XMLSchema#date"}),
            "d",
            LangTag::Show,
            None,
        );
        assert_eq!(
            out,
            Some(json!({"value": "2021-04-12",
                        "datatype": "http://www.w3.org/2001/XMLSchema#date"}))
        );
    }

    #[test]
    fn unknown_datatype_is_compound() {
        let out = shape(
            json!({"type": "literal", "value": "POINT(0 0)",
                   "datatype": "http://www.opengis.net/ont/geosparql#wktLiteral"}),
            "geo",
            LangTag::Show,
            None,
        );
        assert_eq!(
            out,
            Some(json!({"value": "POINT(0 0)",
                        "datatype": "http://www.opengis.net/ont/geosparql#wktLiteral"}))
        );
    }

    // -----------------------------------------------------------------------
    // Language-tagged literals
    // -----------------------------------------------------------------------

    #[test]
    fn language_compound_shows_and_hides() {
        let term = json!({"type": "literal", "value": "Chien", "xml:lang": "fr"});
        assert_eq!(
            shape(term.clone(), "label", LangTag::Show, None),
            Some(json!({"value": "Chien", "language": "fr"}))
        );
        assert_eq!(
            shape(term, "label", LangTag::Hide, None),
            Some(json!("Chien"))
        );
    }

    // -----------------------------------------------------------------------
    // Accept filter
    // -----------------------------------------------------------------------

    #[test]
    fn accept_drops_mismatched_runtime_type() {
        let term = json!({"type": "literal", "value": "not a number"});
        assert_eq!(shape(term, "n", LangTag::Show, Some("int")), None);
    }

    #[test]
    fn accept_keeps_matching_runtime_type() {
        let term = json!({"type": "literal", "value": "42",
                          "datatype": "http://www.w3.org/2001/XMLSchema#integer"});
        assert_eq!(shape(term, "n", LangTag::Show, Some("number")), Some(json!(42)));
    }

    #[test]
    fn unknown_accept_key_fails_open() {
        let term = json!({"type": "literal", "value": "anything"});
        assert_eq!(
            shape(term, "x", LangTag::Show, Some("uuid")),
            Some(json!("anything"))
        );
    }

    // -----------------------------------------------------------------------
    // Edge cases
    // -----------------------------------------------------------------------

    #[test]
    fn unknown_term_type_is_dropped() {
        let term = json!({"type": "bnode", "value": "b0"});
        assert_eq!(shape(term, "x", LangTag::Show, None), None);
    }

    #[test]
    fn list_option_wraps_scalar() {
        let out = to_shaped_value(
            &json!({"type": "literal", "value": "one"}),
            "x",
            &PLAIN_VOCAB,
            LangTag::Show,
            None,
            true,
        );
        assert_eq!(out, Some(json!(["one"])));
    }
}

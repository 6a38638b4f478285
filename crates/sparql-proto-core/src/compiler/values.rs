//! `$values` normalization and SPARQL `VALUES` clause generation.
//!
//! Each `$values` entry maps an unprefixed name to one literal/IRI string or
//! a list of them. Entries are classified at the string level (IRI, CIRIE,
//! blank node, language-tagged literal, typed literal, plain literal) and
//! quoted accordingly.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

/// Value part of a language-tagged literal: `...@en`, `...@pt_BR`.
static LANG_TAGGED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^.+@[a-z]{2,3}(_[A-Z]{2})?$").unwrap());

static ALLOWED_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\w+[\w!$&'()*+,\-.:;=?@_~]*$").unwrap());

static ALLOWED_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w!$&'()*+,\-.:;=?@_~]+$").unwrap());

/// Prepend `?` if absent.
pub(crate) fn make_variable(name: &str) -> String {
    if name.starts_with('?') {
        name.to_string()
    } else {
        format!("?{name}")
    }
}

/// Rewrite every `$values` key to a SPARQL variable and drop empty entries.
pub(crate) fn normalize_values(raw: Option<&Value>) -> Map<String, Value> {
    let mut normalized = Map::new();
    let Some(Value::Object(entries)) = raw else {
        return normalized;
    };
    for (key, value) in entries {
        let keep = match value {
            Value::String(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Null => false,
            _ => false,
        };
        if keep {
            normalized.insert(make_variable(key), value.clone());
        }
    }
    normalized
}

/// Render one `VALUES ?k {v1 v2 ...}` line per normalized entry.
pub(crate) fn parse_values(
    values: &Map<String, Value>,
    prefixes: &Map<String, Value>,
) -> Vec<String> {
    let mut clauses = Vec::new();
    for (key, entry) in values {
        let items: Vec<&str> = match entry {
            Value::String(s) => vec![s.as_str()],
            Value::Array(list) => list.iter().filter_map(Value::as_str).collect(),
            _ => continue,
        };
        let rendered: Vec<String> = items.iter().map(|v| render_term(v, prefixes)).collect();
        clauses.push(format!("VALUES {} {{{}}}", make_variable(key), rendered.join(" ")));
    }
    clauses
}

/// Classify a single VALUES element and return its SPARQL spelling.
fn render_term(value: &str, prefixes: &Map<String, Value>) -> String {
    // Resource: IRI.
    if value.starts_with('<') && value.ends_with('>') {
        return value.to_string();
    }
    // Resource: CIRIE or blank node label.
    if is_cirie(value, prefixes) || is_blank(value) {
        return value.to_string();
    }
    // Literal with language tag.
    if LANG_TAGGED.is_match(value) {
        if let Some((part, lang)) = value.rsplit_once('@') {
            if part.starts_with('"') && part.ends_with('"') {
                return value.to_string();
            }
            return format!("\"{part}\"@{lang}");
        }
    }
    // Literal with datatype.
    if let Some((part, dtype)) = value.split_once("^^") {
        let part = if part.starts_with('"') && part.ends_with('"') {
            part.to_string()
        } else {
            format!("\"{part}\"")
        };
        let dtype = if (dtype.starts_with('<') && dtype.ends_with('>'))
            || is_cirie(dtype, prefixes)
        {
            dtype.to_string()
        } else {
            format!("<{dtype}>")
        };
        return format!("{part}^^{dtype}");
    }
    // Literal: already quoted.
    if value.starts_with('"') && value.ends_with('"') {
        return value.to_string();
    }
    // Literal: needs long-quote form.
    if value.contains('\n') || value.contains('"') {
        return format!("\"\"\"{value}\"\"\"");
    }
    format!("\"{value}\"")
}

/// True if the string is a condensed IRI expression (`prefix:suffix` with a
/// declared prefix). A `prefix:suffix` whose prefix is undeclared is taken to
/// be a full IRI, not a CIRIE.
pub(crate) fn is_cirie(iri: &str, prefixes: &Map<String, Value>) -> bool {
    let parts: Vec<&str> = iri.split(':').collect();
    let [prefix, suffix] = parts.as_slice() else {
        return false;
    };
    ALLOWED_PREFIX.is_match(prefix)
        && ALLOWED_SUFFIX.is_match(suffix)
        && prefixes.contains_key(*prefix)
}

/// True for blank node labels of the form `_:name`.
pub(crate) fn is_blank(iri: &str) -> bool {
    let parts: Vec<&str> = iri.split(':').collect();
    let [prefix, suffix] = parts.as_slice() else {
        return false;
    };
    *prefix == "_" && ALLOWED_SUFFIX.is_match(suffix)
}

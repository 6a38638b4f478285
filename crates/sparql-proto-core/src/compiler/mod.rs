//! Document ingestion and query generation.
//!
//! Splits the input document into the graph prototype and the `$`-prefixed
//! directive keys, walks the prototype (rewriting it in place for the shaper),
//! and assembles the final SELECT string. The caller's document is cloned on
//! ingress and never mutated.

mod assemble;
pub(crate) mod values;
mod walker;

use serde_json::{Map, Value};

use crate::config::{LangTag, Options, Vocabulary};
use crate::error::TransformError;

use assemble::{assemble, QueryParts};
use values::{normalize_values, parse_values};
use walker::{process_object, WalkContext};

/// A compiled document: the SPARQL string plus everything the shaper needs
/// to fold the bindings back into the prototype's shape.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    /// The generated SPARQL 1.1 SELECT query.
    pub query: String,
    /// The rewritten prototype (leaves resolved to `?var$opts` form).
    pub(crate) proto: Value,
    pub(crate) vocab: Vocabulary,
    pub(crate) is_json_ld: bool,
    pub(crate) context: Value,
    pub(crate) lang_tag: LangTag,
    /// Result window applied by the shaper when `$limitMode` is `library`.
    pub(crate) post_slice: Option<PostSlice>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct PostSlice {
    pub offset: usize,
    pub limit: usize,
}

/// Directive keys (`$`-prefixed, top-level), stripped before emission.
#[derive(Debug, Default)]
struct Directives {
    prefixes: Map<String, Value>,
    distinct: bool,
    from: Vec<String>,
    from_named: Vec<String>,
    values: Option<Value>,
    wheres: Vec<String>,
    filters: Vec<String>,
    lang: Option<String>,
    group_by: Vec<String>,
    having: Vec<String>,
    order_by: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
    library_limit_mode: bool,
    lang_tag: Option<String>,
}

/// Accept both `"x"` and `["x", "y"]` directive spellings.
fn string_list(value: Option<Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => vec![s],
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn collect_directives(doc: &mut Map<String, Value>) -> Directives {
    let mut raw: Map<String, Value> = Map::new();
    let keys: Vec<String> = doc
        .keys()
        .filter(|k| k.starts_with('$'))
        .cloned()
        .collect();
    for key in keys {
        if let Some(value) = doc.shift_remove(&key) {
            raw.insert(key, value);
        }
    }

    let distinct = match raw.get("$distinct") {
        Some(Value::Bool(false)) => false,
        Some(Value::String(s)) if s == "false" => false,
        _ => true,
    };

    Directives {
        prefixes: match raw.shift_remove("$prefixes") {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        },
        distinct,
        from: string_list(raw.shift_remove("$from")),
        from_named: string_list(raw.shift_remove("$fromNamed")),
        values: raw.shift_remove("$values"),
        wheres: string_list(raw.shift_remove("$where")),
        filters: string_list(raw.shift_remove("$filter")),
        lang: raw
            .shift_remove("$lang")
            .and_then(|v| v.as_str().map(str::to_string)),
        group_by: string_list(raw.shift_remove("$groupby")),
        having: string_list(raw.shift_remove("$having")),
        order_by: string_list(raw.shift_remove("$orderby")),
        limit: raw.shift_remove("$limit").and_then(|v| v.as_u64()),
        offset: raw.shift_remove("$offset").and_then(|v| v.as_u64()),
        library_limit_mode: raw
            .get("$limitMode")
            .and_then(Value::as_str)
            .is_some_and(|m| m == "library"),
        lang_tag: raw
            .shift_remove("$langTag")
            .and_then(|v| v.as_str().map(str::to_string)),
    }
}

/// Compile a query document into SPARQL plus shaping metadata.
pub fn compile(document: &Value, options: &Options) -> Result<CompiledQuery, TransformError> {
    let Some(doc) = document.as_object() else {
        return Err(TransformError::InvalidInput {
            message: "query document must be a JSON object".to_string(),
        });
    };
    let mut doc = doc.clone();

    let context = doc
        .get("@context")
        .cloned()
        .unwrap_or_else(|| options.context.clone());
    let is_json_ld = doc.contains_key("@graph");
    let vocab = Vocabulary::select(is_json_ld);

    let proto_key = if is_json_ld { "@graph" } else { "proto" };
    let mut proto = match doc.shift_remove(proto_key) {
        Some(Value::Object(map)) => Value::Object(map),
        Some(Value::Array(mut items)) => {
            if items.len() > 1 {
                tracing::warn!(
                    extras = items.len() - 1,
                    "prototype list holds more than one element; extras are dropped"
                );
            }
            match items.drain(..).next() {
                Some(Value::Object(map)) => Value::Object(map),
                _ => {
                    return Err(TransformError::InvalidInput {
                        message: format!("'{proto_key}' list must hold a prototype object"),
                    })
                }
            }
        }
        _ => {
            return Err(TransformError::InvalidInput {
                message: "document must carry a '@graph' or 'proto' prototype object".to_string(),
            })
        }
    };

    let directives = collect_directives(&mut doc);
    let lang_tag = directives
        .lang_tag
        .as_deref()
        .map(LangTag::from_directive)
        .unwrap_or(options.lang_tag);

    let mut vars: Vec<String> = Vec::new();
    let mut wheres: Vec<String> = directives.wheres.clone();
    let mut values = normalize_values(directives.values.as_ref());

    {
        let mut ctx = WalkContext {
            vars: &mut vars,
            values: &mut values,
            lang_primary: directives.lang.as_deref(),
        };
        let Some(map) = proto.as_object_mut() else {
            unreachable!("prototype checked above");
        };
        process_object(map, &mut ctx, &mut wheres, "v", None)?;
    }

    let values_clauses = parse_values(&values, &directives.prefixes);

    let (limit, offset) = if directives.library_limit_mode {
        (None, None)
    } else {
        (
            directives.limit.filter(|n| *n > 0),
            directives.offset.filter(|n| *n > 0),
        )
    };

    let query = assemble(&QueryParts {
        prefixes: &directives.prefixes,
        distinct: directives.distinct,
        vars: &vars,
        from: &directives.from,
        from_named: &directives.from_named,
        values_clauses: &values_clauses,
        wheres: &wheres,
        filters: &directives.filters,
        group_by: &directives.group_by,
        having: &directives.having,
        order_by: &directives.order_by,
        limit,
        offset,
    });

    let post_slice = match (directives.library_limit_mode, directives.limit) {
        (true, Some(limit)) => Some(PostSlice {
            offset: directives.offset.unwrap_or(0) as usize,
            limit: limit as usize,
        }),
        _ => None,
    };

    tracing::debug!(query = %query, "compiled query");

    Ok(CompiledQuery {
        query,
        proto,
        vocab,
        is_json_ld,
        context,
        lang_tag,
        post_slice,
    })
}

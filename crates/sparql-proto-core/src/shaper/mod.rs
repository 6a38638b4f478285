//! Result shaping.
//!
//! Clones the rewritten prototype once per binding row, resolves every
//! variable leaf through the coercer, folds rows sharing an anchor value into
//! one nested document, strips housekeeping keys, applies the library-mode
//! result window, and wraps JSON-LD output in its `@context`/`@graph`
//! envelope.

mod coercion;
mod merge;

use serde_json::{json, Map, Value};

use crate::compiler::CompiledQuery;
use crate::config::LangTag;
use crate::error::TransformError;

use coercion::to_shaped_value;
use merge::{merge_into, recursive_clean};

/// Options a rewritten leaf carries for fit time, decoded from its
/// `?var$accept:…$langTag:…$asList` suffix form.
struct LeafSuffixes {
    var: String,
    accept: Option<String>,
    lang_tag: Option<LangTag>,
    as_list: bool,
}

fn parse_leaf_suffixes(body: &str) -> LeafSuffixes {
    let mut segments = body.split('$');
    let var = segments.next().unwrap_or("").to_string();
    let mut suffixes = LeafSuffixes {
        var,
        accept: None,
        lang_tag: None,
        as_list: false,
    };
    for segment in segments {
        if let Some(ty) = segment.strip_prefix("accept:") {
            suffixes.accept.get_or_insert_with(|| ty.to_string());
        } else if let Some(mode) = segment.strip_prefix("langTag:") {
            suffixes
                .lang_tag
                .get_or_insert(LangTag::from_directive(mode));
        } else if segment == "asList" {
            suffixes.as_list = true;
        }
    }
    suffixes
}

/// Shape a SPARQL JSON response against a compiled document.
pub fn shape(compiled: &CompiledQuery, response: &Value) -> Result<Value, TransformError> {
    let bindings = response
        .get("results")
        .and_then(|r| r.get("bindings"))
        .and_then(Value::as_array)
        .ok_or_else(|| TransformError::MalformedBindings {
            message: "response lacks results.bindings".to_string(),
        })?;

    // Per-row fit: one prototype clone per row, leaves resolved or deleted.
    let mut rows: Vec<Value> = Vec::new();
    for binding in bindings {
        let row = binding
            .as_object()
            .ok_or_else(|| TransformError::MalformedBindings {
                message: "binding row is not an object".to_string(),
            })?;
        let mut fitted = compiled.proto.clone();
        if let Value::Object(map) = &mut fitted {
            let keys: Vec<String> = map.keys().cloned().collect();
            for key in keys {
                fit_key(map, &key, row, compiled);
            }
        }
        rows.push(fitted);
    }

    // Row merge, keyed by the root anchor when one exists.
    let anchor_key = rows
        .first()
        .and_then(|r| r.get("$anchor"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let mut results: Vec<Value> = Vec::new();
    match anchor_key {
        None => results = rows,
        Some(anchor_key) => {
            for row in rows {
                let id = row.get(&anchor_key).cloned();
                let slot = id.as_ref().and_then(|id| {
                    results
                        .iter_mut()
                        .find(|r| r.get(&anchor_key).is_some_and(|rid| rid == id))
                });
                match slot {
                    Some(existing) => {
                        if let (Value::Object(existing), Value::Object(row)) = (existing, &row) {
                            merge_into(existing, row);
                        }
                    }
                    None => results.push(row),
                }
            }
        }
    }

    for item in &mut results {
        recursive_clean(item);
    }

    if let Some(window) = &compiled.post_slice {
        let start = window.offset.min(results.len());
        let end = window.offset.saturating_add(window.limit).min(results.len());
        results = results.drain(start..end).collect();
    }

    if compiled.is_json_ld {
        Ok(json!({"@context": compiled.context, "@graph": results}))
    } else {
        Ok(Value::Array(results))
    }
}

/// Resolve one prototype entry against a binding row.
fn fit_key(parent: &mut Map<String, Value>, key: &str, row: &Map<String, Value>, compiled: &CompiledQuery) {
    match parent.get(key) {
        Some(Value::Object(_)) => {
            let Some(Value::Object(child)) = parent.get_mut(key) else {
                unreachable!("checked above");
            };
            let as_list = child
                .get("$asList")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let keys: Vec<String> = child.keys().cloned().collect();
            for child_key in keys {
                fit_key(child, &child_key, row, compiled);
            }
            // An object whose identity was never bound contributes nothing.
            let only_markers = child
                .keys()
                .all(|k| k == "@type" || k == "$anchor" || k == "$asList");
            if only_markers {
                parent.shift_remove(key);
            } else if as_list {
                let slot = parent.get_mut(key).expect("present");
                let value = std::mem::take(slot);
                *slot = Value::Array(vec![value]);
            }
        }
        Some(Value::String(leaf)) if leaf.starts_with('?') => {
            let suffixes = parse_leaf_suffixes(&leaf[1..]);
            match row.get(&suffixes.var) {
                None => {
                    parent.shift_remove(key);
                }
                Some(term) => {
                    let lang_tag = suffixes.lang_tag.unwrap_or(compiled.lang_tag);
                    let shaped = to_shaped_value(
                        term,
                        key,
                        &compiled.vocab,
                        lang_tag,
                        suffixes.accept.as_deref(),
                        suffixes.as_list,
                    );
                    match shaped {
                        Some(value) => {
                            *parent.get_mut(key).expect("present") = value;
                        }
                        None => {
                            parent.shift_remove(key);
                        }
                    }
                }
            }
        }
        // Scalars and plain strings pass through unchanged.
        _ => {}
    }
}

//! Prototype traversal.
//!
//! Walks the recursive prototype once, in key order. For each object it
//! discovers the anchor child and the root-id variable; for each leaf it
//! decodes the `$`-option suffixes into a [`LeafSpec`], registers the
//! projection variable, emits the WHERE triple, and rewrites the leaf in
//! place to its final `?var$opts` form so the shaper can resolve it later.

use serde_json::{Map, Value};

use crate::compiler::values::make_variable;
use crate::error::TransformError;

const AGGREGATES: &[&str] = &["count", "sum", "min", "max", "avg"];

/// Shared state threaded through the walk.
pub(crate) struct WalkContext<'a> {
    /// Projection entries, in first-seen order; may be wrapped expressions.
    pub vars: &'a mut Vec<String>,
    /// Normalized `$values` map (`?var` keys). Mutated when a `lang:` option
    /// fuses its tag into a matching entry.
    pub values: &'a mut Map<String, Value>,
    /// Document-level `$lang`.
    pub lang_primary: Option<&'a str>,
}

/// Everything a single leaf declares, decoded from its option segments.
#[derive(Debug, Default)]
struct LeafSpec {
    required: bool,
    sample: bool,
    aggregate: Option<&'static str>,
    distinct: bool,
    var: Option<String>,
    accept: Option<String>,
    /// `Some(inline_tag)` when `bestlang` is present.
    bestlang: Option<Option<String>>,
    /// `Some(inline_tag)` when `lang` is present.
    lang: Option<Option<String>>,
    lang_tag: Option<String>,
    list: bool,
    reverse: bool,
    prev_root: bool,
}

fn parse_options(options: &[&str]) -> LeafSpec {
    let mut spec = LeafSpec::default();
    for opt in options {
        if let Some(tag) = opt.strip_prefix("langTag:") {
            spec.lang_tag.get_or_insert_with(|| tag.to_string());
        } else if let Some(tail) = opt.strip_prefix("bestlang") {
            let inline = tail.strip_prefix(':').map(str::to_string);
            spec.bestlang.get_or_insert(inline);
        } else if let Some(tag) = opt.strip_prefix("lang:") {
            spec.lang.get_or_insert(Some(tag.to_string()));
        } else if *opt == "lang" {
            spec.lang.get_or_insert(None);
        } else if let Some(name) = opt.strip_prefix("var:") {
            spec.var.get_or_insert_with(|| make_variable(name));
        } else if let Some(tail) = opt.strip_prefix("accept") {
            let ty = tail.strip_prefix(':').unwrap_or(tail);
            spec.accept.get_or_insert_with(|| ty.to_string());
        } else if let Some(agg) = AGGREGATES.iter().copied().find(|a| a == opt) {
            spec.aggregate.get_or_insert(agg);
        } else {
            match *opt {
                "required" => spec.required = true,
                "sample" => spec.sample = true,
                "distinct" => spec.distinct = true,
                "list" => spec.list = true,
                "reverse" => spec.reverse = true,
                "prevRoot" => spec.prev_root = true,
                // `anchor`, `asList` and unknown options carry no leaf-level
                // behavior here.
                _ => {}
            }
        }
    }
    spec
}

/// First segment of a `$lang` value like `"en;q=1, it"`.
fn primary_lang_segment(lang: &str) -> String {
    lang.split([';', ','])
        .next()
        .unwrap_or("")
        .trim()
        .to_string()
}

struct RootId {
    var: String,
    required: bool,
}

/// Resolve the identity of one prototype object.
///
/// Scans children for a `$anchor`-marked leaf, falling back to an `@id`/`id`
/// key. Extracts or mints the root-id variable (back-patching the anchor
/// child with `$var:` when minting) and records `$anchor`/`$asList`
/// housekeeping keys on the object.
fn compute_root_id(proto: &mut Map<String, Value>, prefix: &str) -> Option<RootId> {
    let anchor_key = proto
        .iter()
        .find(|(_, v)| v.as_str().is_some_and(|s| s.contains("$anchor")))
        .map(|(k, _)| k.clone())
        .or_else(|| {
            ["@id", "id"]
                .iter()
                .find(|k| proto.contains_key(**k))
                .map(|k| k.to_string())
        })?;

    let anchor_value = proto.get(&anchor_key)?.as_str()?.to_string();
    let mut segments = anchor_value.split('$');
    let mut root = segments.next().unwrap_or("").to_string();
    let options: Vec<&str> = segments.collect();

    let required = options.contains(&"required") || !root.is_empty();
    if let Some(name) = options
        .iter()
        .find_map(|o| o.strip_prefix("var:"))
    {
        root = make_variable(name);
    }
    let as_list = options.contains(&"list") || options.contains(&"asList");

    if root.is_empty() {
        root = format!("?{prefix}r");
        // Back-patch so the leaf pass below picks up the minted name.
        proto.insert(
            anchor_key.clone(),
            Value::String(format!("{anchor_value}$var:{root}")),
        );
    }

    proto.insert("$anchor".to_string(), Value::String(anchor_key));
    proto.insert("$asList".to_string(), Value::Bool(as_list));
    Some(RootId { var: root, required })
}

/// Walk one prototype object, appending to the shared projection list and to
/// `wheres`. Returns whether the object's block is required (i.e. must not be
/// wrapped in OPTIONAL by the caller).
pub(crate) fn process_object(
    proto: &mut Map<String, Value>,
    ctx: &mut WalkContext<'_>,
    wheres: &mut Vec<String>,
    prefix: &str,
    prior_root: Option<&str>,
) -> Result<bool, TransformError> {
    let root = compute_root_id(proto, prefix);
    let block_required = root.as_ref().is_some_and(|r| r.required);
    let root_id = root
        .map(|r| r.var)
        .or_else(|| prior_root.map(str::to_string))
        .unwrap_or_else(|| "?id".to_string());

    let keys: Vec<String> = proto.keys().cloned().collect();
    // One counter per scope over minting sites: keyed leaves and nested
    // objects, in key order. Variable leaves consume no slot.
    let mut mint = 0usize;

    for key in keys {
        if key == "$anchor" || key == "$asList" {
            continue;
        }
        match proto.get(&key) {
            Some(Value::Object(_)) => {
                let child_prefix = format!("{prefix}{mint}");
                mint += 1;
                let mut inner: Vec<String> = Vec::new();
                let Some(Value::Object(child)) = proto.get_mut(&key) else {
                    unreachable!("checked above");
                };
                let inner_required =
                    process_object(child, ctx, &mut inner, &child_prefix, Some(&root_id))?;
                let joined = inner.join(" .\n");
                if !joined.is_empty() {
                    wheres.push(if inner_required {
                        joined
                    } else {
                        format!("OPTIONAL {{ {joined} }}")
                    });
                }
            }
            Some(Value::String(leaf)) => {
                let leaf = leaf.clone();
                process_leaf(proto, ctx, wheres, &key, &leaf, prefix, &mut mint, &root_id, prior_root)?;
            }
            // Scalars pass through the pipeline unchanged.
            _ => {}
        }
    }

    Ok(block_required)
}

#[allow(clippy::too_many_arguments)]
fn process_leaf(
    proto: &mut Map<String, Value>,
    ctx: &mut WalkContext<'_>,
    wheres: &mut Vec<String>,
    key: &str,
    leaf: &str,
    prefix: &str,
    mint: &mut usize,
    root_id: &str,
    prior_root: Option<&str>,
) -> Result<(), TransformError> {
    let keyed = leaf.starts_with('$');
    if !keyed && !leaf.starts_with('?') {
        return Ok(());
    }

    let body = if keyed { &leaf[1..] } else { leaf };
    let mut segments = body.split('$');
    // For keyed leaves this is the predicate/property path; for variable
    // leaves it is the `?name` itself.
    let head = segments.next().unwrap_or("").to_string();
    let options: Vec<&str> = segments.collect();
    let spec = parse_options(&options);

    let orig = if keyed {
        let minted = format!("?{prefix}{mint}");
        *mint += 1;
        minted
    } else {
        head.clone()
    };

    // `operand` is the variable the WHERE triple binds and aggregates read;
    // `effective` is the projected alias and the name the shaper resolves.
    let (effective, operand) = if spec.sample {
        let v = spec.var.clone().unwrap_or_else(|| orig.clone());
        (v.clone(), v)
    } else if let Some(agg) = spec.aggregate {
        let alias = spec
            .var
            .clone()
            .unwrap_or_else(|| format!("?{}_{}", agg, orig.trim_start_matches('?')));
        (alias, orig.clone())
    } else {
        let v = spec.var.clone().unwrap_or_else(|| orig.clone());
        (v.clone(), v)
    };

    let required = spec.required
        || key == "id"
        || key == "@id"
        || ctx.values.contains_key(&effective)
        || ((spec.aggregate.is_some() || spec.sample) && keyed);

    let projection = if let Some(inline) = &spec.bestlang {
        let tag = inline
            .clone()
            .or_else(|| ctx.lang_primary.map(primary_lang_segment))
            .filter(|t| !t.is_empty())
            .ok_or_else(|| TransformError::MissingLanguage {
                key: key.to_string(),
            })?;
        format!("(sql:BEST_LANGMATCH({effective}, \"{tag}\", \"en\") AS {effective})")
    } else if spec.sample {
        format!("(SAMPLE({effective}) AS {effective})")
    } else if let Some(agg) = spec.aggregate {
        let distinct = if spec.distinct { "DISTINCT " } else { "" };
        format!("({}({distinct}{operand}) AS {effective})", agg.to_uppercase())
    } else {
        effective.clone()
    };

    // Rewrite the prototype leaf to its resolved form, re-encoding the
    // options the shaper needs at fit time. bestlang values come back as
    // plain strings, hence the forced string accept.
    let mut rewritten = effective.clone();
    if spec.bestlang.is_some() {
        rewritten.push_str("$accept:string");
    } else if let Some(accept) = &spec.accept {
        rewritten.push_str(&format!("$accept:{accept}"));
    }
    if let Some(mode) = &spec.lang_tag {
        rewritten.push_str(&format!("$langTag:{mode}"));
    }
    if spec.list && effective != root_id {
        rewritten.push_str("$asList");
    }
    proto.insert(key.to_string(), Value::String(rewritten));

    if !ctx.vars.contains(&projection) {
        ctx.vars.push(projection);
    }

    // A language constraint either fuses into a matching VALUES entry or
    // rides along with the triple so it stays inside the OPTIONAL.
    let mut lang_filter = String::new();
    if let Some(inline) = &spec.lang {
        let tag = inline
            .clone()
            .or_else(|| ctx.lang_primary.map(primary_lang_segment))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        if let Some(tag) = tag {
            match ctx.values.get_mut(&effective) {
                Some(Value::String(entry)) => {
                    entry.push('@');
                    entry.push_str(&tag);
                }
                _ => {
                    lang_filter = format!(" . FILTER(lang({effective}) = '{tag}')");
                }
            }
        }
    }

    if keyed {
        let use_prior = effective == root_id || (spec.prev_root && prior_root.is_some());
        let subject_root = if use_prior { prior_root } else { Some(root_id) };
        // A keyed anchor at the document root has no parent to link to.
        if let Some(subject_root) = subject_root {
            let (subject, object) = if spec.reverse {
                (operand.as_str(), subject_root)
            } else {
                (subject_root, operand.as_str())
            };
            let triple = format!("{subject} {head} {object}{lang_filter}");
            wheres.push(if required {
                triple
            } else {
                format!("OPTIONAL {{ {triple} }}")
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn walk(proto: &mut Value) -> (Vec<String>, Vec<String>) {
        walk_with(proto, Map::new(), None)
    }

    fn walk_with(
        proto: &mut Value,
        mut values: Map<String, Value>,
        lang: Option<&str>,
    ) -> (Vec<String>, Vec<String>) {
        let mut vars = Vec::new();
        let mut wheres = Vec::new();
        let mut ctx = WalkContext {
            vars: &mut vars,
            values: &mut values,
            lang_primary: lang,
        };
        let map = proto.as_object_mut().unwrap();
        process_object(map, &mut ctx, &mut wheres, "v", None).unwrap();
        (vars, wheres)
    }

    // -----------------------------------------------------------------------
    // Root-id resolution
    // -----------------------------------------------------------------------

    #[test]
    fn id_key_is_the_default_anchor() {
        let mut proto = json!({"id": "?id", "name": "$foaf:name"});
        let (vars, wheres) = walk(&mut proto);
        assert_eq!(vars, vec!["?id", "?v0"]);
        assert_eq!(wheres, vec!["OPTIONAL { ?id foaf:name ?v0 }"]);
        assert_eq!(proto["$anchor"], json!("id"));
        assert_eq!(proto["name"], json!("?v0"));
    }

    #[test]
    fn anchor_option_beats_id_key() {
        let mut proto = json!({"id": "?id", "who": "?p$anchor"});
        walk(&mut proto);
        assert_eq!(proto["$anchor"], json!("who"));
    }

    #[test]
    fn empty_root_id_is_minted_and_back_patched() {
        let mut proto = json!({"name": "$foaf:name$anchor"});
        let (vars, _) = walk(&mut proto);
        assert_eq!(proto["$anchor"], json!("name"));
        // Minted root, surfaced through the back-patched $var: option.
        assert_eq!(vars, vec!["?vr"]);
        assert_eq!(proto["name"], json!("?vr"));
    }

    #[test]
    fn objects_without_identity_anchor_to_the_parent() {
        let mut proto = json!({"id": "?id", "addr": {"street": "$ex:street"}});
        let (vars, wheres) = walk(&mut proto);
        assert_eq!(vars, vec!["?id", "?v00"]);
        assert_eq!(wheres, vec!["OPTIONAL { OPTIONAL { ?id ex:street ?v00 } }"]);
    }

    // -----------------------------------------------------------------------
    // Leaf handling
    // -----------------------------------------------------------------------

    #[test]
    fn required_option_escapes_optional() {
        let mut proto = json!({"id": "?id", "name": "$foaf:name$required"});
        let (_, wheres) = walk(&mut proto);
        assert_eq!(wheres, vec!["?id foaf:name ?v0"]);
    }

    #[test]
    fn var_option_renames_the_minted_variable() {
        let mut proto = json!({"id": "?id", "name": "$foaf:name$var:label"});
        let (vars, wheres) = walk(&mut proto);
        assert_eq!(vars, vec!["?id", "?label"]);
        assert_eq!(wheres, vec!["OPTIONAL { ?id foaf:name ?label }"]);
        assert_eq!(proto["name"], json!("?label"));
    }

    #[test]
    fn aggregate_renames_and_keeps_triple_on_original() {
        let mut proto = json!({"price": "$ex:price$count"});
        let (vars, wheres) = walk(&mut proto);
        assert_eq!(vars, vec!["(COUNT(?v0) AS ?count_v0)"]);
        // Keyed aggregates are required, so no OPTIONAL.
        assert_eq!(wheres, vec!["?id ex:price ?v0"]);
        assert_eq!(proto["price"], json!("?count_v0"));
    }

    #[test]
    fn aggregate_distinct_and_var_override() {
        let mut proto = json!({"n": "?price$sum$distinct$var:total"});
        let (vars, wheres) = walk(&mut proto);
        assert_eq!(vars, vec!["(SUM(DISTINCT ?price) AS ?total)"]);
        // Variable leaves never emit triples.
        assert!(wheres.is_empty());
        assert_eq!(proto["n"], json!("?total"));
    }

    #[test]
    fn sample_wraps_without_renaming() {
        let mut proto = json!({"name": "?name$sample"});
        let (vars, _) = walk(&mut proto);
        assert_eq!(vars, vec!["(SAMPLE(?name) AS ?name)"]);
        assert_eq!(proto["name"], json!("?name"));
    }

    #[test]
    fn reverse_swaps_subject_and_object() {
        let mut proto = json!({"id": "?id", "work": "$dc:creator$reverse$required"});
        let (_, wheres) = walk(&mut proto);
        assert_eq!(wheres, vec!["?v0 dc:creator ?id"]);
    }

    #[test]
    fn accept_and_lang_tag_survive_as_suffixes() {
        let mut proto = json!({"id": "?id", "age": "$ex:age$accept:int$langTag:hide"});
        walk(&mut proto);
        assert_eq!(proto["age"], json!("?v0$accept:int$langTag:hide"));
    }

    #[test]
    fn list_option_marks_as_list() {
        let mut proto = json!({"id": "?id", "name": "$foaf:name$list"});
        walk(&mut proto);
        assert_eq!(proto["name"], json!("?v0$asList"));
    }

    #[test]
    fn bestlang_requires_a_language() {
        let mut proto = json!({"id": "?id", "label": "$rdfs:label$bestlang"});
        let mut vars = Vec::new();
        let mut wheres = Vec::new();
        let mut values = Map::new();
        let mut ctx = WalkContext {
            vars: &mut vars,
            values: &mut values,
            lang_primary: None,
        };
        let err = process_object(proto.as_object_mut().unwrap(), &mut ctx, &mut wheres, "v", None)
            .unwrap_err();
        assert!(matches!(err, TransformError::MissingLanguage { .. }));
    }

    #[test]
    fn bestlang_takes_first_primary_lang_segment() {
        let mut proto = json!({"id": "?id", "label": "$rdfs:label$bestlang"});
        let (vars, _) = walk_with(&mut proto, Map::new(), Some("it;q=1, en"));
        assert!(vars.contains(&"(sql:BEST_LANGMATCH(?v0, \"it\", \"en\") AS ?v0)".to_string()));
        assert_eq!(proto["label"], json!("?v0$accept:string"));
    }

    #[test]
    fn lang_filter_stays_with_the_triple() {
        let mut proto = json!({"id": "?id", "name": "$foaf:name$lang:it"});
        let (_, wheres) = walk(&mut proto);
        assert_eq!(
            wheres,
            vec!["OPTIONAL { ?id foaf:name ?v0 . FILTER(lang(?v0) = 'it') }"]
        );
    }

    #[test]
    fn lang_fuses_into_matching_values_entry() {
        let mut proto = json!({"id": "?id", "name": "?name$lang:it"});
        let values = normalize(json!({"name": "Roma"}));
        let mut values_out = values.clone();
        let mut vars = Vec::new();
        let mut wheres = Vec::new();
        let mut ctx = WalkContext {
            vars: &mut vars,
            values: &mut values_out,
            lang_primary: None,
        };
        process_object(proto.as_object_mut().unwrap(), &mut ctx, &mut wheres, "v", None).unwrap();
        assert_eq!(values_out["?name"], json!("Roma@it"));
        assert!(wheres.is_empty());
    }

    #[test]
    fn lang_tag_option_does_not_trigger_lang_filter() {
        // A document $lang is set, but langTag: must not grow a FILTER.
        let mut proto = json!({"id": "?id", "name": "$foaf:name$langTag:hide"});
        let (_, wheres) = walk_with(&mut proto, Map::new(), Some("en"));
        assert_eq!(wheres, vec!["OPTIONAL { ?id foaf:name ?v0 }"]);
    }

    #[test]
    fn values_membership_makes_a_leaf_required() {
        let mut proto = json!({"id": "?id", "name": "$foaf:name"});
        let values = normalize(json!({"v0": "Alice"}));
        let (_, wheres) = walk_with_values(&mut proto, values);
        assert_eq!(wheres, vec!["?id foaf:name ?v0"]);
    }

    #[test]
    fn prev_root_attaches_to_the_enclosing_root() {
        let mut proto = json!({
            "id": "?id",
            "author": {"id": "$dc:creator", "note": "$ex:note$prevRoot"}
        });
        let (_, wheres) = walk(&mut proto);
        // The note triple anchors to the outer ?id, not the author's root.
        assert!(wheres[0].contains("OPTIONAL { ?id ex:note ?v01 }"));
    }

    #[test]
    fn nested_required_block_stays_outside_optional() {
        let mut proto = json!({
            "id": "?id",
            "author": {"id": "$dc:creator$required", "name": "$foaf:name"}
        });
        let (_, wheres) = walk(&mut proto);
        assert_eq!(wheres.len(), 1);
        // The inner block is required, so the child link and its OPTIONAL
        // member surface unwrapped.
        assert!(wheres[0].starts_with("?id dc:creator ?v0r ."));
        assert!(wheres[0].contains("OPTIONAL { ?v0r foaf:name ?v01 }"));
    }

    fn normalize(values: Value) -> Map<String, Value> {
        crate::compiler::values::normalize_values(Some(&values))
    }

    fn walk_with_values(
        proto: &mut Value,
        values: Map<String, Value>,
    ) -> (Vec<String>, Vec<String>) {
        walk_with(proto, values, None)
    }
}

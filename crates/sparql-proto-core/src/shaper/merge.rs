//! Anchor-aware deep merge.
//!
//! Folds a row into an accumulated result: keys the base lacks are copied,
//! identical values collapse, objects sharing an anchor value merge
//! recursively, and genuinely different values promote to lists with
//! deep-equal deduplication.

use serde_json::{Map, Value};

/// Structural equality. `serde_json::Value` compares maps key-by-key
/// independent of insertion order, which is exactly the stable,
/// order-insensitive compare the merge needs. NaN cannot occur in a
/// `serde_json` tree, so float compare is unproblematic here.
pub(crate) fn deep_equals(a: &Value, b: &Value) -> bool {
    a == b
}

/// Merge `add` into `base`, key by key, skipping the `$anchor` marker.
pub(crate) fn merge_into(base: &mut Map<String, Value>, add: &Map<String, Value>) {
    for (key, addition) in add {
        if key == "$anchor" {
            continue;
        }
        if !base.contains_key(key) {
            base.insert(key.clone(), addition.clone());
            continue;
        }

        // An object declaring its own anchor merges by identity below.
        let anchor = addition
            .as_object()
            .and_then(|o| o.get("$anchor"))
            .and_then(Value::as_str)
            .map(str::to_string);

        // A list-valued addition contributes its first element.
        let addition: Value = match addition {
            Value::Array(items) => match items.first() {
                Some(first) => first.clone(),
                None => continue,
            },
            other => other.clone(),
        };

        let existing = base.get_mut(key).expect("checked above");
        match existing {
            Value::Array(members) => {
                if let Some(anchor_key) = &anchor {
                    if let Some(id) = addition.get(anchor_key) {
                        let same_id = members.iter_mut().find(|m| {
                            m.get(anchor_key).is_some_and(|mid| mid == id)
                        });
                        if let Some(member) = same_id {
                            if let (Value::Object(member), Value::Object(addition)) =
                                (member, &addition)
                            {
                                merge_into(member, addition);
                            }
                            continue;
                        }
                    }
                }
                if !members.iter().any(|m| deep_equals(m, &addition)) {
                    members.push(addition);
                }
            }
            _ => {
                if deep_equals(existing, &addition) {
                    continue;
                }
                let same_id = anchor.as_deref().is_some_and(|anchor_key| {
                    match (existing.get(anchor_key), addition.get(anchor_key)) {
                        (Some(a), Some(b)) => a == b,
                        _ => false,
                    }
                });
                if same_id {
                    if let (Value::Object(existing), Value::Object(addition)) =
                        (existing, &addition)
                    {
                        merge_into(existing, addition);
                    }
                } else {
                    let previous = std::mem::take(existing);
                    *existing = Value::Array(vec![previous, addition]);
                }
            }
        }
    }
}

/// Strip `$anchor`/`$asList` housekeeping keys from the whole tree.
pub(crate) fn recursive_clean(item: &mut Value) {
    match item {
        Value::Array(items) => {
            for entry in items {
                recursive_clean(entry);
            }
        }
        Value::Object(map) => {
            map.shift_remove("$anchor");
            map.shift_remove("$asList");
            for entry in map.values_mut() {
                recursive_clean(entry);
            }
        }
        _ => {}
    }
}

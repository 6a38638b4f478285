//! Final query assembly.
//!
//! Stitches prefixes, projection, FROM/FROM NAMED, VALUES, WHERE body,
//! FILTERs and the trailing solution modifiers into one SELECT string, then
//! normalizes the whitespace the optional sections leave behind.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

const INDENT: &str = "  ";

static NEWLINE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n+").unwrap());
static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s+\n").unwrap());
static DOT_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.+").unwrap());

pub(crate) struct QueryParts<'a> {
    pub prefixes: &'a Map<String, Value>,
    pub distinct: bool,
    pub vars: &'a [String],
    pub from: &'a [String],
    pub from_named: &'a [String],
    pub values_clauses: &'a [String],
    pub wheres: &'a [String],
    pub filters: &'a [String],
    pub group_by: &'a [String],
    pub having: &'a [String],
    pub order_by: &'a [String],
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Characters that already close or open a block; a fragment ending in one
/// must not receive a ` .` terminator.
fn needs_terminator(fragment: &str) -> bool {
    !matches!(
        fragment.chars().last(),
        Some('{') | Some('(') | Some('[') | Some('}') | Some(')')
    )
}

pub(crate) fn assemble(parts: &QueryParts<'_>) -> String {
    let prefixes = parts
        .prefixes
        .iter()
        .filter_map(|(k, v)| v.as_str().map(|ns| format!("PREFIX {k}: <{ns}>")))
        .collect::<Vec<_>>()
        .join("\n");

    let select = if parts.distinct {
        format!("SELECT DISTINCT {}", parts.vars.join(" "))
    } else {
        format!("SELECT {}", parts.vars.join(" "))
    };

    let from = parts
        .from
        .iter()
        .map(|g| format!("FROM {g}"))
        .collect::<Vec<_>>()
        .join("\n");
    let from_named = parts
        .from_named
        .iter()
        .map(|g| format!("FROM NAMED {g}"))
        .collect::<Vec<_>>()
        .join("\n");

    let values = parts.values_clauses.join(&format!("\n{INDENT}"));

    let wheres = parts
        .wheres
        .iter()
        .filter(|w| !w.trim().is_empty())
        .map(|w| {
            if needs_terminator(w) {
                format!("{w} .")
            } else {
                w.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(&format!("\n{INDENT}"));

    let filters = parts
        .filters
        .iter()
        .map(|f| format!("FILTER({f})"))
        .collect::<Vec<_>>()
        .join(&format!("\n{INDENT}"));

    let group_by = if parts.group_by.is_empty() {
        String::new()
    } else {
        format!("GROUP BY {}", parts.group_by.join(" "))
    };
    let having = if parts.having.is_empty() {
        String::new()
    } else {
        format!("HAVING ({})", parts.having.join(" && "))
    };
    let order_by = if parts.order_by.is_empty() {
        String::new()
    } else {
        format!("ORDER BY {}", parts.order_by.join(" "))
    };
    let limit = parts.limit.map(|n| format!("LIMIT {n}")).unwrap_or_default();
    let offset = parts
        .offset
        .map(|n| format!("OFFSET {n}"))
        .unwrap_or_default();

    let query = format!(
        "{prefixes}\n{select}\n{from}\n{from_named}\nWHERE {{\n{INDENT}{values}\n{INDENT}{wheres}\n{INDENT}{filters}\n}}\n{group_by}\n{having}\n{order_by}\n{limit}\n{offset}\n"
    );

    normalize_whitespace(&query)
}

fn normalize_whitespace(query: &str) -> String {
    let query = NEWLINE_RUNS.replace_all(query, "\n");
    let query = BLANK_LINES.replace_all(&query, "\n");
    let query = DOT_RUNS.replace_all(&query, ".");
    query.trim_start_matches('\n').to_string()
}

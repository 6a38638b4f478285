//! Configuration for query generation and result shaping.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How language-tagged literals are rendered in shaped output.
///
/// `Show` keeps them as `{value, language}` compounds; `Hide` returns the bare
/// string. Overridable per document (`$langTag`) and per leaf (`langTag:`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LangTag {
    #[default]
    Show,
    Hide,
}

impl LangTag {
    /// Lenient string form used by the `$langTag` directive and the
    /// `langTag:` leaf option; anything other than `hide` shows.
    pub(crate) fn from_directive(s: &str) -> Self {
        if s == "hide" {
            LangTag::Hide
        } else {
            LangTag::Show
        }
    }
}

/// Options for the transformation pipeline.
///
/// Fields are serialized in `kebab-case` (e.g. `lang-tag`) for config files.
/// The replacement executor is not part of this struct — closures don't
/// serialize; pass one via [`Transformer::with_executor`](crate::Transformer::with_executor).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Options {
    /// SPARQL endpoint URL used by the default HTTP executor.
    pub endpoint: String,
    /// JSON-LD context emitted in the `@context` envelope key.
    /// A document-level `@context` takes precedence.
    pub context: Value,
    /// Default rendering of language-tagged literals.
    pub lang_tag: LangTag,
    /// Raise log verbosity (honored by the CLI's subscriber setup).
    pub debug: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            endpoint: "http://dbpedia.org/sparql".to_string(),
            context: Value::String("http://schema.org/".to_string()),
            lang_tag: LangTag::Show,
            debug: false,
        }
    }
}

/// Output key names, frozen at compile time.
///
/// Documents carrying `@graph` shape their results with JSON-LD keyword keys;
/// plain `proto` documents use bare names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vocabulary {
    pub id: &'static str,
    pub value: &'static str,
    pub language: &'static str,
    pub datatype: &'static str,
}

pub(crate) const JSONLD_VOCAB: Vocabulary = Vocabulary {
    id: "@id",
    value: "@value",
    language: "@language",
    datatype: "@datatype",
};

pub(crate) const PLAIN_VOCAB: Vocabulary = Vocabulary {
    id: "id",
    value: "value",
    language: "language",
    datatype: "datatype",
};

impl Vocabulary {
    pub(crate) fn select(is_json_ld: bool) -> Self {
        if is_json_ld {
            JSONLD_VOCAB
        } else {
            PLAIN_VOCAB
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_serde_round_trip() {
        let opts = Options {
            endpoint: "http://example.org/sparql".to_string(),
            context: Value::String("http://example.org/ctx".to_string()),
            lang_tag: LangTag::Hide,
            debug: true,
        };

        let json = serde_json::to_string(&opts).unwrap();
        assert!(json.contains("\"lang-tag\""));
        assert!(json.contains("\"hide\""));

        let back: Options = serde_json::from_str(&json).unwrap();
        assert_eq!(back.endpoint, "http://example.org/sparql");
        assert_eq!(back.lang_tag, LangTag::Hide);
    }

    #[test]
    fn test_lang_tag_defaults_to_show_when_omitted() {
        let opts: Options = serde_json::from_str("{}").unwrap();
        assert_eq!(opts.lang_tag, LangTag::Show);
        assert_eq!(opts.endpoint, "http://dbpedia.org/sparql");
    }

    #[test]
    fn test_lang_tag_directive_parsing() {
        assert_eq!(LangTag::from_directive("hide"), LangTag::Hide);
        assert_eq!(LangTag::from_directive("show"), LangTag::Show);
        assert_eq!(LangTag::from_directive("anything"), LangTag::Show);
    }
}

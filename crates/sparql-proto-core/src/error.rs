//! Error types for query compilation and result shaping.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("JSON (de)serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The input was neither a JSON object nor a path to a readable JSON file.
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// `bestlang` needs a language, either inline (`bestlang:TAG`) or via the
    /// document-level `$lang` directive.
    #[error("bestlang at key '{key}' requires a language declared inline or in the root $lang")]
    MissingLanguage { key: String },

    #[error("HTTP request to SPARQL endpoint failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Failure reported by a caller-supplied executor.
    #[error("Endpoint error: {message}")]
    Endpoint { message: String },

    /// The executor's response does not follow the SPARQL JSON results format
    /// (`{"results": {"bindings": [...]}}`).
    #[error("Malformed SPARQL response: {message}")]
    MalformedBindings { message: String },
}

//! Compile JSON graph prototypes into SPARQL SELECT queries and shape the
//! resulting bindings back into nested documents.
//!
//! A query document carries a *prototype* describing the desired output
//! shape, with `?var` / `$predicate` leaf markers and `$`-prefixed directive
//! keys configuring the generated query. The pipeline is:
//!
//! 1. [`compile`] — prototype → SPARQL SELECT string (plus shaping metadata)
//! 2. [`Executor::execute`] — submit the query (HTTP by default, any closure
//!    in tests)
//! 3. [`shape`] — flat SPARQL JSON bindings → nested documents, merged by
//!    anchor, optionally wrapped as JSON-LD
//!
//! ```rust
//! use serde_json::{json, Value};
//! use sparql_proto_core::{Options, Transformer, TransformError};
//!
//! let document = json!({
//!     "proto": {"id": "?id", "name": "$foaf:name"},
//!     "$prefixes": {"foaf": "http://xmlns.com/foaf/0.1/"},
//!     "$limit": 10
//! });
//!
//! let canned = |_query: &str| -> Result<Value, TransformError> {
//!     Ok(json!({"results": {"bindings": [
//!         {"id": {"type": "uri", "value": "http://a/1"},
//!          "v0": {"type": "literal", "value": "Alice"}}
//!     ]}}))
//! };
//! let transformer = Transformer::with_executor(Options::default(), canned);
//! let results = transformer.transform(&document).unwrap();
//! assert_eq!(results, json!([{"id": "http://a/1", "name": "Alice"}]));
//! ```

pub mod config;
pub mod error;
pub mod executor;

mod compiler;
mod shaper;

use std::fs;
use std::path::Path;

use serde_json::Value;

pub use compiler::{compile, CompiledQuery};
pub use config::{LangTag, Options};
pub use error::TransformError;
pub use executor::{Executor, HttpExecutor};
pub use shaper::shape;

/// The full pipeline: compile, execute, shape.
pub struct Transformer {
    options: Options,
    executor: Box<dyn Executor>,
}

impl Transformer {
    /// A transformer hitting `options.endpoint` over HTTP.
    pub fn new(options: Options) -> Self {
        let executor = HttpExecutor::new(options.endpoint.clone());
        Self {
            options,
            executor: Box::new(executor),
        }
    }

    /// A transformer with a caller-supplied executor (any closure taking the
    /// query string works), making the pipeline runnable without I/O.
    pub fn with_executor(options: Options, executor: impl Executor + 'static) -> Self {
        Self {
            options,
            executor: Box::new(executor),
        }
    }

    /// Run the pipeline on a parsed query document.
    pub fn transform(&self, document: &Value) -> Result<Value, TransformError> {
        let compiled = compile(document, &self.options)?;
        let response = self.executor.execute(&compiled.query)?;
        tracing::trace!(?response, "raw endpoint response");
        shape(&compiled, &response)
    }

    /// Run the pipeline on a JSON document loaded from `path`.
    pub fn transform_path(&self, path: impl AsRef<Path>) -> Result<Value, TransformError> {
        let document = load_document(path.as_ref())?;
        self.transform(&document)
    }
}

/// Load a query document from disk, requiring a JSON object at the top level.
pub fn load_document(path: &Path) -> Result<Value, TransformError> {
    if !path.is_file() {
        return Err(TransformError::InvalidInput {
            message: format!("a path to a JSON file is required: {}", path.display()),
        });
    }
    let text = fs::read_to_string(path)?;
    let document: Value = serde_json::from_str(&text)?;
    if !document.is_object() {
        return Err(TransformError::InvalidInput {
            message: format!("{} does not hold a JSON object", path.display()),
        });
    }
    Ok(document)
}

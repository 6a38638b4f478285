//! Endpoint adapters.
//!
//! The [`Executor`] trait is the single seam between the compiler/shaper core
//! and the outside world. Tests and embedders replace the default HTTP
//! executor with a plain closure, which makes the whole pipeline runnable
//! without I/O.

use std::time::Duration;

use serde_json::Value;

use crate::error::TransformError;

/// A SPARQL endpoint the pipeline can submit a SELECT query to.
///
/// Must return the standard SPARQL JSON results format:
/// `{"results": {"bindings": [{var: {type, value, datatype?, "xml:lang"?}}]}}`.
pub trait Executor {
    fn execute(&self, query: &str) -> Result<Value, TransformError>;
}

/// Closures are executors, so callers can pass `|query| { ... }` directly.
impl<F> Executor for F
where
    F: Fn(&str) -> Result<Value, TransformError>,
{
    fn execute(&self, query: &str) -> Result<Value, TransformError> {
        self(query)
    }
}

/// Blocking executor speaking the SPARQL 1.1 protocol over HTTP GET.
///
/// The pipeline is synchronous end to end; this is its only blocking
/// operation. Callers needing a deadline construct it with
/// [`HttpExecutor::with_timeout`].
pub struct HttpExecutor {
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl HttpExecutor {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::blocking::Client::new(),
        }
    }

    /// Like [`HttpExecutor::new`] with a per-request timeout.
    pub fn with_timeout(
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TransformError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }
}

impl Executor for HttpExecutor {
    fn execute(&self, query: &str) -> Result<Value, TransformError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("query", query)])
            .header(
                reqwest::header::ACCEPT,
                "application/sparql-results+json",
            )
            .send()?
            .error_for_status()?;
        Ok(response.json()?)
    }
}

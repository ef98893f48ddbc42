//! Compiled-expression cache.

use dashmap::DashMap;
use std::sync::Arc;

use crate::{ExprError, Expression};

/// A lock-free cache of parsed expressions keyed by source text.
///
/// Mappings reuse a small set of condition and transform expressions
/// across many transformations; caching the parsed AST keeps repeated
/// runs from re-tokenizing. Shared references are safe because
/// [`Expression`] is immutable.
#[derive(Debug, Default)]
pub struct ExpressionCache {
    inner: DashMap<String, Arc<Expression>>,
}

impl ExpressionCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the parsed expression for `text`, parsing and caching it on
    /// first use. Parse failures are not cached.
    pub fn get_or_parse(&self, text: &str) -> Result<Arc<Expression>, ExprError> {
        if let Some(cached) = self.inner.get(text) {
            return Ok(cached.value().clone());
        }
        let parsed = Arc::new(Expression::parse(text)?);
        self.inner.insert(text.to_string(), parsed.clone());
        Ok(parsed)
    }

    /// Number of cached expressions.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

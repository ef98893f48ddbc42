//! Sandboxed expression sublanguage for the OctoFHIR mapping engine.
//!
//! Field mappings embed small expressions in two places: `condition`
//! (gates a field) and `transformExpression` (rewrites the working value).
//! This crate parses and evaluates them over JSON documents without
//! exposing any host-process capability - the only callables are the
//! builtin `fn:` string/date helpers.
//!
//! # Surface
//!
//! - literals: `'text'`, `42`, `3.5`, `true`, `false`, `null`
//! - variables: top-level keys of the source document, plus `value`
//! - the `$ctx` context document (`$ctx.tenantId`, `$ctx.settings['k']`)
//! - member access and subscripts: `name[0].given[0]`
//! - operators: `+ - * / %`, `== != < <= > >=`, `&& || !`
//!   (keyword forms `and`, `or`, `not` are accepted)
//! - builtin calls: `fn:uppercase(value)`, `fn:formatDate(value, '%Y')`, ...
//!
//! # Example
//!
//! ```
//! use mapper_expr::{Expression, Scope};
//! use serde_json::json;
//!
//! let source = json!({"firstName": "John", "lastName": "Doe"});
//! let expr = Expression::parse("fn:uppercase(lastName)").unwrap();
//! let result = expr.evaluate(&Scope::new(&source)).unwrap();
//! assert_eq!(result, json!("DOE"));
//! ```

pub mod ast;
mod cache;
mod eval;
mod functions;
mod parser;
mod token;

pub use cache::ExpressionCache;
pub use eval::{EvalError, Scope, truthy};
pub use parser::ParseError;

use serde_json::Value;
use thiserror::Error;

use ast::ExpressionNode;

/// An expression failure, carrying the originating expression text.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExprError {
    /// The expression did not parse.
    #[error("failed to parse expression '{expression}': {source}")]
    Parse {
        expression: String,
        source: ParseError,
    },

    /// The expression parsed but failed to evaluate.
    #[error("failed to evaluate expression '{expression}': {source}")]
    Eval {
        expression: String,
        source: EvalError,
    },
}

impl ExprError {
    /// The expression text the failure originated from.
    pub fn expression(&self) -> &str {
        match self {
            ExprError::Parse { expression, .. } | ExprError::Eval { expression, .. } => expression,
        }
    }
}

/// A parsed, immutable expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    text: String,
    root: ExpressionNode,
}

impl Expression {
    /// Parse an expression string.
    pub fn parse(text: &str) -> Result<Self, ExprError> {
        let root = parser::parse(text).map_err(|source| ExprError::Parse {
            expression: text.to_string(),
            source,
        })?;
        Ok(Self {
            text: text.to_string(),
            root,
        })
    }

    /// The original expression text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The parsed syntax tree.
    pub fn root(&self) -> &ExpressionNode {
        &self.root
    }

    /// Evaluate in the given scope.
    pub fn evaluate(&self, scope: &Scope<'_>) -> Result<Value, ExprError> {
        eval::evaluate(&self.root, scope).map_err(|source| ExprError::Eval {
            expression: self.text.clone(),
            source,
        })
    }

    /// Evaluate as a condition: the result is coerced with standard
    /// truthiness, so `null` and a missing variable both gate the field
    /// off.
    pub fn evaluate_condition(&self, scope: &Scope<'_>) -> Result<bool, ExprError> {
        Ok(truthy(&self.evaluate(scope)?))
    }
}

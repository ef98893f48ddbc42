//! Tree-walking evaluator.
//!
//! Expressions evaluate against a [`Scope`]: the top-level keys of the
//! source document are variables, `value` is the current field value (when
//! bound), and `$ctx` is the per-request context document. Evaluation is
//! lenient where document data is involved - member access on `null` or a
//! missing key yields `null`, and ordering comparisons against `null` are
//! false - and strict where the expression itself is wrong (unknown
//! function, non-numeric arithmetic, division by zero).

use serde_json::{Number, Value};
use thiserror::Error;

use crate::ast::{BinaryOperator, ExpressionNode, LiteralValue, UnaryOperator};
use crate::functions;

/// A runtime evaluation failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("unknown function 'fn:{0}'")]
    UnknownFunction(String),

    #[error("fn:{function} expects {expected} argument(s), got {actual}")]
    Arity {
        function: String,
        expected: &'static str,
        actual: usize,
    },

    #[error("fn:{function}: {message}")]
    InvalidArgument { function: String, message: String },

    #[error("operator {operator} cannot be applied to {left} and {right}")]
    TypeMismatch {
        operator: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("operator {operator} cannot be applied to {operand}")]
    UnaryTypeMismatch {
        operator: &'static str,
        operand: &'static str,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow in '{0}'")]
    Overflow(&'static str),
}

/// Variable bindings for one evaluation.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    source: &'a Value,
    value: Option<&'a Value>,
    ctx: &'a Value,
}

impl<'a> Scope<'a> {
    /// Scope over a source document; top-level keys become variables.
    pub fn new(source: &'a Value) -> Self {
        Self {
            source,
            value: None,
            ctx: &Value::Null,
        }
    }

    /// Bind the `value` placeholder (set before transform expressions).
    pub fn with_value(mut self, value: &'a Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Bind the `$ctx` context document.
    pub fn with_ctx(mut self, ctx: &'a Value) -> Self {
        self.ctx = ctx;
        self
    }

    fn variable(&self, name: &str) -> Value {
        if name == "value" {
            if let Some(value) = self.value {
                return value.clone();
            }
        }
        self.source
            .as_object()
            .and_then(|object| object.get(name))
            .cloned()
            .unwrap_or(Value::Null)
    }
}

/// Standard truthiness: `null` and `false` are false, zero and empty
/// containers are false, everything else is true.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(entries) => !entries.is_empty(),
    }
}

/// Evaluate an expression tree in the given scope.
pub fn evaluate(node: &ExpressionNode, scope: &Scope<'_>) -> Result<Value, EvalError> {
    match node {
        ExpressionNode::Literal(literal) => Ok(literal_value(literal)),
        ExpressionNode::Variable(name) => Ok(scope.variable(name)),
        ExpressionNode::Context => Ok(scope.ctx.clone()),

        ExpressionNode::Member { object, name } => {
            let object = evaluate(object, scope)?;
            Ok(object
                .as_object()
                .and_then(|entries| entries.get(name))
                .cloned()
                .unwrap_or(Value::Null))
        }

        ExpressionNode::Index { object, index } => {
            let object = evaluate(object, scope)?;
            let index = evaluate(index, scope)?;
            Ok(index_value(&object, &index))
        }

        ExpressionNode::Unary { op, operand } => {
            let operand = evaluate(operand, scope)?;
            apply_unary(*op, operand)
        }

        ExpressionNode::Binary { op, left, right } => match op {
            // Logical operators short-circuit on truthiness.
            BinaryOperator::And => {
                if !truthy(&evaluate(left, scope)?) {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(truthy(&evaluate(right, scope)?)))
            }
            BinaryOperator::Or => {
                if truthy(&evaluate(left, scope)?) {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(truthy(&evaluate(right, scope)?)))
            }
            _ => {
                let left = evaluate(left, scope)?;
                let right = evaluate(right, scope)?;
                apply_binary(*op, left, right)
            }
        },

        ExpressionNode::Function { name, args } => {
            let mut evaluated = Vec::with_capacity(args.len());
            for arg in args {
                evaluated.push(evaluate(arg, scope)?);
            }
            functions::call(name, &evaluated)
        }
    }
}

fn literal_value(literal: &LiteralValue) -> Value {
    match literal {
        LiteralValue::String(text) => Value::String(text.clone()),
        LiteralValue::Integer(number) => Value::Number((*number).into()),
        LiteralValue::Decimal(number) => Number::from_f64(*number)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        LiteralValue::Boolean(flag) => Value::Bool(*flag),
        LiteralValue::Null => Value::Null,
    }
}

fn index_value(object: &Value, index: &Value) -> Value {
    match (object, index) {
        (Value::Array(items), Value::Number(number)) => number
            .as_u64()
            .and_then(|i| items.get(i as usize))
            .cloned()
            .unwrap_or(Value::Null),
        (Value::Object(entries), Value::String(key)) => {
            entries.get(key).cloned().unwrap_or(Value::Null)
        }
        _ => Value::Null,
    }
}

fn apply_unary(op: UnaryOperator, operand: Value) -> Result<Value, EvalError> {
    match op {
        UnaryOperator::Not => Ok(Value::Bool(!truthy(&operand))),
        UnaryOperator::Negate => match &operand {
            Value::Null => Ok(Value::Null),
            Value::Number(number) => {
                if let Some(int) = number.as_i64() {
                    let negated = int.checked_neg().ok_or(EvalError::Overflow("-"))?;
                    Ok(Value::Number(negated.into()))
                } else {
                    let float = number.as_f64().unwrap_or(0.0);
                    Ok(Number::from_f64(-float)
                        .map(Value::Number)
                        .unwrap_or(Value::Null))
                }
            }
            other => Err(EvalError::UnaryTypeMismatch {
                operator: "-",
                operand: kind(other),
            }),
        },
    }
}

fn apply_binary(op: BinaryOperator, left: Value, right: Value) -> Result<Value, EvalError> {
    match op {
        BinaryOperator::Equal => Ok(Value::Bool(loose_equal(&left, &right))),
        BinaryOperator::NotEqual => Ok(Value::Bool(!loose_equal(&left, &right))),

        BinaryOperator::LessThan
        | BinaryOperator::LessThanOrEqual
        | BinaryOperator::GreaterThan
        | BinaryOperator::GreaterThanOrEqual => compare(op, &left, &right),

        BinaryOperator::Add => add(left, right),

        BinaryOperator::Subtract | BinaryOperator::Multiply | BinaryOperator::Divide
        | BinaryOperator::Modulo => arithmetic(op, left, right),

        BinaryOperator::And | BinaryOperator::Or => {
            unreachable!("logical operators are handled with short-circuiting")
        }
    }
}

/// Equality with numeric normalisation: `1 == 1.0` holds, `null == null`
/// holds, values of different kinds are unequal.
fn loose_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => a.as_f64() == b.as_f64(),
        },
        _ => left == right,
    }
}

/// Ordering comparisons over numbers and strings. Any `null` operand makes
/// the comparison false, so conditions over absent fields skip quietly.
fn compare(op: BinaryOperator, left: &Value, right: &Value) -> Result<Value, EvalError> {
    let ordering = match (left, right) {
        (Value::Null, _) | (_, Value::Null) => return Ok(Value::Bool(false)),
        (Value::Number(a), Value::Number(b)) => {
            let (a, b) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
            a.partial_cmp(&b)
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (left, right) => {
            return Err(EvalError::TypeMismatch {
                operator: operator_symbol(op),
                left: kind(left),
                right: kind(right),
            });
        }
    };

    let Some(ordering) = ordering else {
        return Ok(Value::Bool(false));
    };
    let result = match op {
        BinaryOperator::LessThan => ordering.is_lt(),
        BinaryOperator::LessThanOrEqual => ordering.is_le(),
        BinaryOperator::GreaterThan => ordering.is_gt(),
        BinaryOperator::GreaterThanOrEqual => ordering.is_ge(),
        _ => unreachable!(),
    };
    Ok(Value::Bool(result))
}

/// `+` is numeric addition, or string concatenation when either operand is
/// a string. A `null` operand yields `null`.
fn add(left: Value, right: Value) -> Result<Value, EvalError> {
    match (&left, &right) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::String(_), _) | (_, Value::String(_)) => {
            let mut text = scalar_text(&left, "+")?;
            text.push_str(&scalar_text(&right, "+")?);
            Ok(Value::String(text))
        }
        (Value::Number(_), Value::Number(_)) => arithmetic(BinaryOperator::Add, left, right),
        _ => Err(EvalError::TypeMismatch {
            operator: "+",
            left: kind(&left),
            right: kind(&right),
        }),
    }
}

fn arithmetic(op: BinaryOperator, left: Value, right: Value) -> Result<Value, EvalError> {
    let symbol = operator_symbol(op);

    let (Value::Number(a), Value::Number(b)) = (&left, &right) else {
        if left.is_null() || right.is_null() {
            return Ok(Value::Null);
        }
        return Err(EvalError::TypeMismatch {
            operator: symbol,
            left: kind(&left),
            right: kind(&right),
        });
    };

    // Integer arithmetic stays integral; division always yields a decimal.
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        match op {
            BinaryOperator::Add => {
                return x
                    .checked_add(y)
                    .map(|n| Value::Number(n.into()))
                    .ok_or(EvalError::Overflow("+"));
            }
            BinaryOperator::Subtract => {
                return x
                    .checked_sub(y)
                    .map(|n| Value::Number(n.into()))
                    .ok_or(EvalError::Overflow("-"));
            }
            BinaryOperator::Multiply => {
                return x
                    .checked_mul(y)
                    .map(|n| Value::Number(n.into()))
                    .ok_or(EvalError::Overflow("*"));
            }
            BinaryOperator::Modulo => {
                if y == 0 {
                    return Err(EvalError::DivisionByZero);
                }
                return Ok(Value::Number((x % y).into()));
            }
            BinaryOperator::Divide => {} // fall through to decimal division
            _ => unreachable!(),
        }
    }

    let x = a.as_f64().unwrap_or(f64::NAN);
    let y = b.as_f64().unwrap_or(f64::NAN);
    let result = match op {
        BinaryOperator::Add => x + y,
        BinaryOperator::Subtract => x - y,
        BinaryOperator::Multiply => x * y,
        BinaryOperator::Divide => {
            if y == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            x / y
        }
        BinaryOperator::Modulo => {
            if y == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            x % y
        }
        _ => unreachable!(),
    };

    Ok(Number::from_f64(result)
        .map(Value::Number)
        .unwrap_or(Value::Null))
}

fn scalar_text(value: &Value, operator: &'static str) -> Result<String, EvalError> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        other => Err(EvalError::TypeMismatch {
            operator,
            left: "string",
            right: kind(other),
        }),
    }
}

fn operator_symbol(op: BinaryOperator) -> &'static str {
    match op {
        BinaryOperator::Or => "||",
        BinaryOperator::And => "&&",
        BinaryOperator::Equal => "==",
        BinaryOperator::NotEqual => "!=",
        BinaryOperator::LessThan => "<",
        BinaryOperator::LessThanOrEqual => "<=",
        BinaryOperator::GreaterThan => ">",
        BinaryOperator::GreaterThanOrEqual => ">=",
        BinaryOperator::Add => "+",
        BinaryOperator::Subtract => "-",
        BinaryOperator::Multiply => "*",
        BinaryOperator::Divide => "/",
        BinaryOperator::Modulo => "%",
    }
}

pub(crate) fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

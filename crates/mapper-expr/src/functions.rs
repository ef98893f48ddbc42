//! Builtin transform functions (the `fn:` namespace).
//!
//! Every builtin propagates `null`: a `null` argument produces a `null`
//! result rather than an error, so optional source fields flow through
//! transform expressions without special-casing.

use chrono::DateTime;
use chrono::format::{Item, StrftimeItems};
use serde_json::Value;

use crate::eval::{EvalError, kind};

/// Dispatch a builtin call. `name` is the part after `fn:`.
pub fn call(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    match name {
        "uppercase" => string_unary(name, args, |s| s.to_uppercase()),
        "lowercase" => string_unary(name, args, |s| s.to_lowercase()),
        "trim" => string_unary(name, args, |s| s.trim().to_string()),
        "substring" => substring(args),
        "concat" => concat(args),
        "replace" => replace(args),
        "formatDate" => format_date(args),
        _ => Err(EvalError::UnknownFunction(name.to_string())),
    }
}

fn string_unary(
    name: &str,
    args: &[Value],
    apply: impl Fn(&str) -> String,
) -> Result<Value, EvalError> {
    let [arg] = args else {
        return Err(arity(name, "1", args.len()));
    };
    match arg {
        Value::Null => Ok(Value::Null),
        Value::String(text) => Ok(Value::String(apply(text))),
        other => Err(invalid(name, format!("expected a string, got {}", kind(other)))),
    }
}

/// `fn:substring(s, start, end)` - 0-based character indices, end
/// exclusive. Out-of-range indices are an error.
fn substring(args: &[Value]) -> Result<Value, EvalError> {
    let [subject, start, end] = args else {
        return Err(arity("substring", "3", args.len()));
    };
    if subject.is_null() {
        return Ok(Value::Null);
    }
    let Value::String(text) = subject else {
        return Err(invalid(
            "substring",
            format!("expected a string, got {}", kind(subject)),
        ));
    };

    let start = integer_arg("substring", "start", start)?;
    let end = integer_arg("substring", "end", end)?;
    let length = text.chars().count();
    if start > end || end > length {
        return Err(invalid(
            "substring",
            format!("range {start}..{end} out of bounds for length {length}"),
        ));
    }

    let result: String = text.chars().skip(start).take(end - start).collect();
    Ok(Value::String(result))
}

/// `fn:concat(...)` - join any number of scalar arguments. Any `null`
/// argument makes the whole result `null`.
fn concat(args: &[Value]) -> Result<Value, EvalError> {
    if args.iter().any(Value::is_null) {
        return Ok(Value::Null);
    }
    let mut result = String::new();
    for arg in args {
        match arg {
            Value::String(text) => result.push_str(text),
            Value::Number(number) => result.push_str(&number.to_string()),
            Value::Bool(flag) => result.push_str(if *flag { "true" } else { "false" }),
            other => {
                return Err(invalid(
                    "concat",
                    format!("expected scalar arguments, got {}", kind(other)),
                ));
            }
        }
    }
    Ok(Value::String(result))
}

fn replace(args: &[Value]) -> Result<Value, EvalError> {
    let [subject, target, replacement] = args else {
        return Err(arity("replace", "3", args.len()));
    };
    if subject.is_null() {
        return Ok(Value::Null);
    }
    let (Value::String(subject), Value::String(target), Value::String(replacement)) =
        (subject, target, replacement)
    else {
        return Err(invalid("replace", "expected string arguments".to_string()));
    };
    Ok(Value::String(subject.replace(target.as_str(), replacement)))
}

/// `fn:formatDate(s, fmt)` - parse `s` as an RFC 3339 date-time or a
/// `YYYY-MM-DD` date and render it with a chrono `strftime` format string.
fn format_date(args: &[Value]) -> Result<Value, EvalError> {
    let [subject, format] = args else {
        return Err(arity("formatDate", "2", args.len()));
    };
    if subject.is_null() {
        return Ok(Value::Null);
    }
    let Value::String(text) = subject else {
        return Err(invalid(
            "formatDate",
            format!("expected a string date, got {}", kind(subject)),
        ));
    };
    let Value::String(format) = format else {
        return Err(invalid(
            "formatDate",
            format!("expected a string format, got {}", kind(format)),
        ));
    };

    let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(invalid(
            "formatDate",
            format!("invalid format string '{format}'"),
        ));
    }

    let rendered = if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        instant.format_with_items(items.iter()).to_string()
    } else if let Ok(date) = chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        date.format_with_items(items.iter()).to_string()
    } else {
        return Err(invalid(
            "formatDate",
            format!("'{text}' is not an RFC 3339 date-time or YYYY-MM-DD date"),
        ));
    };

    Ok(Value::String(rendered))
}

fn integer_arg(function: &str, name: &str, value: &Value) -> Result<usize, EvalError> {
    value
        .as_u64()
        .map(|v| v as usize)
        .ok_or_else(|| invalid(function, format!("'{name}' must be a non-negative integer")))
}

fn arity(function: &str, expected: &'static str, actual: usize) -> EvalError {
    EvalError::Arity {
        function: function.to_string(),
        expected,
        actual,
    }
}

fn invalid(function: &str, message: impl Into<String>) -> EvalError {
    EvalError::InvalidArgument {
        function: function.to_string(),
        message: message.into(),
    }
}

//! Field validator rules.
//!
//! A field mapping may carry one `validator` literal that the engine runs
//! against the produced value: `notEmpty()`, `regex('<pattern>')` or
//! `range(<min>, <max>)`. The load-time validator parses the same literals
//! to reject broken rules before any transformation runs.

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

/// A validator literal that failed to parse.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// Not one of the supported validator forms.
    #[error("unknown validator '{0}'")]
    Unknown(String),

    /// `regex(...)` with a pattern that does not compile.
    #[error("invalid regex in validator '{rule}': {message}")]
    InvalidRegex { rule: String, message: String },

    /// `range(...)` without two numeric bounds, or min > max.
    #[error("invalid range in validator '{0}'")]
    InvalidRange(String),
}

/// A parsed validator rule.
#[derive(Debug, Clone)]
pub enum FieldRule {
    /// Value must be present and stringify to a non-empty string.
    NotEmpty,
    /// Value must match the pattern. A `null` value passes; pair with
    /// `required` or `notEmpty()` to also enforce presence.
    Pattern(Regex),
    /// Value must be a number within `[min, max]`.
    Range { min: f64, max: f64 },
}

impl FieldRule {
    /// Parse a validator literal.
    pub fn parse(text: &str) -> Result<Self, RuleError> {
        let text = text.trim();
        if text == "notEmpty()" {
            return Ok(FieldRule::NotEmpty);
        }

        if let Some(inner) = strip_call(text, "regex") {
            let pattern = strip_quotes(inner);
            let compiled = Regex::new(pattern).map_err(|err| RuleError::InvalidRegex {
                rule: text.to_string(),
                message: err.to_string(),
            })?;
            return Ok(FieldRule::Pattern(compiled));
        }

        if let Some(inner) = strip_call(text, "range") {
            let mut bounds = inner.split(',').map(str::trim);
            let (Some(min), Some(max), None) = (bounds.next(), bounds.next(), bounds.next())
            else {
                return Err(RuleError::InvalidRange(text.to_string()));
            };
            let min: f64 = min
                .parse()
                .map_err(|_| RuleError::InvalidRange(text.to_string()))?;
            let max: f64 = max
                .parse()
                .map_err(|_| RuleError::InvalidRange(text.to_string()))?;
            if min > max {
                return Err(RuleError::InvalidRange(text.to_string()));
            }
            return Ok(FieldRule::Range { min, max });
        }

        Err(RuleError::Unknown(text.to_string()))
    }

    /// Run the rule; a failure returns the reason.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        match self {
            FieldRule::NotEmpty => {
                let empty = match value {
                    Value::Null => true,
                    Value::String(text) => text.is_empty(),
                    Value::Array(items) => items.is_empty(),
                    _ => false,
                };
                if empty {
                    Err("value is empty".to_string())
                } else {
                    Ok(())
                }
            }
            FieldRule::Pattern(pattern) => {
                let text = match value {
                    Value::Null => return Ok(()),
                    Value::String(text) => text.clone(),
                    Value::Number(number) => number.to_string(),
                    Value::Bool(flag) => flag.to_string(),
                    other => {
                        return Err(format!(
                            "cannot match {} against pattern '{pattern}'",
                            json_kind(other)
                        ));
                    }
                };
                if pattern.is_match(&text) {
                    Ok(())
                } else {
                    Err(format!("'{text}' does not match pattern '{pattern}'"))
                }
            }
            FieldRule::Range { min, max } => match value.as_f64() {
                Some(number) if (*min..=*max).contains(&number) => Ok(()),
                Some(number) => Err(format!("{number} is outside range [{min}, {max}]")),
                None => Err(format!("{} is not a number", json_kind(value))),
            },
        }
    }
}

/// `call(text, "regex")` returns the argument text of `regex(...)`.
fn strip_call<'a>(text: &'a str, function: &str) -> Option<&'a str> {
    text.strip_prefix(function)?
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')
        .map(str::trim)
}

fn strip_quotes(text: &str) -> &str {
    for quote in ['\'', '"'] {
        if let Some(inner) = text
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    text
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_not_empty() {
        assert!(matches!(
            FieldRule::parse("notEmpty()").unwrap(),
            FieldRule::NotEmpty
        ));
    }

    #[test]
    fn test_parse_regex() {
        let rule = FieldRule::parse(r"regex('^\d{3}$')").unwrap();
        assert!(rule.check(&json!("123")).is_ok());
        assert!(rule.check(&json!("12")).is_err());
    }

    #[test]
    fn test_parse_regex_double_quotes() {
        let rule = FieldRule::parse(r#"regex("^[A-Z]+$")"#).unwrap();
        assert!(rule.check(&json!("ABC")).is_ok());
    }

    #[test]
    fn test_parse_invalid_regex() {
        assert!(matches!(
            FieldRule::parse("regex('[')"),
            Err(RuleError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn test_parse_range() {
        let rule = FieldRule::parse("range(0, 120)").unwrap();
        assert!(rule.check(&json!(42)).is_ok());
        assert!(rule.check(&json!(0)).is_ok());
        assert!(rule.check(&json!(120)).is_ok());
        assert!(rule.check(&json!(121)).is_err());
        assert!(rule.check(&json!(-1)).is_err());
        assert!(rule.check(&json!("42")).is_err());
    }

    #[test]
    fn test_parse_invalid_range() {
        for bad in ["range(1)", "range(a, b)", "range(1, 2, 3)", "range(5, 1)"] {
            assert!(
                matches!(FieldRule::parse(bad), Err(RuleError::InvalidRange(_))),
                "{bad} should be an invalid range"
            );
        }
    }

    #[test]
    fn test_parse_unknown() {
        assert!(matches!(
            FieldRule::parse("checksum()"),
            Err(RuleError::Unknown(_))
        ));
    }

    #[test]
    fn test_not_empty_check() {
        let rule = FieldRule::NotEmpty;
        assert!(rule.check(&json!("x")).is_ok());
        assert!(rule.check(&json!(0)).is_ok());
        assert!(rule.check(&json!("")).is_err());
        assert!(rule.check(&Value::Null).is_err());
        assert!(rule.check(&json!([])).is_err());
    }

    #[test]
    fn test_pattern_passes_null() {
        let rule = FieldRule::parse("regex('^x$')").unwrap();
        assert!(rule.check(&Value::Null).is_ok());
    }

    #[test]
    fn test_pattern_matches_numbers() {
        let rule = FieldRule::parse(r"regex('^\d+$')").unwrap();
        assert!(rule.check(&json!(12345)).is_ok());
    }
}

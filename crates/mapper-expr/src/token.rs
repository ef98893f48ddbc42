//! Tokenizer for the expression sublanguage.

use thiserror::Error;

/// A tokenisation failure with the byte offset it occurred at.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message} at offset {position}")]
pub struct TokenError {
    pub message: String,
    pub position: usize,
}

/// Lexical tokens. Keywords (`and`, `or`, `not`, `true`, `false`, `null`)
/// are recognised during scanning; everything else alphabetic is an
/// identifier.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Integer(i64),
    Decimal(f64),
    String(String),
    Boolean(bool),
    Null,
    Identifier(String),
    /// The `$ctx` context reference.
    Ctx,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqualEqual,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    AndAnd,
    OrOr,
    Bang,

    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Dot,
    Comma,
    Colon,
}

/// A token plus the byte offset it started at, for error reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub position: usize,
}

/// Tokenize an expression string.
pub fn tokenize(input: &str) -> Result<Vec<SpannedToken>, TokenError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let start = pos;
        let byte = bytes[pos];

        match byte {
            b' ' | b'\t' | b'\r' | b'\n' => {
                pos += 1;
                continue;
            }
            b'(' => push(&mut tokens, Token::LeftParen, start, &mut pos, 1),
            b')' => push(&mut tokens, Token::RightParen, start, &mut pos, 1),
            b'[' => push(&mut tokens, Token::LeftBracket, start, &mut pos, 1),
            b']' => push(&mut tokens, Token::RightBracket, start, &mut pos, 1),
            b',' => push(&mut tokens, Token::Comma, start, &mut pos, 1),
            b':' => push(&mut tokens, Token::Colon, start, &mut pos, 1),
            b'+' => push(&mut tokens, Token::Plus, start, &mut pos, 1),
            b'-' => push(&mut tokens, Token::Minus, start, &mut pos, 1),
            b'*' => push(&mut tokens, Token::Star, start, &mut pos, 1),
            b'/' => push(&mut tokens, Token::Slash, start, &mut pos, 1),
            b'%' => push(&mut tokens, Token::Percent, start, &mut pos, 1),
            b'.' => push(&mut tokens, Token::Dot, start, &mut pos, 1),
            b'=' => {
                if bytes.get(pos + 1) == Some(&b'=') {
                    push(&mut tokens, Token::EqualEqual, start, &mut pos, 2);
                } else {
                    return Err(TokenError {
                        message: "single '=' is not an operator, use '=='".to_string(),
                        position: start,
                    });
                }
            }
            b'!' => {
                if bytes.get(pos + 1) == Some(&b'=') {
                    push(&mut tokens, Token::NotEqual, start, &mut pos, 2);
                } else {
                    push(&mut tokens, Token::Bang, start, &mut pos, 1);
                }
            }
            b'<' => {
                if bytes.get(pos + 1) == Some(&b'=') {
                    push(&mut tokens, Token::LessThanOrEqual, start, &mut pos, 2);
                } else {
                    push(&mut tokens, Token::LessThan, start, &mut pos, 1);
                }
            }
            b'>' => {
                if bytes.get(pos + 1) == Some(&b'=') {
                    push(&mut tokens, Token::GreaterThanOrEqual, start, &mut pos, 2);
                } else {
                    push(&mut tokens, Token::GreaterThan, start, &mut pos, 1);
                }
            }
            b'&' => {
                if bytes.get(pos + 1) == Some(&b'&') {
                    push(&mut tokens, Token::AndAnd, start, &mut pos, 2);
                } else {
                    return Err(TokenError {
                        message: "single '&' is not an operator, use '&&'".to_string(),
                        position: start,
                    });
                }
            }
            b'|' => {
                if bytes.get(pos + 1) == Some(&b'|') {
                    push(&mut tokens, Token::OrOr, start, &mut pos, 2);
                } else {
                    return Err(TokenError {
                        message: "single '|' is not an operator, use '||'".to_string(),
                        position: start,
                    });
                }
            }
            b'\'' | b'"' => {
                let (literal, consumed) = scan_string(input, pos)?;
                tokens.push(SpannedToken {
                    token: Token::String(literal),
                    position: start,
                });
                pos += consumed;
            }
            b'$' => {
                let rest = &input[pos + 1..];
                if rest.starts_with("ctx")
                    && !rest[3..].starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_')
                {
                    push(&mut tokens, Token::Ctx, start, &mut pos, 4);
                } else {
                    return Err(TokenError {
                        message: "only the '$ctx' reference may start with '$'".to_string(),
                        position: start,
                    });
                }
            }
            b'0'..=b'9' => {
                let (token, consumed) = scan_number(input, pos)?;
                tokens.push(SpannedToken {
                    token,
                    position: start,
                });
                pos += consumed;
            }
            _ if byte.is_ascii_alphabetic() || byte == b'_' => {
                let end = input[pos..]
                    .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
                    .map(|offset| pos + offset)
                    .unwrap_or(input.len());
                let word = &input[pos..end];
                let token = match word {
                    "true" => Token::Boolean(true),
                    "false" => Token::Boolean(false),
                    "null" => Token::Null,
                    "and" => Token::AndAnd,
                    "or" => Token::OrOr,
                    "not" => Token::Bang,
                    _ => Token::Identifier(word.to_string()),
                };
                tokens.push(SpannedToken {
                    token,
                    position: start,
                });
                pos = end;
            }
            _ => {
                return Err(TokenError {
                    message: format!("unexpected character '{}'", &input[pos..].chars().next().unwrap_or('?')),
                    position: start,
                });
            }
        }
    }

    Ok(tokens)
}

fn push(tokens: &mut Vec<SpannedToken>, token: Token, start: usize, pos: &mut usize, width: usize) {
    tokens.push(SpannedToken {
        token,
        position: start,
    });
    *pos += width;
}

/// Scan a quoted string starting at `start`; returns the unescaped value
/// and the number of bytes consumed including both quotes.
fn scan_string(input: &str, start: usize) -> Result<(String, usize), TokenError> {
    let mut chars = input[start..].char_indices();
    let quote = chars.next().map(|(_, c)| c).unwrap_or('\'');

    let mut literal = String::new();
    let mut escaped = false;
    for (offset, c) in chars {
        if escaped {
            let resolved = match c {
                'n' => '\n',
                't' => '\t',
                '\\' | '\'' | '"' => c,
                other => {
                    return Err(TokenError {
                        message: format!("unsupported escape '\\{other}'"),
                        position: start + offset,
                    });
                }
            };
            literal.push(resolved);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return Ok((literal, offset + c.len_utf8()));
        } else {
            literal.push(c);
        }
    }

    Err(TokenError {
        message: "unterminated string literal".to_string(),
        position: start,
    })
}

/// Scan an integer or decimal literal; returns the token and bytes consumed.
fn scan_number(input: &str, start: usize) -> Result<(Token, usize), TokenError> {
    let bytes = input.as_bytes();
    let mut end = start;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }

    // A '.' only belongs to the number when followed by a digit, so member
    // access after an integer-valued field still tokenises.
    let mut decimal = false;
    if end < bytes.len()
        && bytes[end] == b'.'
        && bytes.get(end + 1).is_some_and(u8::is_ascii_digit)
    {
        decimal = true;
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }

    let text = &input[start..end];
    let token = if decimal {
        Token::Decimal(text.parse().map_err(|_| TokenError {
            message: format!("invalid decimal literal '{text}'"),
            position: start,
        })?)
    } else {
        Token::Integer(text.parse().map_err(|_| TokenError {
            message: format!("integer literal '{text}' out of range"),
            position: start,
        })?)
    };
    Ok((token, end - start))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token> {
        tokenize(input).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn test_tokenize_operators() {
        assert_eq!(
            kinds("a == b && c != d"),
            vec![
                Token::Identifier("a".into()),
                Token::EqualEqual,
                Token::Identifier("b".into()),
                Token::AndAnd,
                Token::Identifier("c".into()),
                Token::NotEqual,
                Token::Identifier("d".into()),
            ]
        );
    }

    #[test]
    fn test_tokenize_keywords() {
        assert_eq!(
            kinds("a and not b or true"),
            vec![
                Token::Identifier("a".into()),
                Token::AndAnd,
                Token::Bang,
                Token::Identifier("b".into()),
                Token::OrOr,
                Token::Boolean(true),
            ]
        );
        assert_eq!(kinds("null"), vec![Token::Null]);
    }

    #[test]
    fn test_tokenize_numbers() {
        assert_eq!(kinds("42"), vec![Token::Integer(42)]);
        assert_eq!(kinds("3.25"), vec![Token::Decimal(3.25)]);
        // Dot not followed by a digit is member access, not a decimal point.
        assert_eq!(
            kinds("a[0].b"),
            vec![
                Token::Identifier("a".into()),
                Token::LeftBracket,
                Token::Integer(0),
                Token::RightBracket,
                Token::Dot,
                Token::Identifier("b".into()),
            ]
        );
    }

    #[test]
    fn test_tokenize_strings() {
        assert_eq!(kinds("'hello'"), vec![Token::String("hello".into())]);
        assert_eq!(kinds("\"it's\""), vec![Token::String("it's".into())]);
        assert_eq!(kinds(r"'a\'b'"), vec![Token::String("a'b".into())]);
    }

    #[test]
    fn test_tokenize_ctx() {
        assert_eq!(
            kinds("$ctx.tenantId"),
            vec![Token::Ctx, Token::Dot, Token::Identifier("tenantId".into())]
        );
    }

    #[test]
    fn test_tokenize_fn_call() {
        assert_eq!(
            kinds("fn:uppercase(value)"),
            vec![
                Token::Identifier("fn".into()),
                Token::Colon,
                Token::Identifier("uppercase".into()),
                Token::LeftParen,
                Token::Identifier("value".into()),
                Token::RightParen,
            ]
        );
    }

    #[test]
    fn test_tokenize_errors() {
        assert!(tokenize("a = b").is_err());
        assert!(tokenize("'unterminated").is_err());
        assert!(tokenize("$other").is_err());
        assert!(tokenize("a # b").is_err());
    }

    #[test]
    fn test_error_position() {
        let err = tokenize("ab = c").unwrap_err();
        assert_eq!(err.position, 3);
    }
}

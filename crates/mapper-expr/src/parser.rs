//! Pratt parser for the expression sublanguage.

use thiserror::Error;

use crate::ast::{BinaryOperator, ExpressionNode, LiteralValue, UnaryOperator};
use crate::token::{SpannedToken, Token, TokenError, tokenize};

/// A parse failure with the byte offset it occurred at.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{message} at offset {position}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl From<TokenError> for ParseError {
    fn from(err: TokenError) -> Self {
        ParseError {
            message: err.message,
            position: err.position,
        }
    }
}

/// Binding strengths for binary operators; higher binds tighter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Or = 1,
    And = 2,
    Equality = 3,
    Comparison = 4,
    Additive = 5,
    Multiplicative = 6,
}

fn binary_operator(token: &Token) -> Option<(BinaryOperator, Precedence)> {
    match token {
        Token::OrOr => Some((BinaryOperator::Or, Precedence::Or)),
        Token::AndAnd => Some((BinaryOperator::And, Precedence::And)),
        Token::EqualEqual => Some((BinaryOperator::Equal, Precedence::Equality)),
        Token::NotEqual => Some((BinaryOperator::NotEqual, Precedence::Equality)),
        Token::LessThan => Some((BinaryOperator::LessThan, Precedence::Comparison)),
        Token::LessThanOrEqual => Some((BinaryOperator::LessThanOrEqual, Precedence::Comparison)),
        Token::GreaterThan => Some((BinaryOperator::GreaterThan, Precedence::Comparison)),
        Token::GreaterThanOrEqual => {
            Some((BinaryOperator::GreaterThanOrEqual, Precedence::Comparison))
        }
        Token::Plus => Some((BinaryOperator::Add, Precedence::Additive)),
        Token::Minus => Some((BinaryOperator::Subtract, Precedence::Additive)),
        Token::Star => Some((BinaryOperator::Multiply, Precedence::Multiplicative)),
        Token::Slash => Some((BinaryOperator::Divide, Precedence::Multiplicative)),
        Token::Percent => Some((BinaryOperator::Modulo, Precedence::Multiplicative)),
        _ => None,
    }
}

/// Parse an expression string into an AST.
pub fn parse(input: &str) -> Result<ExpressionNode, ParseError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        position: 0,
        input_len: input.len(),
    };
    let node = parser.parse_expression(Precedence::Or)?;
    if let Some(trailing) = parser.peek() {
        return Err(ParseError {
            message: format!("unexpected trailing token {:?}", trailing.token),
            position: trailing.position,
        });
    }
    Ok(node)
}

struct Parser {
    tokens: Vec<SpannedToken>,
    position: usize,
    input_len: usize,
}

impl Parser {
    fn peek(&self) -> Option<&SpannedToken> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Option<SpannedToken> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), ParseError> {
        match self.advance() {
            Some(spanned) if spanned.token == *expected => Ok(()),
            Some(spanned) => Err(ParseError {
                message: format!("expected {what}, found {:?}", spanned.token),
                position: spanned.position,
            }),
            None => Err(self.unexpected_end(what)),
        }
    }

    fn unexpected_end(&self, what: &str) -> ParseError {
        ParseError {
            message: format!("expected {what}, found end of expression"),
            position: self.input_len,
        }
    }

    fn parse_expression(&mut self, min_precedence: Precedence) -> Result<ExpressionNode, ParseError> {
        let mut left = self.parse_unary()?;

        while let Some(spanned) = self.peek() {
            let Some((op, precedence)) = binary_operator(&spanned.token) else {
                break;
            };
            if precedence < min_precedence {
                break;
            }
            self.advance();

            // Left-associative: the right side binds one level tighter.
            let next = match precedence {
                Precedence::Or => Precedence::And,
                Precedence::And => Precedence::Equality,
                Precedence::Equality => Precedence::Comparison,
                Precedence::Comparison => Precedence::Additive,
                Precedence::Additive => Precedence::Multiplicative,
                Precedence::Multiplicative => Precedence::Multiplicative,
            };
            let right = if precedence == Precedence::Multiplicative {
                // Highest binary level: chain through unary directly.
                self.parse_unary()?
            } else {
                self.parse_expression(next)?
            };

            left = ExpressionNode::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<ExpressionNode, ParseError> {
        match self.peek().map(|s| s.token.clone()) {
            Some(Token::Bang) => {
                self.advance();
                Ok(ExpressionNode::Unary {
                    op: UnaryOperator::Not,
                    operand: Box::new(self.parse_unary()?),
                })
            }
            Some(Token::Minus) => {
                self.advance();
                Ok(ExpressionNode::Unary {
                    op: UnaryOperator::Negate,
                    operand: Box::new(self.parse_unary()?),
                })
            }
            _ => self.parse_postfix(),
        }
    }

    /// Parse a primary expression followed by any number of `.name` and
    /// `[index]` suffixes.
    fn parse_postfix(&mut self) -> Result<ExpressionNode, ParseError> {
        let mut node = self.parse_primary()?;

        loop {
            match self.peek().map(|s| &s.token) {
                Some(Token::Dot) => {
                    self.advance();
                    let name = match self.advance() {
                        Some(SpannedToken {
                            token: Token::Identifier(name),
                            ..
                        }) => name,
                        Some(spanned) => {
                            return Err(ParseError {
                                message: format!(
                                    "expected member name after '.', found {:?}",
                                    spanned.token
                                ),
                                position: spanned.position,
                            });
                        }
                        None => return Err(self.unexpected_end("member name after '.'")),
                    };
                    node = ExpressionNode::Member {
                        object: Box::new(node),
                        name,
                    };
                }
                Some(Token::LeftBracket) => {
                    self.advance();
                    let index = self.parse_expression(Precedence::Or)?;
                    self.expect(&Token::RightBracket, "']'")?;
                    node = ExpressionNode::Index {
                        object: Box::new(node),
                        index: Box::new(index),
                    };
                }
                _ => break,
            }
        }

        Ok(node)
    }

    fn parse_primary(&mut self) -> Result<ExpressionNode, ParseError> {
        let Some(spanned) = self.advance() else {
            return Err(self.unexpected_end("an expression"));
        };

        match spanned.token {
            Token::Integer(value) => Ok(ExpressionNode::Literal(LiteralValue::Integer(value))),
            Token::Decimal(value) => Ok(ExpressionNode::Literal(LiteralValue::Decimal(value))),
            Token::String(value) => Ok(ExpressionNode::Literal(LiteralValue::String(value))),
            Token::Boolean(value) => Ok(ExpressionNode::Literal(LiteralValue::Boolean(value))),
            Token::Null => Ok(ExpressionNode::Literal(LiteralValue::Null)),
            Token::Ctx => Ok(ExpressionNode::Context),
            Token::LeftParen => {
                let node = self.parse_expression(Precedence::Or)?;
                self.expect(&Token::RightParen, "')'")?;
                Ok(node)
            }
            Token::Identifier(name) if name == "fn" && self.next_is(&Token::Colon) => {
                self.advance(); // ':'
                let function = match self.advance() {
                    Some(SpannedToken {
                        token: Token::Identifier(function),
                        ..
                    }) => function,
                    Some(other) => {
                        return Err(ParseError {
                            message: format!("expected function name after 'fn:', found {:?}", other.token),
                            position: other.position,
                        });
                    }
                    None => return Err(self.unexpected_end("function name after 'fn:'")),
                };
                self.expect(&Token::LeftParen, "'(' after function name")?;
                let args = self.parse_arguments()?;
                Ok(ExpressionNode::Function {
                    name: function,
                    args,
                })
            }
            Token::Identifier(name) => Ok(ExpressionNode::Variable(name)),
            other => Err(ParseError {
                message: format!("unexpected token {other:?}"),
                position: spanned.position,
            }),
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<ExpressionNode>, ParseError> {
        let mut args = Vec::new();
        if self.next_is(&Token::RightParen) {
            self.advance();
            return Ok(args);
        }

        loop {
            args.push(self.parse_expression(Precedence::Or)?);
            match self.advance() {
                Some(SpannedToken {
                    token: Token::Comma,
                    ..
                }) => continue,
                Some(SpannedToken {
                    token: Token::RightParen,
                    ..
                }) => return Ok(args),
                Some(other) => {
                    return Err(ParseError {
                        message: format!("expected ',' or ')', found {:?}", other.token),
                        position: other.position,
                    });
                }
                None => return Err(self.unexpected_end("',' or ')'")),
            }
        }
    }

    fn next_is(&self, token: &Token) -> bool {
        self.peek().map(|s| &s.token) == Some(token)
    }
}

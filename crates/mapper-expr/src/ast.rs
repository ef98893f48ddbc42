//! Expression AST.

/// A literal value in an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    String(String),
    Integer(i64),
    Decimal(f64),
    Boolean(bool),
    Null,
}

/// Binary operators, in increasing precedence groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Or,
    And,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// Arithmetic negation (`-x`).
    Negate,
    /// Logical negation (`!x` or `not x`).
    Not,
}

/// A parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionNode {
    /// A literal value.
    Literal(LiteralValue),
    /// A top-level document variable, or the `value` placeholder.
    Variable(String),
    /// The `$ctx` context document.
    Context,
    /// Member access: `object.name`.
    Member {
        object: Box<ExpressionNode>,
        name: String,
    },
    /// Subscript access: `object[index]`; the index expression may produce
    /// an integer (arrays) or a string (objects, e.g. `settings['key']`).
    Index {
        object: Box<ExpressionNode>,
        index: Box<ExpressionNode>,
    },
    /// Unary operation.
    Unary {
        op: UnaryOperator,
        operand: Box<ExpressionNode>,
    },
    /// Binary operation.
    Binary {
        op: BinaryOperator,
        left: Box<ExpressionNode>,
        right: Box<ExpressionNode>,
    },
    /// Builtin call in the `fn:` namespace.
    Function {
        name: String,
        args: Vec<ExpressionNode>,
    },
}
